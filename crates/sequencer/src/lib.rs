//! Playback cursor for a melody.
//!
//! [`Transport`] holds the rules: play, pause, stop, seek, loop regions,
//! tempo and transposition, advanced explicitly by elapsed time.
//! [`Sequencer`] wraps it in a shared handle and drives it from a Tokio
//! interval while playing.

pub mod handle;
pub mod transport;

pub use handle::Sequencer;
pub use transport::{Advance, ConfigError, PlayState, Region, SequencerConfig, Snapshot, Transport};
