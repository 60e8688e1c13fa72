//! Standard MIDI file decoding.
//!
//! All tracks are merged into one absolute-time stream and note-on/off
//! pairs become [`Note`](melody::Note)s measured in quarter-note beats.

pub mod container;
pub mod decode;

pub use container::{check_container, ContainerInfo};
pub use decode::{decode, MidiSummary, MidiTune};
