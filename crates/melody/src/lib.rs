//! Shared melody model for the whistle practice tools.
//!
//! Decoders produce a [`Melody`]; key detection, transposition planning,
//! fingering and playback all read it. A transposed view is a `Melody`
//! plus a separately tracked semitone offset, never a rewritten note list,
//! so the original stays available for re-analysis.

pub mod error;
pub mod feedback;
pub mod key;
pub mod model;
pub mod note;
pub mod pitch;

pub use error::{DecodeError, Result};
pub use feedback::{Decoded, Feedback, FeedbackCollector, FeedbackLevel};
pub use key::{Mode, TonalKey};
pub use model::{beats_per_measure, Melody, TuneInfo};
pub use note::Note;
pub use pitch::{pitch_class_name, pitch_name, shift_pitch, spell_tonic};
