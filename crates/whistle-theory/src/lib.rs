//! Music theory for whistle players: key detection, whistle ranges,
//! fingerings and transposition planning.
//!
//! ```
//! use melody::{Melody, Note};
//! use whistle_theory::{pitch_to_fingering, plan, InstrumentCatalog, WhistleKey};
//!
//! let tune = Melody::new(
//!     vec![Note::new(67, 0.0, 1.0), Note::new(71, 1.0, 1.0), Note::new(74, 2.0, 2.0)],
//!     4,
//! );
//! let catalog = InstrumentCatalog::standard();
//! let whistle = catalog.get(WhistleKey::D);
//! let plan = plan(&tune, Some("G"), whistle);
//!
//! let shifted = (67 + plan.recommended_transpose) as u8;
//! assert!(pitch_to_fingering(shifted, whistle).is_some());
//! ```

pub mod fingering;
pub mod instrument;
pub mod key_detect;
pub mod plan;
pub mod transpose;

pub use fingering::{pitch_to_fingering, Degree, Fingering};
pub use instrument::{CatalogError, InstrumentCatalog, InstrumentProfile, ProfileOverride, WhistleKey};
pub use key_detect::{detect_key, pitch_class_histogram, KeyDetection, KeyDetector, ProfileKeyDetector};
pub use plan::{plan, plan_with_detector, KeySource, StartingShift, TransposePlan};
pub use transpose::{
    current_displayed_key, find_playable_key_variants, optimal_transpose, transpose_to_octave4,
    PlayableKeyVariant,
};
