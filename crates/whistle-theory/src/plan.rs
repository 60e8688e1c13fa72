//! What to do with a freshly loaded melody.

use melody::{Melody, TonalKey};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::instrument::InstrumentProfile;
use crate::key_detect::{KeyDetector, ProfileKeyDetector};
use crate::transpose::{
    current_displayed_key, find_playable_key_variants, optimal_transpose, transpose_to_octave4,
    PlayableKeyVariant,
};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum KeySource {
    /// Taken from the tune's own key field
    Declared,
    Detected { confidence: f64 },
}

/// Which shift a melody is played at.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StartingShift {
    /// Tonic near middle C, independent of any whistle. Fresh imports
    /// start here.
    Octave4,
    /// Fitted to the chosen whistle
    Whistle,
}

impl StartingShift {
    /// A fresh load sits at octave 4 until a whistle is picked.
    pub fn for_load(whistle_chosen: bool) -> Self {
        if whistle_chosen {
            StartingShift::Whistle
        } else {
            StartingShift::Octave4
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransposePlan {
    pub key: TonalKey,
    /// Key name as it should be shown before any shift
    pub base_key: String,
    pub key_source: KeySource,
    pub variants: Vec<PlayableKeyVariant>,
    pub recommended_transpose: i32,
    pub displayed_key: String,
    /// Shift that would put the tonic near middle C instead
    pub octave4_transpose: i32,
}

impl TransposePlan {
    pub fn shift_for(&self, start: StartingShift) -> i32 {
        match start {
            StartingShift::Octave4 => self.octave4_transpose,
            StartingShift::Whistle => self.recommended_transpose,
        }
    }

    /// Whether the recommended shift makes every note playable.
    pub fn fully_playable(&self) -> bool {
        self.variants
            .iter()
            .any(|v| v.transpose == self.recommended_transpose)
    }
}

/// Plan with the default key detector.
pub fn plan(melody: &Melody, declared_key: Option<&str>, profile: &InstrumentProfile) -> TransposePlan {
    plan_with_detector(&ProfileKeyDetector::default(), melody, declared_key, profile)
}

/// Settle the key (declared if it parses, else detected), then prefer the
/// smallest shift that makes the whole melody playable, falling back to
/// aligning tonics.
pub fn plan_with_detector(
    detector: &dyn KeyDetector,
    melody: &Melody,
    declared_key: Option<&str>,
    profile: &InstrumentProfile,
) -> TransposePlan {
    let notes = melody.notes();
    let declared = declared_key.and_then(|text| TonalKey::parse(text).map(|key| (text.trim(), key)));

    let (key, base_key, key_source) = match declared {
        Some((text, key)) => (key, text.to_string(), KeySource::Declared),
        None => {
            let detection = detector.detect(notes);
            debug!(key = %detection.key, confidence = detection.confidence, "detected key");
            (
                detection.key,
                detection.key.to_string(),
                KeySource::Detected {
                    confidence: detection.confidence,
                },
            )
        }
    };

    let variants = find_playable_key_variants(notes, profile, &base_key);
    let recommended_transpose = match variants.first() {
        Some(variant) => variant.transpose,
        None => optimal_transpose(&key, &key, notes, profile),
    };
    let displayed_key = current_displayed_key(&base_key, recommended_transpose);

    info!(
        whistle = %profile.key,
        key = %base_key,
        variants = variants.len(),
        transpose = recommended_transpose,
        "planned transposition"
    );

    TransposePlan {
        key,
        base_key,
        key_source,
        variants,
        recommended_transpose,
        displayed_key,
        octave4_transpose: transpose_to_octave4(&key, notes),
    }
}
