//! Whistle keys and their playable ranges.

use std::fmt;
use std::str::FromStr;

use melody::key::split_tonic;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Semitone offsets above the tonic reachable without cross-fingering:
/// the major scale plus the flattened seventh.
pub const DEGREE_OFFSETS: [u8; 8] = [0, 2, 4, 5, 7, 9, 10, 11];

/// A whistle's two registers span two octaves less a semitone.
const RANGE_SPAN: u8 = 23;

/// Whistle keys from high Eb down to low D.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum WhistleKey {
    Eb,
    D,
    CSharp,
    C,
    B,
    Bb,
    A,
    Ab,
    G,
    FSharp,
    F,
    E,
    LowEb,
    LowD,
}

impl WhistleKey {
    pub const ALL: [WhistleKey; 14] = [
        WhistleKey::Eb,
        WhistleKey::D,
        WhistleKey::CSharp,
        WhistleKey::C,
        WhistleKey::B,
        WhistleKey::Bb,
        WhistleKey::A,
        WhistleKey::Ab,
        WhistleKey::G,
        WhistleKey::FSharp,
        WhistleKey::F,
        WhistleKey::E,
        WhistleKey::LowEb,
        WhistleKey::LowD,
    ];

    /// Name as used in settings files and on the command line.
    pub fn name(&self) -> &'static str {
        match self {
            WhistleKey::Eb => "Eb",
            WhistleKey::D => "D",
            WhistleKey::CSharp => "C#",
            WhistleKey::C => "C",
            WhistleKey::B => "B",
            WhistleKey::Bb => "Bb",
            WhistleKey::A => "A",
            WhistleKey::Ab => "Ab",
            WhistleKey::G => "G",
            WhistleKey::FSharp => "F#",
            WhistleKey::F => "F",
            WhistleKey::E => "E",
            WhistleKey::LowEb => "Low Eb",
            WhistleKey::LowD => "Low D",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            WhistleKey::Eb => "E♭",
            WhistleKey::Bb => "B♭",
            WhistleKey::Ab => "A♭",
            WhistleKey::LowEb => "Low E♭",
            other => other.name(),
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }

    /// Lowest note, all holes covered.
    pub fn low_pitch(&self) -> u8 {
        match self {
            WhistleKey::Eb => 63,
            WhistleKey::D => 62,
            WhistleKey::CSharp => 61,
            WhistleKey::C => 60,
            WhistleKey::B => 59,
            WhistleKey::Bb => 58,
            WhistleKey::A => 57,
            WhistleKey::Ab => 56,
            WhistleKey::G => 55,
            WhistleKey::FSharp => 54,
            WhistleKey::F => 53,
            WhistleKey::E => 52,
            WhistleKey::LowEb => 51,
            WhistleKey::LowD => 50,
        }
    }

    pub fn tonic_pitch_class(&self) -> u8 {
        self.low_pitch() % 12
    }

    /// Suggest a whistle for a tune key such as `Dmaj`, `Ador` or `F#m`:
    /// the high whistle sharing the key's tonic, or D if the key does not
    /// parse.
    pub fn for_tune_key(key: &str) -> WhistleKey {
        split_tonic(key)
            .and_then(|(tonic, _)| {
                WhistleKey::ALL
                    .into_iter()
                    .find(|w| !w.is_low() && w.tonic_pitch_class() == tonic)
            })
            .unwrap_or(WhistleKey::D)
    }

    pub fn is_low(&self) -> bool {
        matches!(self, WhistleKey::LowEb | WhistleKey::LowD)
    }
}

impl fmt::Display for WhistleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for WhistleKey {
    type Err = CatalogError;

    /// Accepts `D`, `d`, `Low D`, `lowd`, `low-d`, `E♭`, `Eb`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .replace('♭', "b")
            .replace('♯', "#")
            .chars()
            .filter(|c| !c.is_whitespace() && *c != '-' && *c != '_')
            .collect::<String>()
            .to_ascii_lowercase();

        WhistleKey::ALL
            .into_iter()
            .find(|w| {
                let name: String = w
                    .name()
                    .chars()
                    .filter(|c| !c.is_whitespace())
                    .collect::<String>()
                    .to_ascii_lowercase();
                name == normalized
            })
            .ok_or_else(|| CatalogError::UnknownWhistle(s.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CatalogError {
    #[error("unknown whistle key '{0}'")]
    UnknownWhistle(String),

    #[error("{key} whistle: lowest note {low} is not its tonic")]
    TonicMismatch { key: WhistleKey, low: u8 },

    #[error("{key} whistle: range {low}..={high} is empty or outside MIDI pitches")]
    InvalidRange { key: WhistleKey, low: u8, high: u8 },

    #[error("{key} whistle: overblow pitch {overblow} is outside {low}..={high}")]
    InvalidOverblow {
        key: WhistleKey,
        overblow: u8,
        low: u8,
        high: u8,
    },
}

/// Static description of one whistle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstrumentProfile {
    pub key: WhistleKey,
    pub tonic_pitch_class: u8,
    /// Lowest playable pitch
    pub low: u8,
    /// Highest playable pitch
    pub high: u8,
    /// Pitches at or above this need the second register
    pub overblow_at: u8,
    pub degree_offsets: [u8; 8],
}

impl InstrumentProfile {
    pub fn standard(key: WhistleKey) -> Self {
        let low = key.low_pitch();
        InstrumentProfile {
            key,
            tonic_pitch_class: key.tonic_pitch_class(),
            low,
            high: low + RANGE_SPAN,
            overblow_at: low + 12,
            degree_offsets: DEGREE_OFFSETS,
        }
    }

    pub fn in_range(&self, pitch: u8) -> bool {
        (self.low..=self.high).contains(&pitch)
    }

    /// Position of a pitch class among the eight degrees.
    pub fn degree_index(&self, pitch_class: u8) -> Option<usize> {
        let interval = (pitch_class % 12 + 12 - self.tonic_pitch_class) % 12;
        self.degree_offsets.iter().position(|&o| o == interval)
    }

    pub fn is_diatonic(&self, pitch_class: u8) -> bool {
        self.degree_index(pitch_class).is_some()
    }

    /// Midpoint of the playable range.
    pub fn center(&self) -> f64 {
        (f64::from(self.low) + f64::from(self.high)) / 2.0
    }

    pub fn validate(&self) -> Result<(), CatalogError> {
        if self.low % 12 != self.tonic_pitch_class {
            return Err(CatalogError::TonicMismatch {
                key: self.key,
                low: self.low,
            });
        }
        if self.low >= self.high || self.high > 127 {
            return Err(CatalogError::InvalidRange {
                key: self.key,
                low: self.low,
                high: self.high,
            });
        }
        if !self.in_range(self.overblow_at) {
            return Err(CatalogError::InvalidOverblow {
                key: self.key,
                overblow: self.overblow_at,
                low: self.low,
                high: self.high,
            });
        }
        Ok(())
    }
}

/// Adjustments to a standard profile, for whistles that play a little
/// higher or lower than the textbook range.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileOverride {
    pub low: Option<u8>,
    pub high: Option<u8>,
    pub overblow: Option<u8>,
}

/// Every whistle profile, validated at construction and passed to
/// whatever needs one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstrumentCatalog {
    profiles: [InstrumentProfile; 14],
}

impl Default for InstrumentCatalog {
    fn default() -> Self {
        Self::standard()
    }
}

impl InstrumentCatalog {
    pub fn standard() -> Self {
        InstrumentCatalog {
            profiles: WhistleKey::ALL.map(InstrumentProfile::standard),
        }
    }

    /// Standard profiles with overrides applied. Every profile is
    /// validated before the catalog is returned.
    pub fn with_overrides<I>(overrides: I) -> Result<Self, CatalogError>
    where
        I: IntoIterator<Item = (WhistleKey, ProfileOverride)>,
    {
        let mut catalog = Self::standard();
        for (key, change) in overrides {
            let profile = &mut catalog.profiles[key.index()];
            if let Some(low) = change.low {
                profile.low = low;
            }
            if let Some(high) = change.high {
                profile.high = high;
            }
            if let Some(overblow) = change.overblow {
                profile.overblow_at = overblow;
            }
        }
        for profile in &catalog.profiles {
            profile.validate()?;
        }
        Ok(catalog)
    }

    pub fn get(&self, key: WhistleKey) -> &InstrumentProfile {
        &self.profiles[key.index()]
    }

    pub fn iter(&self) -> impl Iterator<Item = &InstrumentProfile> {
        self.profiles.iter()
    }
}
