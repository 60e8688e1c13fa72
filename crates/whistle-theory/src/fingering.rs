//! Pitch to fingering lookup.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::instrument::InstrumentProfile;

/// Scale degree on the whistle, in first-octave form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Degree {
    I,
    II,
    III,
    IV,
    V,
    VI,
    /// Lowered seventh, the half-covered sixth hole
    FlatVII,
    VII,
}

impl Degree {
    const ORDER: [Degree; 8] = [
        Degree::I,
        Degree::II,
        Degree::III,
        Degree::IV,
        Degree::V,
        Degree::VI,
        Degree::FlatVII,
        Degree::VII,
    ];

    pub fn from_index(index: usize) -> Option<Degree> {
        Self::ORDER.get(index).copied()
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Degree::I => "I",
            Degree::II => "II",
            Degree::III => "III",
            Degree::IV => "IV",
            Degree::V => "V",
            Degree::VI => "VI",
            Degree::FlatVII => "♭VII",
            Degree::VII => "VII",
        }
    }

    /// Holes covered from the top, 6 for the tonic. The flat seventh is
    /// reported as the nearest full pattern.
    pub fn holes_covered(&self) -> u8 {
        match self {
            Degree::I => 6,
            Degree::II => 5,
            Degree::III => 4,
            Degree::IV => 3,
            Degree::V => 2,
            Degree::VI => 1,
            Degree::FlatVII | Degree::VII => 0,
        }
    }
}

impl fmt::Display for Degree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.symbol())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fingering {
    pub degree: Degree,
    pub needs_overblow: bool,
}

impl fmt::Display for Fingering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.needs_overblow {
            write!(f, "{}+", self.degree)
        } else {
            write!(f, "{}", self.degree)
        }
    }
}

/// Fingering for an absolute pitch, or `None` when the pitch is outside
/// the whistle's range or needs a cross-fingering.
pub fn pitch_to_fingering(pitch: u8, profile: &InstrumentProfile) -> Option<Fingering> {
    if !profile.in_range(pitch) {
        return None;
    }
    let degree = Degree::from_index(profile.degree_index(pitch % 12)?)?;
    Some(Fingering {
        degree,
        needs_overblow: pitch >= profile.overblow_at,
    })
}
