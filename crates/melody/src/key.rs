//! Tonal keys and modes.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::pitch::spell_tonic;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Major,
    Minor,
    Ionian,
    Dorian,
    Phrygian,
    Lydian,
    Mixolydian,
    Aeolian,
    Locrian,
}

impl Mode {
    /// Parse a mode word. Only the first three letters are significant,
    /// so `mix`, `Mixolydian` and `MIXO` all match; a bare `m` is minor
    /// and the empty string is major.
    pub fn parse(s: &str) -> Option<Mode> {
        let lower = s.trim().to_ascii_lowercase();
        if lower.is_empty() {
            return Some(Mode::Major);
        }
        if lower == "m" {
            return Some(Mode::Minor);
        }
        let prefix = lower.get(..3)?;
        match prefix {
            "maj" => Some(Mode::Major),
            "min" => Some(Mode::Minor),
            "ion" => Some(Mode::Ionian),
            "dor" => Some(Mode::Dorian),
            "phr" => Some(Mode::Phrygian),
            "lyd" => Some(Mode::Lydian),
            "mix" => Some(Mode::Mixolydian),
            "aeo" => Some(Mode::Aeolian),
            "loc" => Some(Mode::Locrian),
            _ => None,
        }
    }

    pub fn suffix(&self) -> &'static str {
        match self {
            Mode::Major => "maj",
            Mode::Minor => "min",
            Mode::Ionian => "ion",
            Mode::Dorian => "dor",
            Mode::Phrygian => "phr",
            Mode::Lydian => "lyd",
            Mode::Mixolydian => "mix",
            Mode::Aeolian => "aeo",
            Mode::Locrian => "loc",
        }
    }

    /// Position on the circle of fifths relative to the major key on the
    /// same tonic. D dorian has two fewer sharps than D major.
    pub fn fifths_offset(&self) -> i8 {
        match self {
            Mode::Major | Mode::Ionian => 0,
            Mode::Minor | Mode::Aeolian => -3,
            Mode::Dorian => -2,
            Mode::Phrygian => -4,
            Mode::Lydian => 1,
            Mode::Mixolydian => -1,
            Mode::Locrian => -5,
        }
    }

    /// Semitone offsets of the seven scale steps above the tonic.
    pub fn scale(&self) -> [u8; 7] {
        match self {
            Mode::Major | Mode::Ionian => [0, 2, 4, 5, 7, 9, 11],
            Mode::Minor | Mode::Aeolian => [0, 2, 3, 5, 7, 8, 10],
            Mode::Dorian => [0, 2, 3, 5, 7, 9, 10],
            Mode::Phrygian => [0, 1, 3, 5, 7, 8, 10],
            Mode::Lydian => [0, 2, 4, 6, 7, 9, 11],
            Mode::Mixolydian => [0, 2, 4, 5, 7, 9, 10],
            Mode::Locrian => [0, 1, 3, 5, 6, 8, 10],
        }
    }
}

/// A tonic pitch class plus a mode, e.g. D major or A dorian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TonalKey {
    /// 0-11, C = 0
    pub tonic: u8,
    pub mode: Mode,
}

impl TonalKey {
    pub fn new(tonic: u8, mode: Mode) -> Self {
        Self {
            tonic: tonic % 12,
            mode,
        }
    }

    pub fn major(tonic: u8) -> Self {
        Self::new(tonic, Mode::Major)
    }

    pub fn minor(tonic: u8) -> Self {
        Self::new(tonic, Mode::Minor)
    }

    /// Parse key names as they appear in tune files and settings:
    /// `D`, `Dmaj`, `Ador`, `F#m`, `Bb`, `Eb minor`, `G clef=treble`.
    pub fn parse(s: &str) -> Option<TonalKey> {
        let (tonic, rest) = split_tonic(s)?;
        let mode_word = rest
            .split_whitespace()
            .find(|word| !word.contains('='))
            .unwrap_or("");
        let mode = Mode::parse(mode_word)?;
        Some(TonalKey::new(tonic, mode))
    }

    pub fn transposed(&self, semitones: i32) -> TonalKey {
        let tonic = (i32::from(self.tonic) + semitones).rem_euclid(12) as u8;
        TonalKey::new(tonic, self.mode)
    }

    pub fn tonic_name(&self) -> &'static str {
        spell_tonic(self.tonic)
    }

    /// Whether a pitch class belongs to this key's scale.
    pub fn contains(&self, pitch_class: u8) -> bool {
        let interval = (pitch_class % 12 + 12 - self.tonic) % 12;
        self.mode.scale().contains(&interval)
    }
}

impl fmt::Display for TonalKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.tonic_name(), self.mode.suffix())
    }
}

/// Split a key name into its tonic pitch class and whatever follows the
/// tonic (mode text, clef options). The remainder is returned verbatim.
pub fn split_tonic(s: &str) -> Option<(u8, &str)> {
    let s = s.trim();
    let mut chars = s.char_indices();
    let (_, letter) = chars.next()?;
    let natural: i32 = match letter.to_ascii_uppercase() {
        'C' => 0,
        'D' => 2,
        'E' => 4,
        'F' => 5,
        'G' => 7,
        'A' => 9,
        'B' => 11,
        _ => return None,
    };
    let after_letter = &s[letter.len_utf8()..];

    let (alteration, rest) = match after_letter.chars().next() {
        Some(c @ ('#' | '♯')) => (1, &after_letter[c.len_utf8()..]),
        Some('♭') => (-1, &after_letter['♭'.len_utf8()..]),
        // `b` is a flat unless it starts a word that is not a mode
        Some('b') if is_flat_suffix(&after_letter[1..]) => (-1, &after_letter[1..]),
        _ => (0, after_letter),
    };

    Some(((natural + alteration).rem_euclid(12) as u8, rest))
}

fn is_flat_suffix(rest: &str) -> bool {
    let word = rest.split_whitespace().next().unwrap_or("");
    rest.is_empty()
        || rest.starts_with(char::is_whitespace)
        || word.contains('=')
        || Mode::parse(word).is_some()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_plain_and_explicit_major() {
        assert_eq!(TonalKey::parse("D"), Some(TonalKey::major(2)));
        assert_eq!(TonalKey::parse("Dmaj"), Some(TonalKey::major(2)));
        assert_eq!(TonalKey::parse("D major"), Some(TonalKey::major(2)));
    }

    #[test]
    fn parse_modes() {
        assert_eq!(TonalKey::parse("Ador"), Some(TonalKey::new(9, Mode::Dorian)));
        assert_eq!(TonalKey::parse("Em"), Some(TonalKey::minor(4)));
        assert_eq!(
            TonalKey::parse("G Mixolydian"),
            Some(TonalKey::new(7, Mode::Mixolydian))
        );
    }

    #[test]
    fn parse_accidentals() {
        assert_eq!(TonalKey::parse("F#m"), Some(TonalKey::minor(6)));
        assert_eq!(TonalKey::parse("Bb"), Some(TonalKey::major(10)));
        assert_eq!(TonalKey::parse("Ebm"), Some(TonalKey::minor(3)));
        assert_eq!(TonalKey::parse("Bbmaj"), Some(TonalKey::major(10)));
    }

    #[test]
    fn parse_ignores_clef_options() {
        assert_eq!(TonalKey::parse("G clef=treble"), Some(TonalKey::major(7)));
    }

    #[test]
    fn parse_rejects_garbage() {
        assert_eq!(TonalKey::parse(""), None);
        assert_eq!(TonalKey::parse("H"), None);
        assert_eq!(TonalKey::parse("Dfoo"), None);
    }

    #[test]
    fn display_spells_tonic_and_mode() {
        assert_eq!(TonalKey::major(2).to_string(), "Dmaj");
        assert_eq!(TonalKey::minor(11).to_string(), "Bmin");
        assert_eq!(TonalKey::new(3, Mode::Dorian).to_string(), "Ebdor");
    }

    #[test]
    fn transposed_wraps_tonic() {
        assert_eq!(TonalKey::major(11).transposed(3), TonalKey::major(2));
        assert_eq!(TonalKey::minor(0).transposed(-1), TonalKey::minor(11));
    }

    #[test]
    fn contains_checks_scale_membership() {
        let d_major = TonalKey::major(2);
        assert!(d_major.contains(6)); // F#
        assert!(!d_major.contains(5)); // F
        let a_dorian = TonalKey::new(9, Mode::Dorian);
        assert!(a_dorian.contains(6)); // F#
        assert!(!a_dorian.contains(8)); // G#
    }

    #[test]
    fn split_tonic_keeps_remainder() {
        assert_eq!(split_tonic("F#m"), Some((6, "m")));
        assert_eq!(split_tonic("Ador"), Some((9, "dor")));
        assert_eq!(split_tonic("Bb"), Some((10, "")));
    }
}
