//! Syntax tree for the subset of ABC notation that affects pitch and time.

use melody::{beats_per_measure, Mode, TonalKey};
use serde::{Deserialize, Serialize};

/// One parsed tune: header fields and the body as a flat element list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Tune {
    pub header: Header,
    pub body: Vec<Element>,
    /// Tune-relative line on which the body starts
    pub body_line: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    pub reference: u32,
    pub title: Option<String>,
    pub composer: Option<String>,
    pub key: Key,
    /// `K:` value as written, without trailing comment
    pub declared_key: Option<String>,
    pub meter: Meter,
    pub unit_length: UnitLength,
    pub tempo: Option<Tempo>,
}

impl Default for Header {
    fn default() -> Self {
        Header {
            reference: 1,
            title: None,
            composer: None,
            key: Key::default(),
            declared_key: None,
            meter: Meter::Simple {
                numerator: 4,
                denominator: 4,
            },
            unit_length: UnitLength::default(),
            tempo: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Key {
    pub root: NoteName,
    pub accidental: Option<Accidental>,
    pub mode: Mode,
    /// Extra accidentals written after the mode (`K:D ^g`)
    pub explicit_accidentals: Vec<(Accidental, NoteName)>,
    /// `exp`: the explicit accidentals replace the signature entirely
    pub explicit_only: bool,
    /// `K:none`: no signature at all
    pub none: bool,
}

impl Key {
    pub fn tonal_key(&self) -> TonalKey {
        let semitone = self.root.to_semitone()
            + self.accidental.map(|a| a.to_semitone_offset()).unwrap_or(0);
        TonalKey::new(semitone.rem_euclid(12) as u8, self.mode)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum NoteName {
    #[default]
    C,
    D,
    E,
    F,
    G,
    A,
    B,
}

impl NoteName {
    /// Semitones above C.
    pub fn to_semitone(&self) -> i8 {
        match self {
            NoteName::C => 0,
            NoteName::D => 2,
            NoteName::E => 4,
            NoteName::F => 5,
            NoteName::G => 7,
            NoteName::A => 9,
            NoteName::B => 11,
        }
    }

    /// Position on the circle of fifths of the natural major key on this letter.
    pub fn fifths(&self) -> i8 {
        match self {
            NoteName::F => -1,
            NoteName::C => 0,
            NoteName::G => 1,
            NoteName::D => 2,
            NoteName::A => 3,
            NoteName::E => 4,
            NoteName::B => 5,
        }
    }

    pub fn from_letter(c: char) -> Option<NoteName> {
        match c.to_ascii_uppercase() {
            'C' => Some(NoteName::C),
            'D' => Some(NoteName::D),
            'E' => Some(NoteName::E),
            'F' => Some(NoteName::F),
            'G' => Some(NoteName::G),
            'A' => Some(NoteName::A),
            'B' => Some(NoteName::B),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Accidental {
    DoubleSharp,
    Sharp,
    Natural,
    Flat,
    DoubleFlat,
}

impl Accidental {
    pub fn to_semitone_offset(&self) -> i8 {
        match self {
            Accidental::DoubleSharp => 2,
            Accidental::Sharp => 1,
            Accidental::Natural => 0,
            Accidental::Flat => -1,
            Accidental::DoubleFlat => -2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Meter {
    Simple { numerator: u8, denominator: u8 },
    /// C
    Common,
    /// C|
    Cut,
    Free,
}

impl Meter {
    pub fn fraction(&self) -> Option<(u8, u8)> {
        match self {
            Meter::Simple {
                numerator,
                denominator,
            } => Some((*numerator, *denominator)),
            Meter::Common => Some((4, 4)),
            Meter::Cut => Some((2, 2)),
            Meter::Free => None,
        }
    }

    /// Exact measure length in quarter-note beats.
    pub fn measure_beats(&self) -> f64 {
        match self.fraction() {
            Some((n, d)) if n > 0 && d > 0 => f64::from(n) * 4.0 / f64::from(d),
            _ => 4.0,
        }
    }

    /// Whole-beat measure length used for the melody's measure grid.
    pub fn beats_per_measure(&self) -> u32 {
        match self.fraction() {
            Some((n, d)) => beats_per_measure(u32::from(n), u32::from(d)),
            None => 4,
        }
    }

    /// 6/8, 9/8, 12/8 and friends.
    pub fn is_compound(&self) -> bool {
        matches!(self.fraction(), Some((n, 8)) if n % 3 == 0 && n > 3)
    }
}

/// Default note length (`L:`) as a fraction of a whole note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnitLength {
    pub numerator: u8,
    pub denominator: u8,
}

impl Default for UnitLength {
    fn default() -> Self {
        UnitLength {
            numerator: 1,
            denominator: 8,
        }
    }
}

impl UnitLength {
    /// Length of one unit note in quarter-note beats.
    pub fn beats(&self) -> f64 {
        if self.denominator == 0 {
            return 0.5;
        }
        f64::from(self.numerator) * 4.0 / f64::from(self.denominator)
    }
}

/// `Q:` field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tempo {
    /// e.g. (1, 4) for a quarter note
    pub beat_unit: (u8, u8),
    pub bpm: u16,
    pub text: Option<String>,
}

impl Tempo {
    /// Tempo expressed in quarter notes per minute.
    pub fn quarter_bpm(&self) -> f64 {
        let (num, den) = self.beat_unit;
        if den == 0 {
            return f64::from(self.bpm);
        }
        f64::from(self.bpm) * f64::from(num) * 4.0 / f64::from(den)
    }
}

/// Note length multiplier relative to the unit length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Duration {
    pub numerator: u16,
    pub denominator: u16,
}

impl Duration {
    pub fn new(numerator: u16, denominator: u16) -> Self {
        Duration {
            numerator,
            denominator,
        }
    }

    pub fn unit() -> Self {
        Duration::new(1, 1)
    }

    pub fn factor(&self) -> f64 {
        if self.denominator == 0 {
            return 1.0;
        }
        f64::from(self.numerator) / f64::from(self.denominator)
    }
}

impl Default for Duration {
    fn default() -> Self {
        Duration::unit()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub pitch: NoteName,
    /// 0 for `C`..`B`, 1 for `c`..`b`, shifted by `'` and `,`
    pub octave: i32,
    pub accidental: Option<Accidental>,
    pub duration: Duration,
    /// Followed by `-`
    pub tie: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chord {
    pub notes: Vec<Note>,
    pub duration: Duration,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Rest {
    pub duration: Duration,
    /// `Z4`: whole measures of rest
    pub multi_measure: Option<u16>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Bar {
    Single,
    Double,
    /// `[|`
    Start,
    /// `|]`
    End,
    RepeatStart,
    RepeatEnd,
    /// `::`
    RepeatBoth,
    /// `|1`, `[2`
    Ending(u8),
    /// `:|2`
    RepeatEndEnding(u8),
}

/// `(p:q:r`: the next `r` notes take the time of `q`, scaled by `q/p`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tuplet {
    pub p: u8,
    /// `None` when left to the meter-dependent default
    pub q: Option<u8>,
    pub elements: Vec<Element>,
}

impl Tuplet {
    pub fn resolved_q(&self, meter: &Meter) -> u8 {
        if let Some(q) = self.q {
            return q;
        }
        match self.p {
            2 | 4 | 8 => 3,
            5 | 7 | 9 if meter.is_compound() => 3,
            _ => 2,
        }
    }
}

/// `>` / `<` between two notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrokenRhythm {
    /// `>`: the first note is lengthened
    pub first_longer: bool,
    /// Number of `>` or `<` characters
    pub strength: u8,
}

impl BrokenRhythm {
    /// Duration factors for the (first, second) note.
    pub fn factors(&self) -> (f64, f64) {
        let short = 0.5_f64.powi(i32::from(self.strength.clamp(1, 3)));
        let long = 2.0 - short;
        if self.first_longer {
            (long, short)
        } else {
            (short, long)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InlineField {
    pub field: char,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Element {
    Note(Note),
    Chord(Chord),
    Rest(Rest),
    Bar(Bar),
    Tuplet(Tuplet),
    BrokenRhythm(BrokenRhythm),
    /// `[K:G]` or a `K:` line inside the body
    Field(InlineField),
    GraceNotes(Vec<Note>),
    Decoration(String),
    /// Quoted chord symbol or annotation
    Annotation(String),
    Slur,
    LineBreak,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unit_length_in_beats() {
        assert_eq!(UnitLength::default().beats(), 0.5);
        assert_eq!(
            UnitLength {
                numerator: 1,
                denominator: 16
            }
            .beats(),
            0.25
        );
    }

    #[test]
    fn tempo_scales_to_quarter_notes() {
        let tempo = Tempo {
            beat_unit: (3, 8),
            bpm: 80,
            text: None,
        };
        assert_eq!(tempo.quarter_bpm(), 120.0);
    }

    #[test]
    fn meter_lengths() {
        let jig = Meter::Simple {
            numerator: 6,
            denominator: 8,
        };
        assert_eq!(jig.measure_beats(), 3.0);
        assert_eq!(jig.beats_per_measure(), 3);
        assert!(jig.is_compound());
        assert_eq!(Meter::Cut.measure_beats(), 4.0);
        assert_eq!(Meter::Free.beats_per_measure(), 4);
    }

    #[test]
    fn broken_rhythm_factors() {
        let dotted = BrokenRhythm {
            first_longer: true,
            strength: 1,
        };
        assert_eq!(dotted.factors(), (1.5, 0.5));
        let double_snap = BrokenRhythm {
            first_longer: false,
            strength: 2,
        };
        assert_eq!(double_snap.factors(), (0.25, 1.75));
    }

    #[test]
    fn tuplet_default_q() {
        let common = Meter::Common;
        let jig = Meter::Simple {
            numerator: 6,
            denominator: 8,
        };
        let triplet = Tuplet {
            p: 3,
            q: None,
            elements: vec![],
        };
        assert_eq!(triplet.resolved_q(&common), 2);
        let quintuplet = Tuplet {
            p: 5,
            q: None,
            elements: vec![],
        };
        assert_eq!(quintuplet.resolved_q(&common), 2);
        assert_eq!(quintuplet.resolved_q(&jig), 3);
    }

    #[test]
    fn key_to_tonal_key() {
        let key = Key {
            root: NoteName::F,
            accidental: Some(Accidental::Sharp),
            mode: Mode::Minor,
            ..Key::default()
        };
        assert_eq!(key.tonal_key(), TonalKey::minor(6));
    }
}
