//! Walking a parsed tune into a [`Melody`].

use melody::{FeedbackCollector, Melody, Note as MelodyNote};

use crate::ast::{Element, Key, Meter, Note, NoteName, Tune, UnitLength};
use crate::parser::{parse_key_field, parse_meter, parse_unit_length};
use crate::repeats::expand_repeats;

const MEASURE_TOLERANCE: f64 = 1e-6;

const SHARP_ORDER: [NoteName; 7] = [
    NoteName::F,
    NoteName::C,
    NoteName::G,
    NoteName::D,
    NoteName::A,
    NoteName::E,
    NoteName::B,
];

const FLAT_ORDER: [NoteName; 7] = [
    NoteName::B,
    NoteName::E,
    NoteName::A,
    NoteName::D,
    NoteName::G,
    NoteName::C,
    NoteName::F,
];

/// Semitone adjustment the key signature applies to each letter, indexed
/// by [`NoteName`] from C.
pub fn key_signature(key: &Key) -> [i8; 7] {
    let mut signature = [0; 7];

    if !key.none && !key.explicit_only {
        let accidental = key.accidental.map(|a| a.to_semitone_offset()).unwrap_or(0);
        let fifths = (key.root.fifths() + 7 * accidental + key.mode.fifths_offset()).clamp(-7, 7);
        if fifths > 0 {
            for name in &SHARP_ORDER[..fifths as usize] {
                signature[*name as usize] = 1;
            }
        } else {
            for name in &FLAT_ORDER[..fifths.unsigned_abs() as usize] {
                signature[*name as usize] = -1;
            }
        }
    }

    if !key.none {
        for (accidental, name) in &key.explicit_accidentals {
            signature[*name as usize] = accidental.to_semitone_offset();
        }
    }

    signature
}

/// Convert a tune to a melody, reporting measure-length problems against
/// the lines they were written on.
///
/// Measure lengths are checked on the tune as written. Notes are emitted
/// from the repeat-expanded body, whose feedback would only repeat what
/// the check already said.
pub fn to_melody(tune: &Tune, collector: &mut FeedbackCollector) -> Melody {
    let mut check = Walker::new(tune, collector);
    check.walk(&tune.body);
    check.finish_measures();

    let expanded = expand_repeats(&tune.body);
    let mut scratch = FeedbackCollector::new();
    let mut emit = Walker::new(tune, &mut scratch);
    emit.walk(&expanded);
    let notes = emit.notes;

    let melody = Melody::new(notes, tune.header.meter.beats_per_measure());
    match &tune.header.tempo {
        Some(tempo) => melody.with_initial_tempo(tempo.quarter_bpm()),
        None => melody,
    }
}

struct Measure {
    length: f64,
    expected: Option<f64>,
    line: usize,
    whole_rest: bool,
}

/// Where the previous note, chord or rest landed, for broken rhythm.
struct LastEvent {
    start: f64,
    duration: f64,
    notes: Vec<usize>,
}

/// An emitted note still open for a tie, with the letter and octave it
/// was written as.
#[derive(Clone, Copy)]
struct Tie {
    index: usize,
    name: NoteName,
    octave: i32,
}

struct Walker<'c> {
    collector: &'c mut FeedbackCollector,
    meter: Meter,
    unit: UnitLength,
    signature: [i8; 7],
    bar_accidentals: [Option<i8>; 7],
    beat: f64,
    time_scale: f64,
    broken_factor: f64,
    last: Option<LastEvent>,
    /// Notes whose tie carries into the next event
    ties: Vec<Tie>,
    notes: Vec<MelodyNote>,
    line: usize,
    measure_start: f64,
    measure_whole_rest: bool,
    measures: Vec<Measure>,
}

impl<'c> Walker<'c> {
    fn new(tune: &Tune, collector: &'c mut FeedbackCollector) -> Self {
        Walker {
            collector,
            meter: tune.header.meter,
            unit: tune.header.unit_length,
            signature: key_signature(&tune.header.key),
            bar_accidentals: [None; 7],
            beat: 0.0,
            time_scale: 1.0,
            broken_factor: 1.0,
            last: None,
            ties: Vec::new(),
            notes: Vec::new(),
            line: tune.body_line,
            measure_start: 0.0,
            measure_whole_rest: false,
            measures: Vec::new(),
        }
    }

    fn walk(&mut self, elements: &[Element]) {
        for element in elements {
            match element {
                Element::Note(note) => self.chord(std::slice::from_ref(note), 1.0),
                Element::Chord(chord) => {
                    if !chord.notes.is_empty() {
                        self.chord(&chord.notes, chord.duration.factor());
                    }
                }
                Element::Rest(rest) => {
                    self.break_ties("rest");
                    let start = self.beat;
                    let duration = match rest.multi_measure {
                        Some(count) => {
                            self.measure_whole_rest = true;
                            f64::from(count) * self.meter.measure_beats()
                        }
                        None => self.take_duration(rest.duration.factor()),
                    };
                    self.beat += duration;
                    self.last = Some(LastEvent {
                        start,
                        duration,
                        notes: Vec::new(),
                    });
                }
                Element::Bar(_) => self.bar(),
                Element::Tuplet(tuplet) => {
                    let saved = self.time_scale;
                    let q = tuplet.resolved_q(&self.meter);
                    self.time_scale *= f64::from(q) / f64::from(tuplet.p.max(1));
                    self.walk(&tuplet.elements);
                    self.time_scale = saved;
                }
                Element::BrokenRhythm(broken) => {
                    let (first, second) = broken.factors();
                    match self.last.take() {
                        Some(last) => {
                            let lengthened = last.duration * first;
                            for &index in &last.notes {
                                self.notes[index].duration += lengthened - last.duration;
                            }
                            self.beat = last.start + lengthened;
                            self.broken_factor = second;
                        }
                        None => self
                            .collector
                            .warning("Broken rhythm without a preceding note"),
                    }
                }
                Element::Field(field) => match field.field {
                    'K' => {
                        let key = parse_key_field(&field.value, self.collector);
                        self.signature = key_signature(&key);
                        self.bar_accidentals = [None; 7];
                    }
                    'L' => self.unit = parse_unit_length(&field.value, self.collector),
                    'M' => self.meter = parse_meter(&field.value, self.collector),
                    _ => {}
                },
                Element::LineBreak => {
                    self.line += 1;
                    self.collector.set_position(self.line, 1);
                }
                Element::GraceNotes(_)
                | Element::Decoration(_)
                | Element::Annotation(_)
                | Element::Slur => {}
            }
        }
    }

    /// Length in beats of an event with the given multiplier, consuming
    /// any pending broken-rhythm factor.
    fn take_duration(&mut self, factor: f64) -> f64 {
        let duration = self.unit.beats() * factor * self.time_scale * self.broken_factor;
        self.broken_factor = 1.0;
        duration
    }

    /// Emit a note or chord. Chord length comes from its first note scaled
    /// by the chord's own suffix.
    fn chord(&mut self, notes: &[Note], chord_factor: f64) {
        let start = self.beat;
        let duration = self.take_duration(notes[0].duration.factor() * chord_factor);
        let pending = std::mem::take(&mut self.ties);
        let mut emitted = Vec::with_capacity(notes.len());
        let mut matched = 0;

        for note in notes {
            // A tied accidental carries into the same written note, even
            // across a bar line
            let carried = match note.accidental {
                None => pending.iter().find(|t| {
                    t.name == note.pitch && t.octave == note.octave && !emitted.contains(&t.index)
                }),
                Some(_) => None,
            };
            let pitch = match carried {
                Some(tie) => self.notes[tie.index].pitch,
                None => match self.pitch(note) {
                    Some(pitch) => pitch,
                    None => continue,
                },
            };

            let tied = pending
                .iter()
                .map(|t| t.index)
                .find(|&i| self.notes[i].pitch == pitch && !emitted.contains(&i));
            let index = match tied {
                Some(index) => {
                    self.notes[index].duration += duration;
                    matched += 1;
                    index
                }
                None => {
                    self.notes.push(MelodyNote::new(pitch, start, duration));
                    self.notes.len() - 1
                }
            };

            if note.tie {
                self.ties.push(Tie {
                    index,
                    name: note.pitch,
                    octave: note.octave,
                });
            }
            emitted.push(index);
        }

        if matched < pending.len() {
            self.collector
                .warning("Tie does not continue into a note of the same pitch");
        }

        self.beat = start + duration;
        self.last = Some(LastEvent {
            start,
            duration,
            notes: emitted,
        });
    }

    fn break_ties(&mut self, what: &str) {
        if !self.ties.is_empty() {
            self.ties.clear();
            self.collector
                .warning(format!("Tie followed by a {} is ignored", what));
        }
    }

    /// Absolute pitch with accidentals applied. Explicit accidentals carry
    /// to the end of the bar for the same letter.
    fn pitch(&mut self, note: &Note) -> Option<u8> {
        let letter = note.pitch as usize;
        let accidental = match note.accidental {
            Some(accidental) => {
                let offset = accidental.to_semitone_offset();
                self.bar_accidentals[letter] = Some(offset);
                offset
            }
            None => self.bar_accidentals[letter].unwrap_or(self.signature[letter]),
        };

        let pitch = note
            .octave
            .saturating_mul(12)
            .saturating_add(60 + i32::from(note.pitch.to_semitone()) + i32::from(accidental));
        match u8::try_from(pitch) {
            Ok(pitch) if pitch <= 127 => Some(pitch),
            _ => {
                self.collector
                    .warning(format!("Pitch {} is outside the MIDI range, treated as a rest", pitch));
                None
            }
        }
    }

    fn bar(&mut self) {
        self.bar_accidentals = [None; 7];
        if self.beat > self.measure_start {
            self.close_measure();
        }
    }

    fn close_measure(&mut self) {
        self.measures.push(Measure {
            length: self.beat - self.measure_start,
            expected: self.meter.fraction().map(|_| self.meter.measure_beats()),
            line: self.line,
            whole_rest: self.measure_whole_rest,
        });
        self.measure_start = self.beat;
        self.measure_whole_rest = false;
    }

    /// Warn about measures whose length disagrees with the meter. The
    /// first and last measures may be partial (pickup and its complement).
    fn finish_measures(&mut self) {
        if self.beat > self.measure_start {
            self.close_measure();
        }
        let count = self.measures.len();
        for (i, measure) in self.measures.iter().enumerate() {
            if i == 0 || i + 1 == count || measure.whole_rest || measure.length <= 0.0 {
                continue;
            }
            let Some(expected) = measure.expected else {
                continue;
            };
            if (measure.length - expected).abs() > MEASURE_TOLERANCE {
                self.collector.set_position(measure.line, 1);
                self.collector.warning(format!(
                    "Measure {} has {} beats, expected {}",
                    i + 1,
                    measure.length,
                    expected
                ));
            }
        }
    }
}
