use serde::{Deserialize, Serialize};

use crate::note::Note;

const BEAT_EPSILON: f64 = 1e-9;

/// A decoded melody: notes in start order plus measure and tempo metadata.
///
/// Built once by a decoder and read by everything downstream. Pitch range
/// and note order are established at construction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Melody {
    notes: Vec<Note>,
    beats_per_measure: u32,
    initial_tempo: Option<f64>,
    min_pitch: Option<u8>,
    max_pitch: Option<u8>,
}

impl Default for Melody {
    fn default() -> Self {
        Melody::new(Vec::new(), 4)
    }
}

impl Melody {
    /// Notes are stably sorted by start beat, so notes starting together
    /// keep the order they were decoded in. Notes without a positive,
    /// finite duration are dropped.
    pub fn new(mut notes: Vec<Note>, beats_per_measure: u32) -> Self {
        notes.retain(|n| n.duration.is_finite() && n.duration > 0.0 && n.start_beat >= 0.0);
        notes.sort_by(|a, b| a.start_beat.total_cmp(&b.start_beat));

        let min_pitch = notes.iter().map(|n| n.pitch).min();
        let max_pitch = notes.iter().map(|n| n.pitch).max();

        Melody {
            notes,
            beats_per_measure: beats_per_measure.max(1),
            initial_tempo: None,
            min_pitch,
            max_pitch,
        }
    }

    pub fn with_initial_tempo(mut self, bpm: f64) -> Self {
        if bpm.is_finite() && bpm > 0.0 {
            self.initial_tempo = Some(bpm);
        }
        self
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    pub fn beats_per_measure(&self) -> u32 {
        self.beats_per_measure
    }

    /// Tempo declared by the source, in quarter-note BPM.
    pub fn initial_tempo(&self) -> Option<f64> {
        self.initial_tempo
    }

    pub fn min_pitch(&self) -> Option<u8> {
        self.min_pitch
    }

    pub fn max_pitch(&self) -> Option<u8> {
        self.max_pitch
    }

    pub fn pitches(&self) -> impl Iterator<Item = u8> + '_ {
        self.notes.iter().map(|n| n.pitch)
    }

    /// Beat at which the last note ends.
    pub fn end_beat(&self) -> f64 {
        self.notes
            .iter()
            .map(Note::end_beat)
            .fold(0.0, f64::max)
    }

    /// Whole measures needed to hold every note; at least one.
    pub fn total_measures(&self) -> u32 {
        let measures = ((self.end_beat() - BEAT_EPSILON) / f64::from(self.beats_per_measure)).ceil();
        (measures as u32).max(1)
    }

    /// First beat of a 1-indexed measure.
    pub fn measure_start_beat(&self, measure: u32) -> f64 {
        f64::from(measure.saturating_sub(1)) * f64::from(self.beats_per_measure)
    }

    /// Beat at which a 1-indexed measure ends.
    pub fn measure_end_beat(&self, measure: u32) -> f64 {
        f64::from(measure) * f64::from(self.beats_per_measure)
    }

    /// 1-indexed measure containing `beat`.
    pub fn measure_at(&self, beat: f64) -> u32 {
        let index = (beat.max(0.0) / f64::from(self.beats_per_measure)).floor();
        index as u32 + 1
    }

    /// Notes overlapping the half-open window `[start, end)`.
    pub fn notes_between(&self, start: f64, end: f64) -> impl Iterator<Item = &Note> + '_ {
        self.notes.iter().filter(move |n| n.overlaps(start, end))
    }

    pub fn sounding_at(&self, beat: f64) -> impl Iterator<Item = &Note> + '_ {
        self.notes.iter().filter(move |n| n.sounds_at(beat))
    }
}

/// Quarter-note beats in a measure of `numerator/denominator`.
///
/// Compound and odd meters whose length is not a whole number of quarter
/// notes round half up: 6/8 gives 3, 3/8 gives 2, 7/8 gives 4.
pub fn beats_per_measure(numerator: u32, denominator: u32) -> u32 {
    if numerator == 0 || denominator == 0 {
        return 4;
    }
    let quarters = f64::from(numerator) * 4.0 / f64::from(denominator);
    ((quarters + 0.5).floor() as u32).max(1)
}

/// Metadata carried beside each tune of a multi-tune source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct TuneInfo {
    /// Position within the source file, 0-based
    pub index: usize,
    /// `X:` reference number
    pub reference: u32,
    pub title: Option<String>,
    pub composer: Option<String>,
    /// Key signature exactly as written, e.g. `Dmaj` or `Ador`
    pub declared_key: Option<String>,
}
