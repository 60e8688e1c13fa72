//! `whistly inspect` output.

use std::fmt;

use melody::{pitch_name, Feedback, FeedbackLevel, Melody};
use serde::Serialize;
use whistle_theory::{
    current_displayed_key, pitch_to_fingering, Fingering, InstrumentProfile, KeySource, StartingShift,
    TransposePlan,
};

use crate::load::{LoadedTune, SourceKind};

#[derive(Debug, Serialize)]
pub struct NoteFingering {
    pub start_beat: f64,
    pub measure: u32,
    /// Pitch after transposition
    pub pitch: u8,
    pub name: String,
    /// `None` when the whistle cannot play it
    pub fingering: Option<Fingering>,
}

#[derive(Debug, Serialize)]
pub struct InspectReport<'a> {
    pub kind: SourceKind,
    pub title: Option<&'a str>,
    pub reference: Option<u32>,
    pub notes: usize,
    pub measures: u32,
    pub beats_per_measure: u32,
    pub initial_tempo: Option<f64>,
    pub whistle: &'a str,
    #[serde(skip)]
    pub profile: &'a InstrumentProfile,
    pub plan: &'a TransposePlan,
    pub starting_shift: StartingShift,
    /// Shift the fingerings below are computed at
    pub transpose: i32,
    pub transposed_key: String,
    pub feedback: &'a [Feedback],
    pub fingerings: Vec<NoteFingering>,
}

impl<'a> InspectReport<'a> {
    pub fn new(
        tune: &'a LoadedTune,
        profile: &'a InstrumentProfile,
        plan: &'a TransposePlan,
        starting_shift: StartingShift,
    ) -> Self {
        let transpose = plan.shift_for(starting_shift);
        InspectReport {
            kind: tune.kind,
            title: tune.title.as_deref(),
            reference: tune.reference,
            notes: tune.melody.len(),
            measures: tune.melody.total_measures(),
            beats_per_measure: tune.melody.beats_per_measure(),
            initial_tempo: tune.melody.initial_tempo(),
            whistle: profile.key.name(),
            profile,
            plan,
            starting_shift,
            transpose,
            transposed_key: current_displayed_key(&plan.base_key, transpose),
            feedback: &tune.feedback,
            fingerings: fingerings(&tune.melody, profile, transpose),
        }
    }
}

/// Fingering for every note, transposed. Notes shifted out of MIDI range
/// are left out.
pub fn fingerings(melody: &Melody, profile: &InstrumentProfile, transpose: i32) -> Vec<NoteFingering> {
    melody
        .notes()
        .iter()
        .filter_map(|note| {
            let pitch = note.transposed(transpose)?;
            Some(NoteFingering {
                start_beat: note.start_beat,
                measure: melody.measure_at(note.start_beat),
                pitch,
                name: pitch_name(pitch),
                fingering: pitch_to_fingering(pitch, profile),
            })
        })
        .collect()
}

/// `D5 I+`, or `F5 --` when unplayable.
pub fn note_label(pitch: u8, fingering: Option<Fingering>) -> String {
    match fingering {
        Some(f) => format!("{} {}", pitch_name(pitch), f),
        None => format!("{} --", pitch_name(pitch)),
    }
}

impl fmt::Display for InspectReport<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let plan = self.plan;
        let profile = self.profile;

        let title = self.title.unwrap_or("(untitled)");
        match self.reference {
            Some(reference) => writeln!(f, "{title} (X:{reference})")?,
            None => writeln!(f, "{title}")?,
        }
        let tempo = self
            .initial_tempo
            .map(|bpm| format!(", {bpm:.0} bpm"))
            .unwrap_or_default();
        writeln!(
            f,
            "  {} notes, {} measures of {} beats{tempo}",
            self.notes, self.measures, self.beats_per_measure
        )?;

        let source = match plan.key_source {
            KeySource::Declared => "declared".to_string(),
            KeySource::Detected { confidence } => format!("detected, confidence {confidence:.2}"),
        };
        writeln!(f, "  key: {} ({source})", plan.base_key)?;
        writeln!(
            f,
            "  whistle: {} ({}..={})",
            profile.key.display_name(),
            pitch_name(profile.low),
            pitch_name(profile.high)
        )?;

        if plan.variants.is_empty() {
            writeln!(f, "  playable keys: none without cross-fingering")?;
        } else {
            let keys: Vec<String> = plan
                .variants
                .iter()
                .map(|v| format!("{} ({:+})", v.key, v.transpose))
                .collect();
            writeln!(f, "  playable keys: {}", keys.join(", "))?;
        }
        writeln!(
            f,
            "  whistle fit: {:+} -> {}{}",
            plan.recommended_transpose,
            plan.displayed_key,
            if plan.fully_playable() { "" } else { " (some notes unplayable)" }
        )?;
        writeln!(f, "  octave 4: {:+}", plan.octave4_transpose)?;
        let start = match self.starting_shift {
            StartingShift::Octave4 => "octave 4",
            StartingShift::Whistle => "whistle fit",
        };
        writeln!(f, "  transpose: {:+} -> {} ({start})", self.transpose, self.transposed_key)?;

        for item in self.feedback {
            let level = match item.level {
                FeedbackLevel::Error => "error",
                FeedbackLevel::Warning => "warning",
                FeedbackLevel::Info => "note",
            };
            if item.line > 0 {
                writeln!(f, "  {level}: line {}: {}", item.line, item.message)?;
            } else {
                writeln!(f, "  {level}: {}", item.message)?;
            }
        }

        writeln!(f)?;
        let mut current_measure = 0;
        for note in &self.fingerings {
            if note.measure != current_measure {
                if current_measure != 0 {
                    writeln!(f)?;
                }
                current_measure = note.measure;
                write!(f, "{current_measure:>4} |")?;
            }
            write!(f, " {}", note_label(note.pitch, note.fingering))?;
        }
        if current_measure != 0 {
            writeln!(f)?;
        }
        Ok(())
    }
}
