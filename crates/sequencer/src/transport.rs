//! Transport state machine, free of any clock.
//!
//! Time enters only through [`Transport::advance`], so every rule here can
//! be driven step by step.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use melody::{Melody, Note};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Limits and defaults for a sequencer.
#[derive(Debug, Clone, PartialEq)]
pub struct SequencerConfig {
    /// Time between cursor updates while playing
    pub tick_interval: Duration,
    pub min_tempo: f64,
    pub max_tempo: f64,
    pub default_tempo: f64,
    pub looping: bool,
}

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ConfigError {
    #[error("tempo bounds must satisfy 0 < min <= max, got {min}..={max}")]
    TempoBounds { min: f64, max: f64 },

    #[error("default tempo {0} is not a finite number")]
    DefaultTempo(f64),

    #[error("tick interval must be longer than zero")]
    ZeroTickInterval,
}

impl SequencerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let (min, max) = (self.min_tempo, self.max_tempo);
        if !(min.is_finite() && max.is_finite() && min > 0.0 && min <= max) {
            return Err(ConfigError::TempoBounds { min, max });
        }
        if !self.default_tempo.is_finite() {
            return Err(ConfigError::DefaultTempo(self.default_tempo));
        }
        if self.tick_interval.is_zero() {
            return Err(ConfigError::ZeroTickInterval);
        }
        Ok(())
    }
}

impl Default for SequencerConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(20),
            min_tempo: 40.0,
            max_tempo: 240.0,
            default_tempo: 120.0,
            looping: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlayState {
    Stopped,
    Playing,
    Paused,
}

impl fmt::Display for PlayState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlayState::Stopped => write!(f, "stopped"),
            PlayState::Playing => write!(f, "playing"),
            PlayState::Paused => write!(f, "paused"),
        }
    }
}

/// Playback region, 1-indexed measures, both ends inclusive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub start_measure: u32,
    pub end_measure: u32,
}

/// What one call to [`Transport::advance`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// Not playing, nothing moved
    Idle,
    Moved,
    /// Passed the region end and jumped back to its start
    Wrapped,
    /// Reached the region end without looping and stopped there
    Finished,
}

/// Everything a cursor renderer needs, copied out in one go.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    pub beat: f64,
    /// 1-indexed measure under the cursor
    pub measure: u32,
    /// Offset from the start of that measure, in beats
    pub beat_in_measure: f64,
    pub tempo: f64,
    pub state: PlayState,
    pub region: Region,
    pub looping: bool,
    pub transpose: i32,
}

#[derive(Debug, Clone)]
pub struct Transport {
    melody: Arc<Melody>,
    config: SequencerConfig,
    state: PlayState,
    beat: f64,
    tempo: f64,
    looping: bool,
    region: Region,
    transpose: i32,
}

impl Transport {
    pub fn new(melody: Arc<Melody>, config: SequencerConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        let tempo = config.default_tempo.clamp(config.min_tempo, config.max_tempo);
        let looping = config.looping;
        let region = full_region(&melody);
        Ok(Self {
            melody,
            config,
            state: PlayState::Stopped,
            beat: 0.0,
            tempo,
            looping,
            region,
            transpose: 0,
        })
    }

    /// Swap in a new melody: stopped at beat 0, region covering every
    /// measure, no transposition. Tempo and looping carry over.
    pub fn load(&mut self, melody: Arc<Melody>) {
        self.region = full_region(&melody);
        self.melody = melody;
        self.state = PlayState::Stopped;
        self.beat = 0.0;
        self.transpose = 0;
    }

    pub fn melody(&self) -> &Arc<Melody> {
        &self.melody
    }

    pub fn state(&self) -> PlayState {
        self.state
    }

    pub fn beat(&self) -> f64 {
        self.beat
    }

    pub fn tempo(&self) -> f64 {
        self.tempo
    }

    pub fn region(&self) -> Region {
        self.region
    }

    pub fn looping(&self) -> bool {
        self.looping
    }

    pub fn transpose(&self) -> i32 {
        self.transpose
    }

    pub fn region_start_beat(&self) -> f64 {
        self.melody.measure_start_beat(self.region.start_measure)
    }

    pub fn region_end_beat(&self) -> f64 {
        self.melody.measure_end_beat(self.region.end_measure)
    }

    /// Start or resume. Returns `false` if already playing.
    pub fn play(&mut self) -> bool {
        match self.state {
            PlayState::Playing => false,
            PlayState::Stopped | PlayState::Paused => {
                if self.beat >= self.region_end_beat() {
                    self.beat = self.region_start_beat();
                }
                self.state = PlayState::Playing;
                true
            }
        }
    }

    /// Freeze the cursor. Returns `false` unless playing.
    pub fn pause(&mut self) -> bool {
        if self.state != PlayState::Playing {
            return false;
        }
        self.state = PlayState::Paused;
        true
    }

    pub fn stop(&mut self) {
        self.state = PlayState::Stopped;
        self.beat = self.region_start_beat();
    }

    /// Back to the region start without changing the play state.
    pub fn rewind(&mut self) {
        self.beat = self.region_start_beat();
    }

    /// Move the cursor, clamped into the region. Returns the new beat.
    pub fn set_position(&mut self, beat: f64) -> f64 {
        if beat.is_nan() {
            return self.beat;
        }
        self.beat = beat.clamp(self.region_start_beat(), self.region_end_beat());
        self.beat
    }

    /// Change the region. An empty or out-of-range region is refused and
    /// the current one kept. The cursor is pulled into the new region.
    pub fn set_region(&mut self, start_measure: u32, end_measure: u32) -> bool {
        let total = self.melody.total_measures();
        if start_measure < 1 || start_measure > end_measure || end_measure > total {
            warn!(
                start_measure,
                end_measure, total, "rejected playback region, keeping the current one"
            );
            return false;
        }
        self.region = Region {
            start_measure,
            end_measure,
        };
        self.beat = self.beat.clamp(self.region_start_beat(), self.region_end_beat());
        debug!(start_measure, end_measure, "playback region set");
        true
    }

    /// Set the tempo, clamped to the configured bounds. Returns the tempo
    /// actually applied.
    pub fn set_tempo(&mut self, bpm: f64) -> f64 {
        if bpm.is_nan() {
            return self.tempo;
        }
        self.tempo = bpm.clamp(self.config.min_tempo, self.config.max_tempo);
        self.tempo
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn set_transpose(&mut self, semitones: i32) {
        self.transpose = semitones;
    }

    /// Move the cursor by `elapsed` of real time at the current tempo.
    ///
    /// Passing the region end either wraps to the region start, keeping
    /// the overshoot, or stops at the end.
    pub fn advance(&mut self, elapsed: Duration) -> Advance {
        if self.state != PlayState::Playing {
            return Advance::Idle;
        }
        let start = self.region_start_beat();
        let end = self.region_end_beat();
        let next = self.beat + elapsed.as_secs_f64() * self.tempo / 60.0;

        if next < end {
            self.beat = next;
            return Advance::Moved;
        }
        if self.looping && end > start {
            self.beat = start + (next - end) % (end - start);
            debug!(beat = self.beat, "looped to region start");
            Advance::Wrapped
        } else {
            self.beat = end;
            self.state = PlayState::Stopped;
            debug!(beat = end, "reached region end");
            Advance::Finished
        }
    }

    pub fn snapshot(&self) -> Snapshot {
        let measure = self.measure_at_cursor();
        Snapshot {
            beat: self.beat,
            measure,
            beat_in_measure: self.beat - self.melody.measure_start_beat(measure),
            tempo: self.tempo,
            state: self.state,
            region: self.region,
            looping: self.looping,
            transpose: self.transpose,
        }
    }

    /// Measure under the cursor. The region end belongs to the last
    /// region measure, not the one after it.
    fn measure_at_cursor(&self) -> u32 {
        self.melody
            .measure_at(self.beat)
            .min(self.region.end_measure)
            .max(self.region.start_measure)
    }

    /// Notes under the cursor with the transposition applied.
    pub fn sounding_notes(&self) -> Vec<Note> {
        self.shifted(self.melody.sounding_at(self.beat))
    }

    /// Notes overlapping `[start, end)` with the transposition applied.
    pub fn notes_between(&self, start: f64, end: f64) -> Vec<Note> {
        self.shifted(self.melody.notes_between(start, end))
    }

    fn shifted<'a>(&self, notes: impl Iterator<Item = &'a Note>) -> Vec<Note> {
        notes
            .filter_map(|note| {
                note.transposed(self.transpose).map(|pitch| Note { pitch, ..*note })
            })
            .collect()
    }
}

fn full_region(melody: &Melody) -> Region {
    Region {
        start_measure: 1,
        end_measure: melody.total_measures(),
    }
}
