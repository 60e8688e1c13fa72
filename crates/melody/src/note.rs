use serde::{Deserialize, Serialize};

use crate::pitch::shift_pitch;

/// A single note with absolute timing in quarter-note beats.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// MIDI pitch, 60 = middle C
    pub pitch: u8,
    pub velocity: u8,
    pub start_beat: f64,
    /// Always positive
    pub duration: f64,
    pub channel: u8,
}

impl Note {
    pub fn new(pitch: u8, start_beat: f64, duration: f64) -> Self {
        Self {
            pitch,
            velocity: 80,
            start_beat,
            duration,
            channel: 0,
        }
    }

    pub fn with_velocity(mut self, velocity: u8) -> Self {
        self.velocity = velocity;
        self
    }

    pub fn on_channel(mut self, channel: u8) -> Self {
        self.channel = channel;
        self
    }

    pub fn end_beat(&self) -> f64 {
        self.start_beat + self.duration
    }

    /// Pitch after a semitone shift, `None` when it leaves the MIDI range.
    pub fn transposed(&self, semitones: i32) -> Option<u8> {
        shift_pitch(self.pitch, semitones)
    }

    /// Start inclusive, end exclusive.
    pub fn sounds_at(&self, beat: f64) -> bool {
        self.start_beat <= beat && beat < self.end_beat()
    }

    /// Whether the note overlaps the half-open window `[start, end)`.
    pub fn overlaps(&self, start: f64, end: f64) -> bool {
        self.start_beat < end && self.end_beat() > start
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_beat_adds_duration() {
        let note = Note::new(62, 1.5, 0.5);
        assert_eq!(note.end_beat(), 2.0);
    }

    #[test]
    fn sounds_at_is_half_open() {
        let note = Note::new(62, 1.0, 1.0);
        assert!(note.sounds_at(1.0));
        assert!(note.sounds_at(1.99));
        assert!(!note.sounds_at(2.0));
        assert!(!note.sounds_at(0.5));
    }

    #[test]
    fn transposed_stays_in_midi_range() {
        let note = Note::new(120, 0.0, 1.0);
        assert_eq!(note.transposed(7), Some(127));
        assert_eq!(note.transposed(8), None);
        assert_eq!(Note::new(3, 0.0, 1.0).transposed(-4), None);
    }

    #[test]
    fn overlap_window() {
        let note = Note::new(60, 2.0, 2.0);
        assert!(note.overlaps(3.0, 5.0));
        assert!(note.overlaps(0.0, 2.5));
        assert!(!note.overlaps(4.0, 6.0));
        assert!(!note.overlaps(0.0, 2.0));
    }
}
