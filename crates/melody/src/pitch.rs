//! Pitch naming helpers.

const SHARP_NAMES: [&str; 12] = [
    "C", "C#", "D", "D#", "E", "F", "F#", "G", "G#", "A", "A#", "B",
];

/// Tonic spellings as whistle players name keys: C#, Eb, F#, Ab, Bb.
const TONIC_NAMES: [&str; 12] = [
    "C", "C#", "D", "Eb", "E", "F", "F#", "G", "Ab", "A", "Bb", "B",
];

/// Sharp-spelled name of a pitch class.
pub fn pitch_class_name(pitch_class: u8) -> &'static str {
    SHARP_NAMES[(pitch_class % 12) as usize]
}

/// Key-tonic spelling of a pitch class.
pub fn spell_tonic(pitch_class: u8) -> &'static str {
    TONIC_NAMES[(pitch_class % 12) as usize]
}

/// Name with octave, middle C is `C4`.
pub fn pitch_name(pitch: u8) -> String {
    let octave = i32::from(pitch / 12) - 1;
    format!("{}{}", pitch_class_name(pitch), octave)
}

/// Shift a pitch, `None` when the result leaves 0..=127.
pub fn shift_pitch(pitch: u8, semitones: i32) -> Option<u8> {
    let shifted = i32::from(pitch) + semitones;
    if (0..=127).contains(&shifted) {
        Some(shifted as u8)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_with_octave() {
        assert_eq!(pitch_name(60), "C4");
        assert_eq!(pitch_name(61), "C#4");
        assert_eq!(pitch_name(74), "D5");
        assert_eq!(pitch_name(0), "C-1");
        assert_eq!(pitch_name(127), "G9");
    }

    #[test]
    fn tonic_spelling_prefers_flats_where_whistles_do() {
        assert_eq!(spell_tonic(3), "Eb");
        assert_eq!(spell_tonic(6), "F#");
        assert_eq!(spell_tonic(10), "Bb");
        assert_eq!(spell_tonic(13), "C#");
    }

    #[test]
    fn shift_bounds() {
        assert_eq!(shift_pitch(60, 12), Some(72));
        assert_eq!(shift_pitch(60, -61), None);
        assert_eq!(shift_pitch(127, 1), None);
    }
}
