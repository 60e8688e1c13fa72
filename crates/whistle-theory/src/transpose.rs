//! Transposition search.
//!
//! A transposed melody is always the original notes plus a semitone
//! offset. Nothing here rewrites pitches.

use std::cmp::Ordering;

use melody::key::split_tonic;
use melody::{spell_tonic, Note, TonalKey};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::instrument::InstrumentProfile;

/// A key the whole melody can be played in, and the shift that gets there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlayableKeyVariant {
    pub key: String,
    pub transpose: i32,
    /// Lowest pitch after the shift
    pub lowest_pitch: u8,
}

fn pitch_span(notes: &[Note]) -> Option<(u8, u8)> {
    let min = notes.iter().map(|n| n.pitch).min()?;
    let max = notes.iter().map(|n| n.pitch).max()?;
    Some((min, max))
}

/// Shift that puts the melody's tonic on the whistle's tonic (when
/// `from == to`) or on `to`'s tonic.
///
/// Every octave that keeps the melody inside MIDI is a candidate. When no
/// candidate fits the span inside the playable range, only those that
/// come closest are kept. Among those the winner leaves the fewest notes
/// outside the range, then shifts least, then best centers the melody.
pub fn optimal_transpose(
    from: &TonalKey,
    to: &TonalKey,
    notes: &[Note],
    profile: &InstrumentProfile,
) -> i32 {
    let target = if from == to {
        profile.tonic_pitch_class
    } else {
        to.tonic
    };
    let base = (i32::from(target) - i32::from(from.tonic)).rem_euclid(12);
    let span = pitch_span(notes);

    let fits_midi = |shift: i32| match span {
        Some((min, max)) => i32::from(min) + shift >= 0 && i32::from(max) + shift <= 127,
        None => true,
    };
    let outside = |shift: i32| {
        notes
            .iter()
            .filter(|n| {
                let p = i32::from(n.pitch) + shift;
                p < i32::from(profile.low) || p > i32::from(profile.high)
            })
            .count()
    };
    // Semitones by which the shifted span overhangs the range
    let overhang = |shift: i32| match span {
        Some((min, max)) => {
            let below = i32::from(profile.low) - (i32::from(min) + shift);
            let above = i32::from(max) + shift - i32::from(profile.high);
            below.max(0) + above.max(0)
        }
        None => 0,
    };
    let off_center = |shift: i32| match span {
        Some((min, max)) => ((f64::from(min) + f64::from(max)) / 2.0 + f64::from(shift) - profile.center()).abs(),
        None => 0.0,
    };

    let candidates: Vec<i32> = (-11..=10)
        .map(|octave| base + 12 * octave)
        .filter(|s| fits_midi(*s))
        .collect();
    let closest = candidates.iter().map(|s| overhang(*s)).min().unwrap_or(0);

    let best = candidates
        .into_iter()
        .filter(|s| overhang(*s) == closest)
        .min_by(|a, b| {
            outside(*a)
                .cmp(&outside(*b))
                .then(a.abs().cmp(&b.abs()))
                .then(off_center(*a).total_cmp(&off_center(*b)))
                .then(a.cmp(b))
        });

    let shift = best.unwrap_or(0);
    debug!(from = %from, to = %to, shift, "optimal transpose");
    shift
}

/// Shift that puts the melody's tonic in the octave nearest middle C.
///
/// The reference is the lowest note on the tonic, or the tonic just below
/// the lowest note when the melody never plays it. The target is the
/// tonic instance nearest MIDI 60, the lower one on a tie.
pub fn transpose_to_octave4(key: &TonalKey, notes: &[Note]) -> i32 {
    let Some((min, max)) = pitch_span(notes) else {
        return 0;
    };
    let tonic = i32::from(key.tonic);
    let reference = notes
        .iter()
        .map(|n| i32::from(n.pitch))
        .filter(|p| p % 12 == tonic)
        .min()
        .unwrap_or_else(|| {
            let min = i32::from(min);
            min - (min - tonic).rem_euclid(12)
        });

    let target = if tonic < 6 { 60 + tonic } else { 48 + tonic };
    let mut shift = target - reference;

    // Stay inside MIDI even for extreme melodies
    while i32::from(max) + shift > 127 {
        shift -= 12;
    }
    while i32::from(min) + shift < 0 {
        shift += 12;
    }
    shift
}

/// Every key in which the entire melody is playable, each with the
/// smallest shift that reaches it, ordered by shift size and then by
/// shift value.
///
/// `base_key` names the melody's key as written. When it does not parse,
/// keys are named as if the melody were in C.
pub fn find_playable_key_variants(
    notes: &[Note],
    profile: &InstrumentProfile,
    base_key: &str,
) -> Vec<PlayableKeyVariant> {
    let Some((min, max)) = pitch_span(notes) else {
        return Vec::new();
    };

    let lowest = i32::from(profile.low) - i32::from(min);
    let highest = i32::from(profile.high) - i32::from(max);

    let mut shifts: Vec<i32> = (lowest..=highest)
        .filter(|&shift| {
            notes.iter().all(|n| {
                let pitch_class = (i32::from(n.pitch) + shift).rem_euclid(12) as u8;
                profile.is_diatonic(pitch_class)
            })
        })
        .collect();
    shifts.sort_by(|a, b| by_magnitude(*a, *b));

    let mut seen = [false; 12];
    let mut variants = Vec::new();
    for shift in shifts {
        let class = shift.rem_euclid(12) as usize;
        if seen[class] {
            continue;
        }
        seen[class] = true;
        variants.push(PlayableKeyVariant {
            key: displayed_key_or_c(base_key, shift),
            transpose: shift,
            lowest_pitch: (i32::from(min) + shift) as u8,
        });
    }
    debug!(base_key, count = variants.len(), "playable key variants");
    variants
}

fn by_magnitude(a: i32, b: i32) -> Ordering {
    a.abs().cmp(&b.abs()).then(a.cmp(&b))
}

fn displayed_key_or_c(base_key: &str, transpose: i32) -> String {
    if split_tonic(base_key).is_some() {
        current_displayed_key(base_key, transpose)
    } else {
        current_displayed_key("C", transpose)
    }
}

/// Name of `base_key` after a shift: the tonic is respelled and any mode
/// text is kept as written. Unrecognized names come back unchanged.
pub fn current_displayed_key(base_key: &str, transpose: i32) -> String {
    match split_tonic(base_key) {
        Some((tonic, rest)) => {
            let shifted = (i32::from(tonic) + transpose).rem_euclid(12) as u8;
            format!("{}{}", spell_tonic(shifted), rest)
        }
        None => base_key.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instrument::WhistleKey;
    use melody::Mode;
    use pretty_assertions::assert_eq;

    fn notes(pitches: &[u8]) -> Vec<Note> {
        pitches
            .iter()
            .enumerate()
            .map(|(i, &p)| Note::new(p, i as f64, 1.0))
            .collect()
    }

    fn d_whistle() -> InstrumentProfile {
        InstrumentProfile::standard(WhistleKey::D)
    }

    #[test]
    fn g_major_tune_moves_to_d() {
        // G A B c d
        let tune = notes(&[67, 69, 71, 72, 74]);
        let g = TonalKey::major(7);
        let shift = optimal_transpose(&g, &g, &tune, &d_whistle());
        // Down a fourth keeps everything in range, up a fifth does too but
        // shifts further
        assert_eq!(shift, -5);
    }

    #[test]
    fn octave_is_chosen_by_range() {
        // D major tune an octave below the whistle
        let tune = notes(&[50, 52, 54, 55, 57]);
        let d = TonalKey::major(2);
        assert_eq!(optimal_transpose(&d, &d, &tune, &d_whistle()), 12);
    }

    #[test]
    fn explicit_target_key() {
        let tune = notes(&[62, 66, 69]);
        let shift = optimal_transpose(&TonalKey::major(2), &TonalKey::major(7), &tune, &d_whistle());
        assert_eq!(shift, 5);
    }

    #[test]
    fn already_aligned_melody_stays_put() {
        let tune = notes(&[62, 64, 66, 67, 69, 71, 74]);
        let d = TonalKey::major(2);
        assert_eq!(optimal_transpose(&d, &d, &tune, &d_whistle()), 0);
    }

    #[test]
    fn extreme_melodies_are_pulled_into_range() {
        let d = TonalKey::major(2);
        assert_eq!(optimal_transpose(&TonalKey::major(0), &d, &notes(&[0]), &d_whistle()), 62);
        assert_eq!(optimal_transpose(&d, &d, &notes(&[2, 4, 6]), &d_whistle()), 60);

        let top = optimal_transpose(&TonalKey::major(7), &d, &notes(&[127]), &d_whistle());
        let landed = 127 + top;
        assert!((62..=85).contains(&landed), "landed on {landed}");
        assert_eq!(top, -53);
    }

    #[test]
    fn span_wider_than_range_gets_closest_fit() {
        // Three octaves of D never fit; staying put overhangs least
        let d = TonalKey::major(2);
        let wide = notes(&[50, 62, 74, 86]);
        assert_eq!(optimal_transpose(&d, &d, &wide, &d_whistle()), 0);
        // Same span far away still comes back
        let far = notes(&[2, 14, 26, 38]);
        assert_eq!(optimal_transpose(&d, &d, &far, &d_whistle()), 48);
    }

    #[test]
    fn octave4_places_tonic_near_middle_c() {
        let d = TonalKey::major(2);
        assert_eq!(transpose_to_octave4(&d, &notes(&[74, 76, 78])), -12);
        assert_eq!(transpose_to_octave4(&d, &notes(&[62, 66])), 0);

        // A sits nearer 57 than 69
        let a = TonalKey::new(9, Mode::Dorian);
        assert_eq!(transpose_to_octave4(&a, &notes(&[69, 71, 72])), -12);

        // F# ties between 54 and 66; the lower wins
        let f_sharp = TonalKey::minor(6);
        assert_eq!(transpose_to_octave4(&f_sharp, &notes(&[66, 69])), -12);
    }

    #[test]
    fn octave4_without_tonic_note() {
        // No D in the tune: reference is the D below 64
        let d = TonalKey::major(2);
        assert_eq!(transpose_to_octave4(&d, &notes(&[76, 78])), -12);
        assert_eq!(transpose_to_octave4(&d, &[]), 0);
    }

    #[test]
    fn variants_for_d_major_on_d_whistle() {
        let tune = notes(&[62, 64, 66, 67, 69, 71, 73, 74]);
        let variants = find_playable_key_variants(&tune, &d_whistle(), "D");
        assert_eq!(
            variants[0],
            PlayableKeyVariant {
                key: "D".to_string(),
                transpose: 0,
                lowest_pitch: 62
            }
        );
        // Every variant stays inside the range
        for v in &variants {
            assert!(i32::from(v.lowest_pitch) >= 62);
        }
        let magnitudes: Vec<i32> = variants.iter().map(|v| v.transpose.abs()).collect();
        let mut sorted = magnitudes.clone();
        sorted.sort();
        assert_eq!(magnitudes, sorted);
    }

    #[test]
    fn variants_keep_mode_text() {
        let tune = notes(&[69, 71, 72, 74, 76]);
        let variants = find_playable_key_variants(&tune, &d_whistle(), "Ador");
        let keys: Vec<&str> = variants.iter().map(|v| v.key.as_str()).collect();
        assert!(keys.contains(&"Ador"));
        assert!(keys.iter().all(|k| k.ends_with("dor")));
    }

    #[test]
    fn no_variants_for_chromatic_runs_or_empty_input() {
        let chromatic = notes(&[62, 63, 64, 65, 66, 67]);
        assert_eq!(find_playable_key_variants(&chromatic, &d_whistle(), "D"), vec![]);
        assert_eq!(find_playable_key_variants(&[], &d_whistle(), "D"), vec![]);
    }

    #[test]
    fn too_wide_for_any_shift() {
        let wide = notes(&[50, 86]);
        assert_eq!(find_playable_key_variants(&wide, &d_whistle(), "D"), vec![]);
    }

    #[test]
    fn displayed_key() {
        assert_eq!(current_displayed_key("D", 0), "D");
        assert_eq!(current_displayed_key("Dmaj", 2), "Emaj");
        assert_eq!(current_displayed_key("G", -5), "D");
        assert_eq!(current_displayed_key("F#m", 1), "Gm");
        assert_eq!(current_displayed_key("D", 1), "Eb");
        assert_eq!(current_displayed_key("Ador", -12), "Ador");
        assert_eq!(current_displayed_key("none", 3), "none");
    }
}
