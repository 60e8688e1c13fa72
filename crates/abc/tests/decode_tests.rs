//! Decoding whole ABC files.

use abc::{decode, decode_tune, tunes};
use melody::{DecodeError, FeedbackLevel};
use pretty_assertions::assert_eq;

const KESH: &str = include_str!("fixtures/kesh.abc");
const BOOK: &str = include_str!("fixtures/book.abc");
const NO_KEY: &str = include_str!("fixtures/no_key.abc");

fn pitches(melody: &melody::Melody) -> Vec<u8> {
    melody.notes().iter().map(|n| n.pitch).collect()
}

#[test]
fn jig_in_six_eight() {
    let decoded = decode(KESH).expect("kesh decodes");
    assert_eq!(decoded.len(), 1);

    let tune = &decoded[0].value;
    assert_eq!(tune.info.title.as_deref(), Some("The Kesh"));
    assert_eq!(tune.info.declared_key.as_deref(), Some("G"));
    assert_eq!(tune.melody.beats_per_measure(), 3);
    // Repeated section, pickup included
    assert_eq!(tune.melody.len(), 94);
    assert_eq!(&pitches(&tune.melody)[..4], &[62, 67, 69, 67]);
    assert_eq!(tune.melody.total_measures(), 16);
    assert!(decoded[0].warnings().next().is_none());
}

#[test]
fn book_with_three_tunes() {
    let decoded = decode(BOOK).expect("book decodes");
    let infos: Vec<_> = decoded
        .iter()
        .map(|d| (d.value.info.index, d.value.info.reference))
        .collect();
    assert_eq!(infos, vec![(0, 10), (1, 11), (2, 12)]);
    assert_eq!(decoded[2].value.info.composer.as_deref(), Some("Trad."));
}

#[test]
fn reel_with_endings() {
    let decoded = decode(BOOK).expect("book decodes");
    let reel = &decoded[0].value.melody;

    assert_eq!(reel.len(), 29);
    assert_eq!(reel.total_measures(), 4);
    assert_eq!(reel.initial_tempo(), Some(100.0));
    // F sharp from the key signature
    assert_eq!(pitches(reel)[0], 66);
}

#[test]
fn hornpipe_rhythms() {
    let decoded = decode(BOOK).expect("book decodes");
    let hornpipe = &decoded[1].value;

    assert_eq!(hornpipe.info.declared_key.as_deref(), Some("Ador"));
    assert_eq!(hornpipe.melody.len(), 17);
    assert_eq!(&pitches(&hornpipe.melody)[..4], &[76, 74, 72, 69]);
    let first = &hornpipe.melody.notes()[0];
    assert_eq!((first.start_beat, first.duration), (0.0, 0.75));
    assert!(decoded[1].warnings().next().is_none());
}

#[test]
fn air_with_tie_and_lyrics() {
    let decoded = decode(BOOK).expect("book decodes");
    let air = &decoded[2].value.melody;

    assert_eq!(pitches(air), vec![64, 67, 71, 69, 67, 66, 64]);
    assert_eq!(air.notes()[6].duration, 4.0);
    assert_eq!(air.total_measures(), 4);
}

#[test]
fn music_before_key_fails() {
    let err = decode(NO_KEY).unwrap_err();
    assert_eq!(
        err,
        DecodeError::Format("line 4: Body started before K: field".to_string())
    );
}

#[test]
fn dangling_continuation_fails() {
    let err = decode("X:1\nT:Cont\nM:4/4\nL:1/8\nK:D\nDEFG \\\n").unwrap_err();
    assert_eq!(
        err,
        DecodeError::Format("line 6: Unterminated line continuation".to_string())
    );
}

#[test]
fn one_bad_tune_does_not_block_the_others() {
    let text = format!("{}\n{}", NO_KEY, KESH);
    assert!(decode(&text).is_err());

    let sources = tunes(&text);
    assert_eq!(sources.len(), 2);
    assert!(decode_tune(&sources[0]).is_err());
    let kesh = decode_tune(&sources[1]).expect("second tune decodes");
    assert_eq!(kesh.value.info.index, 1);
    assert_eq!(kesh.value.melody.len(), 94);
}

#[test]
fn empty_input_has_no_tunes() {
    assert_eq!(
        decode("% only a comment\n").unwrap_err(),
        DecodeError::Format("no tunes found".to_string())
    );
}

#[test]
fn measure_warnings_point_into_the_file() {
    let text = "X:1\nK:C\nCDEF|\n\nX:2\nM:4/4\nL:1/4\nK:C\nCDEF|\nCDE|\nCDEF|CDEF|\n";
    let decoded = decode(text).expect("decodes with warnings");

    let measure_lines: Vec<_> = decoded[1]
        .feedback
        .iter()
        .filter(|f| f.level == FeedbackLevel::Warning && f.message.starts_with("Measure"))
        .map(|f| f.line)
        .collect();
    assert_eq!(measure_lines, vec![10]);
}

#[test]
fn missing_meter_defaults_to_common_time() {
    let decoded = decode("X:1\nT:No meter\nK:D\nDEFG ABcd|\n").expect("decodes");
    assert_eq!(decoded[0].value.melody.beats_per_measure(), 4);
    assert!(decoded[0]
        .warnings()
        .any(|w| w.message.starts_with("Missing M:")));
}

#[test]
fn runaway_octave_marks_drop_the_note() {
    let text = format!("X:1\nT:t\nM:4/4\nL:1/4\nK:C\nc{}\n", "'".repeat(127));
    let decoded = decode(&text).expect("decodes with warnings");
    assert!(decoded[0].value.melody.is_empty());
    assert!(decoded[0]
        .warnings()
        .any(|w| w.message.contains("outside the MIDI range")));

    let text = format!("X:1\nT:t\nM:4/4\nL:1/4\nK:C\nC{} D\n", ",".repeat(200));
    let decoded = decode(&text).expect("decodes with warnings");
    assert_eq!(pitches(&decoded[0].value.melody), vec![62]);
}
