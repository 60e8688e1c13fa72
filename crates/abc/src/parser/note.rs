//! Note, chord, and rest parsing using winnow combinators.

use winnow::combinator::{alt, opt};
use winnow::prelude::*;
use winnow::token::{one_of, take_while};

use crate::ast::{Accidental, Chord, Duration, Note, NoteName, Rest};

type PResult<T> = winnow::ModalResult<T>;

/// Run a parser, restoring the input if it fails part way through.
pub fn attempt<'a, O>(
    mut parser: impl Parser<&'a str, O, winnow::error::ErrMode<winnow::error::ContextError>>,
    input: &mut &'a str,
) -> Option<O> {
    let checkpoint = *input;
    match parser.parse_next(input) {
        Ok(value) => Some(value),
        Err(_) => {
            *input = checkpoint;
            None
        }
    }
}

/// Letter and base octave: uppercase is octave 0, lowercase octave 1.
pub fn parse_pitch(input: &mut &str) -> PResult<(NoteName, i32)> {
    let c = one_of(|c: char| matches!(c, 'A'..='G' | 'a'..='g')).parse_next(input)?;
    let octave = if c.is_ascii_lowercase() { 1 } else { 0 };
    let name = NoteName::from_letter(c).unwrap_or_default();
    Ok((name, octave))
}

pub fn parse_accidental(input: &mut &str) -> PResult<Accidental> {
    alt((
        "^^".value(Accidental::DoubleSharp),
        "^".value(Accidental::Sharp),
        "__".value(Accidental::DoubleFlat),
        "_".value(Accidental::Flat),
        "=".value(Accidental::Natural),
    ))
    .parse_next(input)
}

/// Net octave shift from trailing `'` and `,` marks.
pub fn parse_octave_modifier(input: &mut &str) -> PResult<i32> {
    let marks: &str = take_while(0.., ['\'', ',']).parse_next(input)?;
    Ok(marks.chars().fold(0i32, |octave, c| match c {
        '\'' => octave.saturating_add(1),
        _ => octave.saturating_sub(1),
    }))
}

/// Duration suffix: `2`, `/2`, `/`, `//`, `3/2`.
pub fn parse_duration(input: &mut &str) -> PResult<Duration> {
    let multiplier: &str = take_while(0.., |c: char| c.is_ascii_digit()).parse_next(input)?;
    let numerator = multiplier.parse().unwrap_or(1);

    let slashes: &str = take_while(0.., '/').parse_next(input)?;
    let denominator = if slashes.is_empty() {
        1
    } else {
        let digits: &str = take_while(0.., |c: char| c.is_ascii_digit()).parse_next(input)?;
        match digits.parse::<u16>() {
            Ok(d) if d > 0 => d,
            // Each bare slash halves
            _ => 1u16 << slashes.len().min(8),
        }
    };

    Ok(Duration::new(numerator, denominator))
}

pub fn parse_note(input: &mut &str) -> PResult<Note> {
    let accidental = opt(parse_accidental).parse_next(input)?;
    let (pitch, base_octave) = parse_pitch(input)?;
    let octave_mod = parse_octave_modifier(input)?;
    let duration = parse_duration(input)?;
    let tie = opt('-').parse_next(input)?.is_some();

    Ok(Note {
        pitch,
        octave: base_octave.saturating_add(octave_mod),
        accidental,
        duration,
        tie,
    })
}

/// `z`, `x` (invisible, same timing), `Z`/`Z4` whole-measure rests.
pub fn parse_rest(input: &mut &str) -> PResult<Rest> {
    let rest_char = one_of(['z', 'x', 'Z', 'X']).parse_next(input)?;

    if rest_char == 'Z' || rest_char == 'X' {
        let count: &str = take_while(0.., |c: char| c.is_ascii_digit()).parse_next(input)?;
        return Ok(Rest {
            duration: Duration::unit(),
            multi_measure: Some(count.parse().unwrap_or(1)),
        });
    }

    let duration = parse_duration(input)?;
    Ok(Rest {
        duration,
        multi_measure: None,
    })
}

/// `[CEG]2`: the suffix scales the first note's own length.
pub fn parse_chord(input: &mut &str) -> PResult<Chord> {
    '['.parse_next(input)?;

    let mut notes = Vec::new();
    loop {
        *input = input.trim_start_matches(' ');
        match attempt(parse_note, input) {
            Some(note) => notes.push(note),
            None => break,
        }
    }

    ']'.parse_next(input)?;
    let duration = parse_duration(input)?;
    if opt('-').parse_next(input)?.is_some() {
        for note in &mut notes {
            note.tie = true;
        }
    }

    Ok(Chord { notes, duration })
}

/// Quoted chord symbol or annotation: `"G"`, `"^fine"`.
pub fn parse_quoted(input: &mut &str) -> PResult<String> {
    '"'.parse_next(input)?;
    let text: &str = take_while(0.., |c: char| c != '"' && c != '\n').parse_next(input)?;
    '"'.parse_next(input)?;
    Ok(text.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pitch_case_selects_octave() {
        assert_eq!(parse_pitch(&mut "C").unwrap(), (NoteName::C, 0));
        assert_eq!(parse_pitch(&mut "c").unwrap(), (NoteName::C, 1));
        assert!(parse_pitch(&mut "H").is_err());
    }

    #[test]
    fn accidentals() {
        assert_eq!(parse_accidental(&mut "^").unwrap(), Accidental::Sharp);
        assert_eq!(parse_accidental(&mut "^^").unwrap(), Accidental::DoubleSharp);
        assert_eq!(parse_accidental(&mut "_").unwrap(), Accidental::Flat);
        assert_eq!(parse_accidental(&mut "__").unwrap(), Accidental::DoubleFlat);
        assert_eq!(parse_accidental(&mut "=").unwrap(), Accidental::Natural);
    }

    #[test]
    fn octave_marks() {
        assert_eq!(parse_octave_modifier(&mut "''").unwrap(), 2);
        assert_eq!(parse_octave_modifier(&mut ",").unwrap(), -1);
        assert_eq!(parse_octave_modifier(&mut "").unwrap(), 0);
        assert_eq!(parse_octave_modifier(&mut "',").unwrap(), 0);
    }

    #[test]
    fn long_runs_of_octave_marks_keep_their_sign() {
        let ups = "'".repeat(300);
        assert_eq!(parse_octave_modifier(&mut ups.as_str()).unwrap(), 300);

        let downs = ",".repeat(200);
        let note = parse_note(&mut format!("C{}", downs).as_str()).unwrap();
        assert_eq!(note.octave, -200);
    }

    #[test]
    fn durations() {
        assert_eq!(parse_duration(&mut "2").unwrap(), Duration::new(2, 1));
        assert_eq!(parse_duration(&mut "/2").unwrap(), Duration::new(1, 2));
        assert_eq!(parse_duration(&mut "/").unwrap(), Duration::new(1, 2));
        assert_eq!(parse_duration(&mut "//").unwrap(), Duration::new(1, 4));
        assert_eq!(parse_duration(&mut "3/2").unwrap(), Duration::new(3, 2));
        assert_eq!(parse_duration(&mut "").unwrap(), Duration::unit());
    }

    #[test]
    fn full_note() {
        let note = parse_note(&mut "^c'3/2-").unwrap();
        assert_eq!(note.pitch, NoteName::C);
        assert_eq!(note.octave, 2);
        assert_eq!(note.accidental, Some(Accidental::Sharp));
        assert_eq!(note.duration, Duration::new(3, 2));
        assert!(note.tie);
    }

    #[test]
    fn attempt_restores_input_on_failure() {
        let mut input = "^|";
        assert!(attempt(parse_note, &mut input).is_none());
        assert_eq!(input, "^|");
    }

    #[test]
    fn rests() {
        let rest = parse_rest(&mut "z2").unwrap();
        assert_eq!(rest.duration, Duration::new(2, 1));
        assert_eq!(rest.multi_measure, None);

        let rest = parse_rest(&mut "Z4").unwrap();
        assert_eq!(rest.multi_measure, Some(4));

        let rest = parse_rest(&mut "Z").unwrap();
        assert_eq!(rest.multi_measure, Some(1));
    }

    #[test]
    fn chords() {
        let chord = parse_chord(&mut "[DFA]2").unwrap();
        assert_eq!(chord.notes.len(), 3);
        assert_eq!(chord.duration, Duration::new(2, 1));

        let tied = parse_chord(&mut "[DF]-").unwrap();
        assert!(tied.notes.iter().all(|n| n.tie));
    }

    #[test]
    fn quoted_text() {
        assert_eq!(parse_quoted(&mut "\"Am7\"").unwrap(), "Am7");
        assert_eq!(parse_quoted(&mut "\"\"").unwrap(), "");
    }
}
