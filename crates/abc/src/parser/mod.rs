//! ABC notation parser using winnow.
//!
//! The parser is generous: it keeps going past most problems and records
//! them as feedback. Only music before `K:` and a dangling line
//! continuation are errors.

mod body;
mod header;
mod key;
mod note;

pub use header::{field_line, infer_unit_length, parse_meter, parse_tempo, parse_unit_length};
pub use key::parse_key_field;

use melody::{Decoded, FeedbackCollector};

use crate::ast::Tune;

/// Parse one tune into its syntax tree.
pub fn parse(input: &str) -> Decoded<Tune> {
    parse_with_offset(input, 0)
}

/// Parse one tune that starts `line_offset` lines into a larger file, so
/// feedback lines point into that file.
pub fn parse_with_offset(input: &str, line_offset: usize) -> Decoded<Tune> {
    let mut collector = FeedbackCollector::with_line_offset(line_offset);

    let parsed = header::parse_header(input, &mut collector);
    let body = if collector.has_errors() {
        Vec::new()
    } else {
        body::parse_body(parsed.body, parsed.body_line, &mut collector)
    };

    let tune = Tune {
        header: parsed.header,
        body,
        body_line: parsed.body_line,
    };
    Decoded::new(tune, collector.into_feedback())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn minimal_tune() {
        let result = parse("X:1\nT:Test\nK:C\n");

        assert!(!result.has_errors());
        assert_eq!(result.value.header.reference, 1);
        assert_eq!(result.value.header.title.as_deref(), Some("Test"));
        assert_eq!(result.value.header.key.root, NoteName::C);
        assert!(result.value.body.is_empty());
    }

    #[test]
    fn header_fields() {
        let result = parse("X:1\nT:Test\nM:C|\nL:1/16\nQ:1/4=120\nK:D\n");

        assert!(!result.has_errors());
        let header = &result.value.header;
        assert_eq!(header.meter, Meter::Cut);
        assert_eq!(
            header.unit_length,
            UnitLength {
                numerator: 1,
                denominator: 16
            }
        );
        assert_eq!(header.tempo.as_ref().map(|t| t.bpm), Some(120));
    }

    #[test]
    fn simple_notes() {
        let result = parse("X:1\nT:Test\nK:C\nCDEF|");

        assert!(!result.has_errors());
        let notes: Vec<_> = result
            .value
            .body
            .iter()
            .filter_map(|e| match e {
                Element::Note(n) => Some((n.pitch, n.octave)),
                _ => None,
            })
            .collect();

        assert_eq!(
            notes,
            vec![
                (NoteName::C, 0),
                (NoteName::D, 0),
                (NoteName::E, 0),
                (NoteName::F, 0)
            ]
        );
    }

    #[test]
    fn feedback_lines_include_offset() {
        let result = parse_with_offset("X:2\nT:Offset\nM:4/4\nK:G\nAB & c|\n", 10);
        let warning = result.warnings().next().map(|f| f.line);
        assert_eq!(warning, Some(15));
    }

    #[test]
    fn body_before_key_is_an_error() {
        let result = parse("X:1\nT:No key\nABcd|\n");
        assert!(result.has_errors());
        assert!(result.value.body.is_empty());
    }
}
