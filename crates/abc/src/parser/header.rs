//! Header field parsing for ABC notation.

use melody::FeedbackCollector;

use crate::ast::{Header, Meter, Tempo, UnitLength};

use super::key::parse_key_field;

/// Header fields plus where the body begins.
#[derive(Debug)]
pub struct HeaderParse<'a> {
    pub header: Header,
    pub body: &'a str,
    /// Tune-relative line of the first body line
    pub body_line: usize,
}

/// Split a `X:` style field line into its letter and value.
pub fn field_line(line: &str) -> Option<(char, &str)> {
    let mut chars = line.chars();
    let field = chars.next()?;
    if field.is_ascii_alphabetic() && chars.next() == Some(':') {
        Some((field, strip_comment(&line[2..]).trim()))
    } else {
        None
    }
}

fn strip_comment(value: &str) -> &str {
    match value.find('%') {
        Some(pos) if pos == 0 || !value[..pos].ends_with('\\') => &value[..pos],
        _ => value,
    }
}

/// Parse the header section of one tune, stopping after `K:`.
///
/// Music before `K:` is an error: without a key there is no way to know
/// which accidentals the body relies on.
pub fn parse_header<'a>(input: &'a str, collector: &mut FeedbackCollector) -> HeaderParse<'a> {
    let mut header = Header::default();
    let mut meter = None;
    let mut unit_length = None;
    let mut found_x = false;
    let mut found_k = false;
    let mut offset = 0;
    let mut line_num = 0;

    for line in input.split_inclusive('\n') {
        line_num += 1;
        collector.set_position(line_num, 1);
        let trimmed = line.trim();

        if trimmed.is_empty() || trimmed.starts_with('%') {
            offset += line.len();
            continue;
        }

        let Some((field, value)) = field_line(trimmed) else {
            collector.error_with_suggestion(
                "Body started before K: field",
                "Add a K: field before the music (e.g., K:D for D major)",
            );
            break;
        };
        offset += line.len();

        match field {
            'X' => {
                found_x = true;
                header.reference = value.parse().unwrap_or_else(|_| {
                    collector.warning(format!("Invalid X: value '{}', using 1", value));
                    1
                });
            }
            'T' => {
                if header.title.is_none() && !value.is_empty() {
                    header.title = Some(value.to_string());
                }
            }
            'C' => {
                if header.composer.is_none() && !value.is_empty() {
                    header.composer = Some(value.to_string());
                }
            }
            'M' => meter = Some(parse_meter(value, collector)),
            'L' => unit_length = Some(parse_unit_length(value, collector)),
            'Q' => header.tempo = Some(parse_tempo(value, collector)),
            'K' => {
                header.key = parse_key_field(value, collector);
                if !value.is_empty() {
                    header.declared_key = Some(value.to_string());
                }
                found_k = true;
                break;
            }
            _ => {}
        }
    }

    if !found_x {
        collector.set_position(1, 1);
        collector.warning_with_suggestion(
            "Missing X: field, assuming X:1",
            "Add X:1 at the start of the tune",
        );
    }

    if !found_k && !collector.has_errors() {
        collector.warning_with_suggestion(
            "Missing K: field, assuming K:C",
            "Add a K: field to specify the key signature",
        );
    }

    header.meter = meter.unwrap_or_else(|| {
        collector.warning_with_suggestion(
            "Missing M: field, assuming 4/4",
            "Add M:4/4 or the appropriate meter",
        );
        Meter::Simple {
            numerator: 4,
            denominator: 4,
        }
    });

    header.unit_length = unit_length.unwrap_or_else(|| {
        let inferred = infer_unit_length(&header.meter);
        collector.info(format!(
            "No L: field, inferring L:{}/{}",
            inferred.numerator, inferred.denominator
        ));
        inferred
    });

    HeaderParse {
        header,
        body: if found_k { &input[offset..] } else { "" },
        body_line: line_num + 1,
    }
}

/// Meter value: `4/4`, `C`, `C|`, `6/8`, `none`.
pub fn parse_meter(value: &str, collector: &mut FeedbackCollector) -> Meter {
    match value.trim() {
        "C" => Meter::Common,
        "C|" => Meter::Cut,
        "none" | "free" | "" => Meter::Free,
        other => match parse_fraction(other) {
            Some((numerator, denominator)) if numerator > 0 && denominator > 0 => Meter::Simple {
                numerator,
                denominator,
            },
            _ => {
                collector.warning(format!("Invalid meter '{}', assuming 4/4", other));
                Meter::Simple {
                    numerator: 4,
                    denominator: 4,
                }
            }
        },
    }
}

/// Unit length value: `1/8`, `1/16`.
pub fn parse_unit_length(value: &str, collector: &mut FeedbackCollector) -> UnitLength {
    match parse_fraction(value.trim()) {
        Some((numerator, denominator)) if numerator > 0 && denominator > 0 => UnitLength {
            numerator,
            denominator,
        },
        _ => {
            collector.warning(format!("Invalid unit length '{}', assuming 1/8", value));
            UnitLength::default()
        }
    }
}

/// Tempo value: `1/4=120`, `120`, `"Allegro" 3/8=100`.
pub fn parse_tempo(value: &str, collector: &mut FeedbackCollector) -> Tempo {
    let mut text = None;
    let mut rest = value.trim();

    if let Some(quoted) = rest.strip_prefix('"') {
        if let Some(end) = quoted.find('"') {
            text = Some(quoted[..end].to_string());
            rest = quoted[end + 1..].trim();
        }
    }
    // A trailing annotation after the beat is allowed too
    if let Some(start) = rest.find('"') {
        if text.is_none() {
            text = Some(rest[start..].trim_matches('"').to_string());
        }
        rest = rest[..start].trim();
    }

    if let Some((beat_part, bpm_part)) = rest.split_once('=') {
        let beat_unit = parse_fraction(beat_part.trim()).unwrap_or_else(|| {
            collector.warning("Invalid tempo beat unit, assuming 1/4");
            (1, 4)
        });
        let bpm = bpm_part.trim().parse().unwrap_or_else(|_| {
            collector.warning("Invalid BPM, assuming 120");
            120
        });
        Tempo {
            beat_unit,
            bpm,
            text,
        }
    } else if let Ok(bpm) = rest.parse::<u16>() {
        Tempo {
            beat_unit: (1, 4),
            bpm,
            text,
        }
    } else {
        if text.is_none() {
            collector.warning(format!("Invalid tempo '{}', assuming 120 BPM", value.trim()));
        }
        Tempo {
            beat_unit: (1, 4),
            bpm: 120,
            text,
        }
    }
}

fn parse_fraction(s: &str) -> Option<(u8, u8)> {
    let (num, den) = s.split_once('/')?;
    Some((num.trim().parse().ok()?, den.trim().parse().ok()?))
}

/// Default unit length when `L:` is absent: 1/16 for meters shorter than
/// 3/4, otherwise 1/8.
pub fn infer_unit_length(meter: &Meter) -> UnitLength {
    let short = match meter.fraction() {
        Some((n, d)) if d > 0 => f64::from(n) / f64::from(d) < 0.75,
        _ => false,
    };
    UnitLength {
        numerator: 1,
        denominator: if short { 16 } else { 8 },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn header_stops_after_key() {
        let mut collector = FeedbackCollector::new();
        let parsed = parse_header("X:3\nT:The Kesh\nT:Kesh Jig\nM:6/8\nL:1/8\nK:G\nGAG GAB|\n", &mut collector);

        assert_eq!(parsed.header.reference, 3);
        assert_eq!(parsed.header.title.as_deref(), Some("The Kesh"));
        assert_eq!(parsed.header.declared_key.as_deref(), Some("G"));
        assert_eq!(parsed.body, "GAG GAB|\n");
        assert_eq!(parsed.body_line, 7);
        assert!(!collector.has_errors());
    }

    #[test]
    fn music_before_key_is_an_error() {
        let mut collector = FeedbackCollector::new();
        let parsed = parse_header("X:1\nT:Oops\nABc|\nK:D\n", &mut collector);

        assert!(collector.has_errors());
        assert_eq!(parsed.body, "");
        assert_eq!(collector.feedback()[0].line, 3);
    }

    #[test]
    fn missing_key_without_body_is_a_warning() {
        let mut collector = FeedbackCollector::new();
        parse_header("X:1\nT:Header only\nM:4/4\nL:1/8\n", &mut collector);

        assert!(!collector.has_errors());
        assert!(collector
            .feedback()
            .iter()
            .any(|f| f.message.contains("Missing K:")));
    }

    #[test]
    fn comments_are_stripped_from_values() {
        let mut collector = FeedbackCollector::new();
        let parsed = parse_header("X:1\nK:Ador % dorian\n", &mut collector);
        assert_eq!(parsed.header.declared_key.as_deref(), Some("Ador"));
    }

    #[test]
    fn meters() {
        let mut collector = FeedbackCollector::new();
        assert_eq!(parse_meter("C", &mut collector), Meter::Common);
        assert_eq!(parse_meter("C|", &mut collector), Meter::Cut);
        assert_eq!(parse_meter("none", &mut collector), Meter::Free);
        assert_eq!(
            parse_meter("6/8", &mut collector),
            Meter::Simple {
                numerator: 6,
                denominator: 8
            }
        );
        assert!(collector.feedback().is_empty());
        parse_meter("2/4+3/8", &mut collector);
        assert_eq!(collector.feedback().len(), 1);
    }

    #[test]
    fn tempos() {
        let mut collector = FeedbackCollector::new();
        let tempo = parse_tempo("1/4=120", &mut collector);
        assert_eq!((tempo.beat_unit, tempo.bpm), ((1, 4), 120));

        let tempo = parse_tempo("\"Allegro\" 3/8=100", &mut collector);
        assert_eq!(tempo.text.as_deref(), Some("Allegro"));
        assert_eq!(tempo.beat_unit, (3, 8));

        let tempo = parse_tempo("96", &mut collector);
        assert_eq!(tempo.bpm, 96);
        assert!(collector.feedback().is_empty());
    }

    #[test]
    fn unit_length_inference() {
        let short = Meter::Simple {
            numerator: 2,
            denominator: 4,
        };
        let jig = Meter::Simple {
            numerator: 6,
            denominator: 8,
        };
        assert_eq!(infer_unit_length(&short).denominator, 16);
        assert_eq!(infer_unit_length(&jig).denominator, 8);
        assert_eq!(infer_unit_length(&Meter::Common).denominator, 8);
    }
}
