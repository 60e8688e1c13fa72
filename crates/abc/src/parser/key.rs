//! `K:` field parsing.

use melody::{FeedbackCollector, Mode};

use crate::ast::{Accidental, Key, NoteName};

/// Parse a K: value: `G`, `Am`, `D dorian`, `F#m`, `Bb`, `D exp ^f ^c`,
/// `Amix clef=treble`, `none`.
pub fn parse_key_field(value: &str, collector: &mut FeedbackCollector) -> Key {
    let trimmed = value.trim();

    if trimmed.is_empty() || trimmed.eq_ignore_ascii_case("none") {
        return Key {
            none: true,
            ..Key::default()
        };
    }
    if trimmed.starts_with("HP") || trimmed.starts_with("Hp") {
        collector.info("Highland pipe key treated as K:none");
        return Key {
            none: true,
            ..Key::default()
        };
    }

    let mut chars = trimmed.chars();
    let Some(root) = chars.next().and_then(NoteName::from_letter) else {
        collector.warning_with_suggestion(
            format!("Invalid key '{}', assuming C", trimmed),
            "Start the K: field with a note letter, e.g. K:D or K:Ador",
        );
        return Key::default();
    };
    let after_root = chars.as_str();

    let (accidental, rest) = match after_root.chars().next() {
        Some('#') => (Some(Accidental::Sharp), &after_root[1..]),
        Some('b') if flat_follows(&after_root[1..]) => (Some(Accidental::Flat), &after_root[1..]),
        _ => (None, after_root),
    };

    let mut key = Key {
        root,
        accidental,
        ..Key::default()
    };

    let mut mode_seen = false;
    for token in rest.split_whitespace() {
        if token.contains('=') && !token.starts_with('=') {
            // clef=, middle=, transpose= and similar are not pitch related
            continue;
        }
        if token.eq_ignore_ascii_case("exp") {
            key.explicit_only = true;
            continue;
        }
        if let Some(extra) = parse_explicit_accidental(token) {
            key.explicit_accidentals.push(extra);
            continue;
        }
        if !mode_seen {
            mode_seen = true;
            match Mode::parse(token) {
                Some(mode) => key.mode = mode,
                None => collector.warning(format!("Unknown mode '{}', assuming major", token)),
            }
            continue;
        }
        collector.info(format!("Ignoring key option '{}'", token));
    }

    key
}

/// A `b` after the root is a flat unless it begins some other word.
fn flat_follows(rest: &str) -> bool {
    let word = rest.split_whitespace().next().unwrap_or("");
    rest.is_empty()
        || rest.starts_with(char::is_whitespace)
        || Mode::parse(word).is_some()
}

/// `^f`, `_b`, `=c`, `^^g`
fn parse_explicit_accidental(token: &str) -> Option<(Accidental, NoteName)> {
    let (accidental, letter) = if let Some(rest) = token.strip_prefix("^^") {
        (Accidental::DoubleSharp, rest)
    } else if let Some(rest) = token.strip_prefix("__") {
        (Accidental::DoubleFlat, rest)
    } else if let Some(rest) = token.strip_prefix('^') {
        (Accidental::Sharp, rest)
    } else if let Some(rest) = token.strip_prefix('_') {
        (Accidental::Flat, rest)
    } else if let Some(rest) = token.strip_prefix('=') {
        (Accidental::Natural, rest)
    } else {
        return None;
    };

    let mut letters = letter.chars();
    let name = NoteName::from_letter(letters.next()?)?;
    if letters.next().is_some() {
        return None;
    }
    Some((accidental, name))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(value: &str) -> (Key, FeedbackCollector) {
        let mut collector = FeedbackCollector::new();
        let key = parse_key_field(value, &mut collector);
        (key, collector)
    }

    #[test]
    fn simple_major() {
        let (key, collector) = parse("G");
        assert_eq!(key.root, NoteName::G);
        assert_eq!(key.accidental, None);
        assert_eq!(key.mode, Mode::Major);
        assert!(collector.feedback().is_empty());
    }

    #[test]
    fn attached_and_spaced_modes() {
        assert_eq!(parse("Am").0.mode, Mode::Minor);
        assert_eq!(parse("Ador").0.mode, Mode::Dorian);
        assert_eq!(parse("D dorian").0.mode, Mode::Dorian);
        assert_eq!(parse("Gmix").0.mode, Mode::Mixolydian);
    }

    #[test]
    fn sharps_and_flats() {
        let (key, _) = parse("F#m");
        assert_eq!(key.root, NoteName::F);
        assert_eq!(key.accidental, Some(Accidental::Sharp));
        assert_eq!(key.mode, Mode::Minor);

        let (key, _) = parse("Bb");
        assert_eq!(key.root, NoteName::B);
        assert_eq!(key.accidental, Some(Accidental::Flat));

        let (key, _) = parse("Ebmaj");
        assert_eq!(key.accidental, Some(Accidental::Flat));
        assert_eq!(key.mode, Mode::Major);
    }

    #[test]
    fn clef_options_are_ignored() {
        let (key, collector) = parse("Amix clef=treble");
        assert_eq!(key.mode, Mode::Mixolydian);
        assert!(collector.feedback().is_empty());
    }

    #[test]
    fn explicit_accidentals() {
        let (key, _) = parse("D exp ^f ^c");
        assert!(key.explicit_only);
        assert_eq!(
            key.explicit_accidentals,
            vec![
                (Accidental::Sharp, NoteName::F),
                (Accidental::Sharp, NoteName::C)
            ]
        );

        let (key, _) = parse("D ^g");
        assert!(!key.explicit_only);
        assert_eq!(key.explicit_accidentals, vec![(Accidental::Sharp, NoteName::G)]);
    }

    #[test]
    fn none_and_invalid() {
        assert!(parse("none").0.none);
        let (key, collector) = parse("Q");
        assert_eq!(key, Key::default());
        assert_eq!(collector.feedback().len(), 1);
    }

    #[test]
    fn unknown_mode_warns() {
        let (key, collector) = parse("Dfoo");
        assert_eq!(key.mode, Mode::Major);
        assert!(collector.feedback()[0].message.contains("Unknown mode"));
    }
}
