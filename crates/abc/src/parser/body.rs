//! Music body parsing for ABC notation.

use melody::FeedbackCollector;

use crate::ast::{Bar, BrokenRhythm, Element, InlineField, Tuplet};

use super::note::{attempt, parse_chord, parse_note, parse_quoted, parse_rest};

/// Outcome of trying to read one element.
enum Step {
    Element(Element),
    /// Input consumed, nothing to emit
    Skip,
    Unknown,
}

/// Keeps the first voice and drops the rest.
#[derive(Default)]
struct VoiceFilter {
    first: Option<String>,
    active: bool,
    warned: Vec<String>,
}

impl VoiceFilter {
    fn new() -> Self {
        VoiceFilter {
            active: true,
            ..Default::default()
        }
    }

    fn switch(&mut self, value: &str, collector: &mut FeedbackCollector) {
        let id = value.split_whitespace().next().unwrap_or("").to_string();
        match &self.first {
            None => {
                self.first = Some(id);
                self.active = true;
            }
            Some(first) if *first == id => self.active = true,
            Some(first) => {
                self.active = false;
                if !self.warned.contains(&id) {
                    collector.warning(format!(
                        "Only voice {} is played, skipping voice {}",
                        first, id
                    ));
                    self.warned.push(id);
                }
            }
        }
    }
}

struct BodyParser<'c> {
    collector: &'c mut FeedbackCollector,
    line: usize,
    line_start_len: usize,
    voices: VoiceFilter,
}

/// Parse the body of one tune into a flat element list.
///
/// `first_line` is the tune-relative line the body starts on. Parsing
/// stops at the first blank line, which ends the tune.
pub fn parse_body(input: &str, first_line: usize, collector: &mut FeedbackCollector) -> Vec<Element> {
    let mut parser = BodyParser {
        collector,
        line: first_line,
        line_start_len: input.len(),
        voices: VoiceFilter::new(),
    };
    let mut elements = Vec::new();
    let mut remaining = input;
    let mut at_line_start = true;

    while !remaining.is_empty() {
        if at_line_start {
            at_line_start = false;
            parser.start_line(remaining);
            let line = current_line(remaining);
            if line.trim().is_empty() {
                break;
            }
            let trimmed = line.trim_start();
            if trimmed.starts_with('%') {
                remaining = &remaining[line.len()..];
                continue;
            }
            if let Some((field, value)) = body_field(trimmed) {
                parser.field_line(field, value, &mut elements);
                remaining = &remaining[line.len()..];
                continue;
            }
        }

        remaining = remaining.trim_start_matches([' ', '\t', '\r']);

        if let Some(rest) = remaining.strip_prefix('\n') {
            remaining = rest;
            parser.line += 1;
            elements.push(Element::LineBreak);
            at_line_start = true;
            continue;
        }
        if remaining.starts_with('%') {
            remaining = &remaining[current_line(remaining).len()..];
            continue;
        }
        if remaining.starts_with('\\') {
            parser.set_column(remaining);
            match parser.continuation(&mut remaining) {
                Some(true) => elements.push(Element::LineBreak),
                Some(false) => {}
                None => break,
            }
            continue;
        }
        if remaining.is_empty() {
            break;
        }

        parser.set_column(remaining);
        match parser.parse_element(&mut remaining) {
            Step::Element(element) => {
                if parser.voices.active {
                    elements.push(element);
                }
            }
            Step::Skip => {}
            Step::Unknown => parser.skip_unknown(&mut remaining),
        }
    }

    elements
}

/// The current line without its newline.
fn current_line(input: &str) -> &str {
    match input.find('\n') {
        Some(end) => &input[..end],
        None => input,
    }
}

/// A field line inside the body: `K:G`, `w: lyrics`. `A:|` is music.
fn body_field(line: &str) -> Option<(char, &str)> {
    let mut chars = line.chars();
    let field = chars.next()?;
    if !field.is_ascii_alphabetic() || chars.next() != Some(':') {
        return None;
    }
    if matches!(chars.next(), Some('|') | Some(':')) {
        return None;
    }
    let value = &line[2..];
    let value = match value.find('%') {
        Some(pos) => &value[..pos],
        None => value,
    };
    Some((field, value.trim()))
}

fn is_tempo_field(field: char) -> bool {
    matches!(field, 'K' | 'L' | 'M' | 'Q')
}

impl BodyParser<'_> {
    fn start_line(&mut self, input: &str) {
        self.line_start_len = input.len();
        self.collector.set_position(self.line, 1);
    }

    fn set_column(&mut self, input: &str) {
        let column = self.line_start_len.saturating_sub(input.len()) + 1;
        self.collector.set_position(self.line, column);
    }

    fn field_line(&mut self, field: char, value: &str, elements: &mut Vec<Element>) {
        if field == 'V' {
            self.voices.switch(value, self.collector);
        } else if is_tempo_field(field) && self.voices.active {
            elements.push(Element::Field(InlineField {
                field,
                value: value.to_string(),
            }));
        }
    }

    /// `\` at the end of a line joins it to the next one. Returns
    /// `Some(true)` when a line was joined, `Some(false)` for a stray
    /// backslash and `None` when the continuation has nothing to join.
    fn continuation(&mut self, input: &mut &str) -> Option<bool> {
        let after = input[1..].trim_start_matches([' ', '\t', '\r']);
        let after = if after.starts_with('%') {
            &after[current_line(after).len()..]
        } else {
            after
        };

        if let Some(next) = after.strip_prefix('\n') {
            if current_line(next).trim().is_empty() {
                self.unterminated_continuation();
                return None;
            }
            *input = next;
            self.line += 1;
            self.start_line(next);
            Some(true)
        } else if after.is_empty() {
            self.unterminated_continuation();
            None
        } else {
            self.collector.warning("Skipping stray '\\'");
            *input = &input[1..];
            Some(false)
        }
    }

    fn unterminated_continuation(&mut self) {
        self.collector.error_with_suggestion(
            "Unterminated line continuation",
            "Remove the trailing '\\' or continue the music on the next line",
        );
    }

    fn skip_unknown(&mut self, input: &mut &str) {
        if let Some(c) = input.chars().next() {
            self.collector
                .warning(format!("Skipping unknown character '{}'", c));
            *input = &input[c.len_utf8()..];
        }
    }

    fn parse_element(&mut self, input: &mut &str) -> Step {
        if let Some(bar) = parse_bar(input) {
            return Step::Element(Element::Bar(bar));
        }

        if input.starts_with('[') {
            if let Some((field, value)) = inline_field(input) {
                return self.inline_field(field, value);
            }
            return match attempt(parse_chord, input) {
                Some(chord) if chord.notes.is_empty() => {
                    self.collector.warning("Skipping empty chord");
                    Step::Skip
                }
                Some(chord) => Step::Element(Element::Chord(chord)),
                None => Step::Unknown,
            };
        }

        if input.starts_with('(') {
            if input[1..].starts_with(|c: char| c.is_ascii_digit()) {
                return Step::Element(Element::Tuplet(self.parse_tuplet(input)));
            }
            *input = &input[1..];
            return Step::Element(Element::Slur);
        }
        if let Some(rest) = input.strip_prefix(')') {
            *input = rest;
            return Step::Element(Element::Slur);
        }

        if input.starts_with(['>', '<']) {
            return Step::Element(Element::BrokenRhythm(parse_broken_rhythm(input)));
        }

        if input.starts_with('"') {
            return match attempt(parse_quoted, input) {
                Some(text) => Step::Element(Element::Annotation(text)),
                None => {
                    self.collector.warning("Unterminated annotation");
                    *input = &input[current_line(input).len()..];
                    Step::Skip
                }
            };
        }

        if input.starts_with('{') {
            return self.parse_grace_notes(input);
        }

        if let Some(decoration) = parse_decoration(input) {
            return Step::Element(Element::Decoration(decoration));
        }

        if input.starts_with(['z', 'x', 'Z', 'X']) {
            if let Some(rest) = attempt(parse_rest, input) {
                return Step::Element(Element::Rest(rest));
            }
        }

        if let Some(rest) = input.strip_prefix(['y', '`', '$']) {
            *input = rest;
            return Step::Skip;
        }

        match attempt(parse_note, input) {
            Some(note) => Step::Element(Element::Note(note)),
            None => Step::Unknown,
        }
    }

    fn inline_field(&mut self, field: char, value: &str) -> Step {
        if field == 'V' {
            self.voices.switch(value, self.collector);
            Step::Skip
        } else if is_tempo_field(field) {
            Step::Element(Element::Field(InlineField {
                field,
                value: value.trim().to_string(),
            }))
        } else {
            Step::Skip
        }
    }

    /// `(p`, `(p:q`, `(p:q:r` followed by the notes it applies to.
    fn parse_tuplet(&mut self, input: &mut &str) -> Tuplet {
        *input = &input[1..];
        let p = take_number(input).unwrap_or(3).max(1);
        let mut q = None;
        let mut r = p;

        if let Some(rest) = input.strip_prefix(':') {
            *input = rest;
            q = take_number(input).filter(|&q| q > 0);
            if let Some(rest) = input.strip_prefix(':') {
                *input = rest;
                r = take_number(input).unwrap_or(p);
            }
        }

        let mut elements = Vec::new();
        let mut counted = 0;
        while counted < r {
            *input = input.trim_start_matches([' ', '\t']);
            if input.is_empty() || input.starts_with(['\n', '\r', '%', '\\']) {
                break;
            }
            let mut probe = *input;
            if parse_bar(&mut probe).is_some() {
                break;
            }
            self.set_column(input);
            match self.parse_element(input) {
                Step::Element(element) => {
                    if matches!(
                        element,
                        Element::Note(_) | Element::Chord(_) | Element::Rest(_)
                    ) {
                        counted += 1;
                    }
                    elements.push(element);
                }
                Step::Skip => {}
                Step::Unknown => break,
            }
        }

        if counted < r {
            self.collector.warning(format!(
                "Tuplet ({} expects {} notes, found {}",
                p, r, counted
            ));
        }

        Tuplet { p, q, elements }
    }

    /// `{g}`, `{/gef}`: parsed for validity, emitted as grace notes.
    fn parse_grace_notes(&mut self, input: &mut &str) -> Step {
        *input = &input[1..];
        if let Some(rest) = input.strip_prefix('/') {
            *input = rest;
        }

        let mut notes = Vec::new();
        loop {
            if let Some(rest) = input.strip_prefix('}') {
                *input = rest;
                break;
            }
            if input.is_empty() || input.starts_with('\n') {
                self.collector.warning("Unterminated grace notes");
                break;
            }
            match attempt(parse_note, input) {
                Some(note) => notes.push(note),
                None => {
                    if let Some(c) = input.chars().next() {
                        *input = &input[c.len_utf8()..];
                    }
                }
            }
        }

        Step::Element(Element::GraceNotes(notes))
    }
}

fn take_number(input: &mut &str) -> Option<u8> {
    let end = input
        .find(|c: char| !c.is_ascii_digit())
        .unwrap_or(input.len());
    let digits = &input[..end];
    *input = &input[end..];
    digits.parse().ok()
}

/// Bar lines, repeat marks and ending markers. Longer forms first.
fn parse_bar(input: &mut &str) -> Option<Bar> {
    let bar = if let Some(rest) = input.strip_prefix(":|:") {
        *input = rest;
        Bar::RepeatBoth
    } else if let Some(rest) = input.strip_prefix("::") {
        *input = rest;
        Bar::RepeatBoth
    } else if let Some(rest) = input.strip_prefix(":|") {
        *input = rest.strip_prefix(']').unwrap_or(rest);
        match ending_number(input) {
            Some(n) => Bar::RepeatEndEnding(n),
            None => Bar::RepeatEnd,
        }
    } else if let Some(rest) = input.strip_prefix("|:") {
        *input = rest;
        Bar::RepeatStart
    } else if let Some(rest) = input.strip_prefix("|]") {
        *input = rest;
        Bar::End
    } else if let Some(rest) = input.strip_prefix("||") {
        *input = rest;
        Bar::Double
    } else if let Some(rest) = input.strip_prefix("[|") {
        *input = rest;
        Bar::Start
    } else if input.starts_with('[') && input[1..].starts_with(|c: char| c.is_ascii_digit()) {
        *input = &input[1..];
        Bar::Ending(ending_number(input).unwrap_or(1))
    } else if let Some(rest) = input.strip_prefix('|') {
        *input = rest;
        match ending_number(input) {
            Some(n) => Bar::Ending(n),
            None => Bar::Single,
        }
    } else {
        return None;
    };
    Some(bar)
}

/// Ending number right after a bar: `1`, `2`, `1,3`, `1-2`.
fn ending_number(input: &mut &str) -> Option<u8> {
    if !input.starts_with(|c: char| c.is_ascii_digit()) {
        return None;
    }
    let n = take_number(input);
    *input = input.trim_start_matches(|c: char| c.is_ascii_digit() || c == ',' || c == '-');
    n
}

/// `[K:G]` style field. The letter must be followed by `:`.
fn inline_field<'a>(input: &mut &'a str) -> Option<(char, &'a str)> {
    let mut chars = input[1..].chars();
    let field = chars.next()?;
    if !field.is_ascii_alphabetic() || chars.next() != Some(':') {
        return None;
    }
    let line = current_line(input);
    let end = line.find(']')?;
    let value = &input[3..end];
    *input = &input[end + 1..];
    Some((field, value))
}

fn parse_broken_rhythm(input: &mut &str) -> BrokenRhythm {
    let first_longer = input.starts_with('>');
    let symbol = if first_longer { '>' } else { '<' };
    let marks = input.len() - input.trim_start_matches(symbol).len();
    *input = &input[marks..];
    BrokenRhythm {
        first_longer,
        strength: marks.min(3) as u8,
    }
}

/// `!trill!`, `+fermata+` and the single-character shorthands.
fn parse_decoration(input: &mut &str) -> Option<String> {
    for delimiter in ['!', '+'] {
        if input.starts_with(delimiter) {
            let line = current_line(input);
            return match line[1..].find(delimiter) {
                Some(end) => {
                    let name = line[1..end + 1].to_string();
                    *input = &input[end + 2..];
                    Some(name)
                }
                None => {
                    // Old-style `!` line break
                    *input = &input[1..];
                    Some(String::new())
                }
            };
        }
    }

    let c = input.chars().next()?;
    if matches!(
        c,
        '~' | '.' | 'H' | 'L' | 'M' | 'O' | 'P' | 'S' | 'T' | 'u' | 'v' | 'J' | 'R'
    ) {
        *input = &input[1..];
        return Some(c.to_string());
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ast::NoteName;
    use pretty_assertions::assert_eq;

    fn parse(input: &str) -> (Vec<Element>, FeedbackCollector) {
        let mut collector = FeedbackCollector::new();
        let elements = parse_body(input, 1, &mut collector);
        (elements, collector)
    }

    fn notes(elements: &[Element]) -> Vec<NoteName> {
        elements
            .iter()
            .filter_map(|e| match e {
                Element::Note(n) => Some(n.pitch),
                _ => None,
            })
            .collect()
    }

    fn bars(elements: &[Element]) -> Vec<Bar> {
        elements
            .iter()
            .filter_map(|e| match e {
                Element::Bar(b) => Some(*b),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn simple_body() {
        let (elements, collector) = parse("CDEF|");
        assert_eq!(
            notes(&elements),
            vec![NoteName::C, NoteName::D, NoteName::E, NoteName::F]
        );
        assert!(collector.feedback().is_empty());
    }

    #[test]
    fn bar_types() {
        let (elements, _) = parse("|:C:|D||E|1F:|2G::A[|B|]");
        assert_eq!(
            bars(&elements),
            vec![
                Bar::RepeatStart,
                Bar::RepeatEnd,
                Bar::Double,
                Bar::Ending(1),
                Bar::RepeatEndEnding(2),
                Bar::RepeatBoth,
                Bar::Start,
                Bar::End,
            ]
        );
    }

    #[test]
    fn bracket_endings_and_chords() {
        let (elements, _) = parse("|[1 CD :|[2 [CEG]2|");
        assert_eq!(
            bars(&elements),
            vec![Bar::Single, Bar::Ending(1), Bar::RepeatEnd, Bar::Ending(2), Bar::Single]
        );
        assert!(elements.iter().any(|e| matches!(e, Element::Chord(c) if c.notes.len() == 3)));
    }

    #[test]
    fn triplet_counts_only_notes() {
        let (elements, _) = parse("(3~CDE F");
        let Element::Tuplet(tuplet) = &elements[0] else {
            panic!("expected tuplet, got {:?}", elements[0]);
        };
        assert_eq!(tuplet.p, 3);
        assert_eq!(tuplet.q, None);
        assert_eq!(notes(&tuplet.elements), vec![NoteName::C, NoteName::D, NoteName::E]);
        assert_eq!(notes(&elements[1..]), vec![NoteName::F]);
    }

    #[test]
    fn full_tuplet_form() {
        let (elements, _) = parse("(3:2:2CD E");
        let Element::Tuplet(tuplet) = &elements[0] else {
            panic!("expected tuplet");
        };
        assert_eq!(tuplet.q, Some(2));
        assert_eq!(notes(&tuplet.elements).len(), 2);
    }

    #[test]
    fn broken_rhythm() {
        let (elements, _) = parse("A>B c<<d");
        let broken: Vec<_> = elements
            .iter()
            .filter_map(|e| match e {
                Element::BrokenRhythm(b) => Some(*b),
                _ => None,
            })
            .collect();
        assert_eq!(
            broken,
            vec![
                BrokenRhythm {
                    first_longer: true,
                    strength: 1
                },
                BrokenRhythm {
                    first_longer: false,
                    strength: 2
                },
            ]
        );
    }

    #[test]
    fn ornaments_are_not_notes() {
        let (elements, collector) = parse("{g}A !trill!B +fermata+c \"Am\"d .e ~f y g");
        assert_eq!(
            notes(&elements),
            vec![
                NoteName::A,
                NoteName::B,
                NoteName::C,
                NoteName::D,
                NoteName::E,
                NoteName::F,
                NoteName::G
            ]
        );
        assert!(elements.iter().any(|e| matches!(e, Element::GraceNotes(g) if g.len() == 1)));
        assert!(!collector.has_errors());
    }

    #[test]
    fn inline_and_line_fields() {
        let (elements, _) = parse("CD[M:3/4]EF|\nK:G\nw: la la\nGA|");
        let fields: Vec<_> = elements
            .iter()
            .filter_map(|e| match e {
                Element::Field(f) => Some((f.field, f.value.as_str())),
                _ => None,
            })
            .collect();
        assert_eq!(fields, vec![('M', "3/4"), ('K', "G")]);
        assert_eq!(notes(&elements).len(), 6);
    }

    #[test]
    fn repeat_end_at_line_start_is_music() {
        let (elements, _) = parse("A:|B");
        assert_eq!(notes(&elements), vec![NoteName::A, NoteName::B]);
        assert_eq!(bars(&elements), vec![Bar::RepeatEnd]);
    }

    #[test]
    fn comments_are_skipped() {
        let (elements, _) = parse("CD % comment\n%%MIDI program 1\nEF");
        assert_eq!(notes(&elements).len(), 4);
    }

    #[test]
    fn blank_line_ends_body() {
        let (elements, _) = parse("CD|\n\nEF|");
        assert_eq!(notes(&elements).len(), 2);
    }

    #[test]
    fn continuation_joins_lines() {
        let (elements, collector) = parse("CD \\\nEF|");
        assert_eq!(notes(&elements).len(), 4);
        assert!(!collector.has_errors());
    }

    #[test]
    fn continuation_at_end_is_an_error() {
        let (_, collector) = parse("CD|\nEF \\");
        assert!(collector.has_errors());
        assert_eq!(collector.feedback()[0].line, 2);

        let (_, collector) = parse("CD \\\n\nEF");
        assert!(collector.has_errors());
    }

    #[test]
    fn unknown_characters_warn() {
        let (elements, collector) = parse("C & D");
        assert_eq!(notes(&elements).len(), 2);
        assert_eq!(collector.feedback().len(), 1);
        assert_eq!(collector.feedback()[0].column, 3);
    }

    #[test]
    fn only_first_voice_is_kept() {
        let (elements, collector) = parse("V:1\nCD|\nV:2\nEF|\n[V:1]GA|");
        assert_eq!(
            notes(&elements),
            vec![NoteName::C, NoteName::D, NoteName::G, NoteName::A]
        );
        assert_eq!(collector.feedback().len(), 1);
    }
}
