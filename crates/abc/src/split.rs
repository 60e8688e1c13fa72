//! Splitting a multi-tune ABC file into individual tunes.

use serde::{Deserialize, Serialize};

use crate::parser::field_line;

/// One tune's text inside a larger file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TuneSource {
    /// Position in the file, from 0
    pub index: usize,
    /// `X:` number, 1 when missing or invalid
    pub reference: u32,
    pub title: Option<String>,
    pub text: String,
    /// File line of the tune's first line, from 1
    pub first_line: usize,
}

impl TuneSource {
    /// Lines before this tune in its file.
    pub fn line_offset(&self) -> usize {
        self.first_line.saturating_sub(1)
    }
}

fn starts_tune(line: &str) -> bool {
    line.trim_start().starts_with("X:")
}

/// List the tunes in a file without decoding their bodies.
///
/// Every line beginning with `X:` starts a tune; anything before the
/// first one is a file header and is ignored. Text with no `X:` line at
/// all is treated as a single tune.
pub fn tunes(text: &str) -> Vec<TuneSource> {
    let mut chunks: Vec<(usize, String)> = Vec::new();
    let mut current: Option<(usize, String)> = None;

    for (i, line) in text.split_inclusive('\n').enumerate() {
        if starts_tune(line) {
            chunks.extend(current.take());
            current = Some((i + 1, String::new()));
        }
        if let Some((_, tune_text)) = current.as_mut() {
            tune_text.push_str(line);
        }
    }
    chunks.extend(current);

    let has_content = text.lines().any(|line| {
        let line = line.trim();
        !line.is_empty() && !line.starts_with('%')
    });
    if chunks.is_empty() && has_content {
        chunks.push((1, text.to_string()));
    }

    chunks
        .into_iter()
        .enumerate()
        .map(|(index, (first_line, text))| {
            let (reference, title) = summarize(&text);
            TuneSource {
                index,
                reference,
                title,
                text,
                first_line,
            }
        })
        .collect()
}

/// Reference number and first title from the header lines.
fn summarize(text: &str) -> (u32, Option<String>) {
    let mut reference = None;
    let mut title = None;

    for line in text.lines() {
        let Some((field, value)) = field_line(line.trim()) else {
            continue;
        };
        match field {
            'X' if reference.is_none() => reference = value.parse().ok(),
            'T' if title.is_none() && !value.is_empty() => title = Some(value.to_string()),
            'K' => break,
            _ => {}
        }
    }

    (reference.unwrap_or(1), title)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const BOOK: &str = "%abc-2.1\n% a small book\n\nX:1\nT:The Kesh\nK:G\nGAG GAB|\n\nX:2\nT:Banish Misfortune\nT:Alt title\nK:Dmix\nfed cAG|\n";

    #[test]
    fn splits_on_reference_lines() {
        let found = tunes(BOOK);

        assert_eq!(found.len(), 2);
        assert_eq!(found[0].index, 0);
        assert_eq!(found[0].reference, 1);
        assert_eq!(found[0].title.as_deref(), Some("The Kesh"));
        assert_eq!(found[0].first_line, 4);
        assert!(found[0].text.starts_with("X:1\n"));
        assert!(!found[0].text.contains("small book"));

        assert_eq!(found[1].reference, 2);
        assert_eq!(found[1].title.as_deref(), Some("Banish Misfortune"));
        assert_eq!(found[1].first_line, 9);
        assert_eq!(found[1].line_offset(), 8);
    }

    #[test]
    fn text_without_reference_is_one_tune() {
        let found = tunes("T:Loose\nK:D\nDEF|\n");
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].reference, 1);
        assert_eq!(found[0].first_line, 1);
    }

    #[test]
    fn blank_text_has_no_tunes() {
        assert!(tunes("  \n\n").is_empty());
        assert!(tunes("%abc-2.1\n% nothing here\n").is_empty());
    }
}
