//! ABC notation decoder for whistle practice.
//!
//! A file may hold several tunes. Each decodes to a [`Melody`] plus the
//! [`TuneInfo`] a tune picker needs.
//!
//! # Example
//!
//! ```
//! let text = "X:1\nT:The Kesh\nM:6/8\nL:1/8\nK:G\nD|GAG GAB|ABA ABd|\n";
//!
//! let tunes = abc::decode(text).unwrap();
//! let kesh = &tunes[0].value;
//! assert_eq!(kesh.info.title.as_deref(), Some("The Kesh"));
//! assert_eq!(kesh.melody.beats_per_measure(), 3);
//! ```

pub mod ast;
pub mod convert;
pub mod parser;
pub mod repeats;
pub mod split;

pub use ast::Tune;
pub use split::{tunes, TuneSource};

use melody::{Decoded, DecodeError, FeedbackCollector, Melody, TuneInfo};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

/// One decoded tune.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbcTune {
    pub info: TuneInfo,
    pub melody: Melody,
}

/// Parse a single tune into its syntax tree without converting it.
///
/// This is a generous parser that keeps going past most problems,
/// collecting feedback along the way.
pub fn parse(input: &str) -> Decoded<Tune> {
    parser::parse(input)
}

/// Decode every tune in `text`.
///
/// Fails if the file holds no tunes, or if any tune is structurally
/// unrecoverable.
pub fn decode(text: &str) -> Result<Vec<Decoded<AbcTune>>, DecodeError> {
    let sources = tunes(text);
    if sources.is_empty() {
        return Err(DecodeError::Format("no tunes found".to_string()));
    }
    sources.iter().map(decode_tune).collect()
}

/// Decode one tune found by [`tunes`].
pub fn decode_tune(source: &TuneSource) -> Result<Decoded<AbcTune>, DecodeError> {
    let parsed = parser::parse_with_offset(&source.text, source.line_offset()).into_result()?;
    let Decoded {
        value: tune,
        mut feedback,
    } = parsed;

    let mut collector = FeedbackCollector::with_line_offset(source.line_offset());
    let melody = convert::to_melody(&tune, &mut collector);
    feedback.extend(collector.into_feedback());

    let info = TuneInfo {
        index: source.index,
        reference: tune.header.reference,
        title: tune.header.title,
        composer: tune.header.composer,
        declared_key: tune.header.declared_key,
    };

    info!(
        reference = info.reference,
        title = info.title.as_deref().unwrap_or(""),
        notes = melody.len(),
        measures = melody.total_measures(),
        "decoded ABC tune"
    );
    for item in &feedback {
        debug!(line = item.line, level = ?item.level, "{}", item.message);
    }

    Ok(Decoded::new(AbcTune { info, melody }, feedback))
}
