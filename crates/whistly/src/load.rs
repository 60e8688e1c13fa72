//! Reading tune files from disk.

use std::path::Path;

use anyhow::{bail, Context, Result};
use melody::{Feedback, Melody};
use serde::Serialize;
use tracing::{info, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    Abc,
    Midi,
}

impl SourceKind {
    pub fn from_path(path: &Path) -> Result<Self> {
        let extension = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match extension.as_str() {
            "abc" | "txt" => Ok(SourceKind::Abc),
            "mid" | "midi" | "smf" => Ok(SourceKind::Midi),
            _ => bail!(
                "don't know how to read {}: expected .abc, .mid or .midi",
                path.display()
            ),
        }
    }
}

/// A decoded tune, whatever file it came from.
#[derive(Debug, Clone, Serialize)]
pub struct LoadedTune {
    pub kind: SourceKind,
    pub title: Option<String>,
    /// `X:` number for ABC tunes
    pub reference: Option<u32>,
    pub declared_key: Option<String>,
    pub melody: Melody,
    pub feedback: Vec<Feedback>,
}

/// Read and decode `path`. `tune` picks a tune by `X:` number in a
/// multi-tune ABC file; without it the first tune is used.
pub fn load_file(path: &Path, tune: Option<u32>) -> Result<LoadedTune> {
    let kind = SourceKind::from_path(path)?;
    let loaded = match kind {
        SourceKind::Abc => {
            let text = std::fs::read_to_string(path)
                .with_context(|| format!("reading {}", path.display()))?;
            decode_abc(&text, tune)
        }
        SourceKind::Midi => {
            let bytes = std::fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            if tune.is_some() {
                warn!("--tune only applies to ABC files, ignoring it");
            }
            decode_midi(&bytes, path)
        }
    }
    .with_context(|| format!("decoding {}", path.display()))?;

    info!(
        path = %path.display(),
        notes = loaded.melody.len(),
        warnings = loaded.feedback.len(),
        "loaded tune"
    );
    Ok(loaded)
}

pub fn decode_abc(text: &str, tune: Option<u32>) -> Result<LoadedTune> {
    let sources = abc::tunes(text);
    let source = match tune {
        Some(reference) => sources
            .iter()
            .find(|s| s.reference == reference)
            .with_context(|| {
                let available: Vec<String> = sources.iter().map(|s| s.reference.to_string()).collect();
                format!("no tune X:{reference}, file has {}", available.join(", "))
            })?,
        None => sources.first().context("no tunes found")?,
    };

    let decoded = abc::decode_tune(source)?;
    let abc::AbcTune { info, melody } = decoded.value;
    Ok(LoadedTune {
        kind: SourceKind::Abc,
        title: info.title,
        reference: Some(info.reference),
        declared_key: info.declared_key,
        melody,
        feedback: decoded.feedback,
    })
}

pub fn decode_midi(bytes: &[u8], path: &Path) -> Result<LoadedTune> {
    let decoded = midi_decode::decode(bytes)?;
    let midi_decode::MidiTune { summary, melody } = decoded.value;
    let title = summary
        .track_names
        .iter()
        .find(|name| !name.trim().is_empty())
        .cloned()
        .or_else(|| path.file_stem().map(|s| s.to_string_lossy().into_owned()));
    Ok(LoadedTune {
        kind: SourceKind::Midi,
        title,
        reference: None,
        declared_key: None,
        melody,
        feedback: decoded.feedback,
    })
}
