use thiserror::Error;

/// Fatal decode failures. A decoder returning one of these produced no melody.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The input is structurally malformed.
    #[error("format error: {0}")]
    Format(String),

    /// The input is well formed but uses something we do not model.
    #[error("unsupported feature: {0}")]
    UnsupportedFeature(String),
}

pub type Result<T> = std::result::Result<T, DecodeError>;
