//! Decoder feedback (warnings, errors, suggestions).
//!
//! Decoders are generous: they keep going past problems they can work
//! around and record what they assumed. Only `Error`-level feedback makes
//! a decode fail.

use serde::{Deserialize, Serialize};

use crate::error::DecodeError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Feedback {
    pub level: FeedbackLevel,
    pub message: String,
    /// 1-based source line, 0 for binary input
    pub line: usize,
    pub column: usize,
    pub suggestion: Option<String>,
}

impl Feedback {
    pub fn error(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::at(FeedbackLevel::Error, message, line, column)
    }

    pub fn warning(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::at(FeedbackLevel::Warning, message, line, column)
    }

    pub fn info(message: impl Into<String>, line: usize, column: usize) -> Self {
        Self::at(FeedbackLevel::Info, message, line, column)
    }

    fn at(level: FeedbackLevel, message: impl Into<String>, line: usize, column: usize) -> Self {
        Feedback {
            level,
            message: message.into(),
            line,
            column,
            suggestion: None,
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FeedbackLevel {
    /// Structurally unrecoverable
    Error,
    /// Decoded with an assumption the user may want to check
    Warning,
    Info,
}

/// Collects feedback while walking an input, tracking the current position.
#[derive(Debug)]
pub struct FeedbackCollector {
    feedback: Vec<Feedback>,
    line_offset: usize,
    current_line: usize,
    current_column: usize,
}

impl Default for FeedbackCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl FeedbackCollector {
    pub fn new() -> Self {
        Self::with_line_offset(0)
    }

    /// For sub-documents (one tune of a multi-tune file): positions set
    /// relative to the sub-document are reported relative to the file.
    pub fn with_line_offset(line_offset: usize) -> Self {
        FeedbackCollector {
            feedback: Vec::new(),
            line_offset,
            current_line: 1,
            current_column: 1,
        }
    }

    pub fn set_position(&mut self, line: usize, column: usize) {
        self.current_line = line;
        self.current_column = column;
    }

    pub fn line(&self) -> usize {
        self.current_line
    }

    pub fn error(&mut self, message: impl Into<String>) {
        self.push(FeedbackLevel::Error, message, None);
    }

    pub fn error_with_suggestion(&mut self, message: impl Into<String>, suggestion: impl Into<String>) {
        self.push(FeedbackLevel::Error, message, Some(suggestion.into()));
    }

    pub fn warning(&mut self, message: impl Into<String>) {
        self.push(FeedbackLevel::Warning, message, None);
    }

    pub fn warning_with_suggestion(
        &mut self,
        message: impl Into<String>,
        suggestion: impl Into<String>,
    ) {
        self.push(FeedbackLevel::Warning, message, Some(suggestion.into()));
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.push(FeedbackLevel::Info, message, None);
    }

    fn push(&mut self, level: FeedbackLevel, message: impl Into<String>, suggestion: Option<String>) {
        self.feedback.push(Feedback {
            level,
            message: message.into(),
            line: self.current_line + self.line_offset,
            column: self.current_column,
            suggestion,
        });
    }

    pub fn has_errors(&self) -> bool {
        self.feedback.iter().any(|f| f.level == FeedbackLevel::Error)
    }

    pub fn feedback(&self) -> &[Feedback] {
        &self.feedback
    }

    pub fn into_feedback(self) -> Vec<Feedback> {
        self.feedback
    }
}

/// A decoded value plus the non-fatal feedback gathered while decoding it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Decoded<T> {
    pub value: T,
    pub feedback: Vec<Feedback>,
}

impl<T> Decoded<T> {
    pub fn new(value: T, feedback: Vec<Feedback>) -> Self {
        Decoded { value, feedback }
    }

    pub fn ok(value: T) -> Self {
        Decoded {
            value,
            feedback: Vec::new(),
        }
    }

    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Decoded<U> {
        Decoded {
            value: f(self.value),
            feedback: self.feedback,
        }
    }

    pub fn has_errors(&self) -> bool {
        self.feedback.iter().any(|f| f.level == FeedbackLevel::Error)
    }

    pub fn warnings(&self) -> impl Iterator<Item = &Feedback> {
        self.feedback
            .iter()
            .filter(|f| f.level == FeedbackLevel::Warning)
    }

    pub fn errors(&self) -> impl Iterator<Item = &Feedback> {
        self.feedback
            .iter()
            .filter(|f| f.level == FeedbackLevel::Error)
    }

    /// Turn the first `Error`-level entry into a [`DecodeError::Format`],
    /// so callers get either a complete value or nothing.
    pub fn into_result(self) -> Result<Decoded<T>, DecodeError> {
        let first = self.errors().next().map(describe);
        match first {
            Some(message) => Err(DecodeError::Format(message)),
            None => Ok(self),
        }
    }
}

fn describe(feedback: &Feedback) -> String {
    if feedback.line == 0 {
        feedback.message.clone()
    } else {
        format!("line {}: {}", feedback.line, feedback.message)
    }
}
