use serde::{Deserialize, Serialize};

use crate::error::Error;

/// Minimum question length, in characters after trimming.
pub const MIN_QUESTION_CHARS: usize = 3;

/// Extracted text of a stored document, as handed out by a [`crate::DocumentStore`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentContext {
    pub id: String,
    pub text: String,
    /// Size of `text` in bytes.
    pub size: usize,
}

impl DocumentContext {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        let text = text.into();
        Self {
            id: id.into(),
            size: text.len(),
            text,
        }
    }

    /// Whether there is any text to ask questions about.
    pub fn has_content(&self) -> bool {
        !self.text.trim().is_empty()
    }

    /// Fails with [`Error::DocumentNotReady`] when the document has no usable text.
    pub fn ensure_ready(&self) -> Result<(), Error> {
        if self.has_content() {
            Ok(())
        } else {
            Err(Error::document_not_ready(format!(
                "document '{}' has no extracted text",
                self.id
            )))
        }
    }
}

/// A validated question: at least [`MIN_QUESTION_CHARS`] characters once trimmed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question(String);

impl Question {
    pub fn parse(raw: &str) -> Result<Self, Error> {
        let trimmed = raw.trim();
        if trimmed.chars().count() < MIN_QUESTION_CHARS {
            return Err(Error::invalid_input(format!(
                "question must be at least {MIN_QUESTION_CHARS} characters long"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Question {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
