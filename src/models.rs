//! Core data models shared by the indexers and services.

use serde::{Deserialize, Serialize};

/// A raw document handed to the content indexer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Where the text came from (relative file path, URL, ...).
    pub source: Option<String>,
    pub text: String,
}

impl Document {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            source: None,
            text: text.into(),
        }
    }

    pub fn with_source(source: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            source: Some(source.into()),
            text: text.into(),
        }
    }
}

/// A token-bounded span of cleaned document text.
///
/// This is the payload stored alongside each vector in the passage index.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    pub text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
    /// Position of this chunk within its source document.
    pub chunk_index: usize,
}

/// One row of the question bank that survived validation.
///
/// Stored as the payload of the question index, options included, so a
/// question can never be paired with another row's options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionRecord {
    pub question: String,
    /// Option cells in column order; missing cells are empty strings.
    pub options: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,
}

impl QuestionRecord {
    /// Non-empty options, in order, as they should be offered to a user.
    pub fn choices(&self) -> Vec<&str> {
        choices(&self.options)
    }
}

/// A retrieved passage, nearest first.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Passage {
    pub text: String,
    pub source: Option<String>,
    /// Squared Euclidean distance to the query embedding.
    pub distance: f32,
}

/// A recommended practice question with its answer options.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub question: String,
    pub options: Vec<String>,
    pub subject: Option<String>,
    pub distance: f32,
}

impl Recommendation {
    pub fn choices(&self) -> Vec<&str> {
        choices(&self.options)
    }
}

/// Trimmed, non-blank option cells in column order.
pub fn choices(options: &[String]) -> Vec<&str> {
    options
        .iter()
        .map(|o| o.trim())
        .filter(|o| !o.is_empty())
        .collect()
}
