//! Typed error model for the indexing and retrieval pipeline.
//!
//! Every fallible library operation returns [`Result`]. Callers that need to
//! decide on fallback behaviour (show "not indexed yet", ask the user to fix
//! their input, retry later) should branch on [`Error::kind`] instead of
//! matching individual variants.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Corpus is empty: no document produced any text to index")]
    EmptyCorpus,

    #[error("Question bank is empty: no row has question text")]
    EmptyQuestionBank,

    #[error("Question table is missing required column '{column}'")]
    MissingColumn { column: String },

    #[error("Index rows and payloads are misaligned: {vectors} vectors, {payloads} payloads")]
    Misaligned { vectors: usize, payloads: usize },

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Index not found: {}", .path.display())]
    IndexNotFound { path: PathBuf },

    #[error("Index at {} is corrupt: {reason}", .path.display())]
    CorruptIndex { path: PathBuf, reason: String },

    #[error("Embedding error: {0}")]
    Embedding(String),

    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    #[error("Question table error: {0}")]
    Table(String),

    #[error("Document error: {0}")]
    Document(String),

    #[error("IO error at {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

/// Coarse classification of an [`Error`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The caller's input or configuration is wrong; retrying won't help.
    Validation,
    /// Nothing has been indexed yet at the requested location.
    NotFound,
    /// I/O, embedding backend or on-disk state problem; may succeed later.
    Transient,
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Config(_)
            | Error::EmptyCorpus
            | Error::EmptyQuestionBank
            | Error::MissingColumn { .. }
            | Error::Misaligned { .. }
            | Error::DimensionMismatch { .. } => ErrorKind::Validation,
            Error::IndexNotFound { .. } => ErrorKind::NotFound,
            Error::CorruptIndex { .. }
            | Error::Embedding(_)
            | Error::Tokenizer(_)
            | Error::Table(_)
            | Error::Document(_)
            | Error::Io { .. }
            | Error::Serialization(_)
            | Error::Other(_) => ErrorKind::Transient,
        }
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn corrupt(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Error::CorruptIndex {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds() {
        assert_eq!(Error::EmptyCorpus.kind(), ErrorKind::Validation);
        assert_eq!(
            Error::MissingColumn {
                column: "Question".to_string()
            }
            .kind(),
            ErrorKind::Validation
        );
        assert!(Error::IndexNotFound {
            path: PathBuf::from("faiss_index/index.bin")
        }
        .is_not_found());
        assert_eq!(
            Error::Embedding("timeout".to_string()).kind(),
            ErrorKind::Transient
        );
    }

    #[test]
    fn test_display_includes_path() {
        let err = Error::corrupt("faiss_qa/qa_index.bin", "truncated header");
        let msg = err.to_string();
        assert!(msg.contains("faiss_qa/qa_index.bin"));
        assert!(msg.contains("truncated header"));
    }
}
