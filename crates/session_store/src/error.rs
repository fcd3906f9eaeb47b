use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum SessionStoreError {
    #[error("I/O error while {operation} at {path}: {source}")]
    Io {
        operation: &'static str,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("line {line} in {path} is not a KEY=value entry: {content}")]
    MalformedLine {
        path: PathBuf,
        line: usize,
        content: String,
    },

    #[error("line {line} in {path} has an unterminated quoted value")]
    UnterminatedQuote { path: PathBuf, line: usize },

    #[error("invalid store key '{key}': keys must be non-empty and contain only letters, digits, '_', '.' or '-'")]
    InvalidKey { key: String },

    #[error("store values must be a single line (key '{key}')")]
    MultilineValue { key: String },

    #[error("failed to format local timestamp for backup name: {0}")]
    ClockFormat(#[source] time::error::Format),
}

impl SessionStoreError {
    #[must_use]
    pub fn io(operation: &'static str, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            operation,
            path: path.into(),
            source,
        }
    }
}
