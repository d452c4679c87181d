//! Error types for the indexing core.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors that abort an indexing run.
///
/// Skipped files, invalid directories and unmatched mandatory entities are
/// not errors; they are part of normal walk control flow.
#[derive(Debug, Error)]
pub enum IndexError {
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid layout config {path}: {message}")]
    Config { path: PathBuf, message: String },

    #[error("invalid pattern for entity '{entity}': {message}")]
    Pattern { entity: String, message: String },

    #[error("entity '{entity}' captured '{value}', which is not a valid {dtype}")]
    Coercion {
        entity: String,
        value: String,
        dtype: &'static str,
    },

    #[error("invalid sidecar {path}: {message}")]
    Sidecar { path: PathBuf, message: String },

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("database connection lock poisoned")]
    LockPoisoned,
}

impl IndexError {
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    pub fn config(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::Config {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }

    pub fn sidecar(path: impl AsRef<Path>, message: impl Into<String>) -> Self {
        Self::Sidecar {
            path: path.as_ref().to_path_buf(),
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, IndexError>;
