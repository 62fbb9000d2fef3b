use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while loading or splitting documents.
#[derive(Debug, Error)]
pub enum LoaderError {
    #[error("File not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("Unsupported file type '{extension}'. Supported types: {}", .supported.join(", "))]
    UnsupportedFormat {
        extension: String,
        supported: Vec<&'static str>,
    },

    #[error("Failed to read {}: {reason}", .path.display())]
    Read { path: PathBuf, reason: String },

    #[error("Failed to parse {}: {reason}", .path.display())]
    Parse { path: PathBuf, reason: String },

    #[error("Invalid splitter settings: {0}")]
    InvalidSplitter(String),
}
