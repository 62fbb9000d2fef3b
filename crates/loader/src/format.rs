//! File-format dispatch: map a file extension to the parser that reads it.

use std::fmt;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::LoaderError;

/// The document formats the loader can parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentFormat {
    Text,
    Markdown,
    Csv,
    Json,
}

/// Extension table, lowercase, without the leading dot.
const EXTENSIONS: &[(&str, DocumentFormat)] = &[
    ("txt", DocumentFormat::Text),
    ("md", DocumentFormat::Markdown),
    ("markdown", DocumentFormat::Markdown),
    ("csv", DocumentFormat::Csv),
    ("json", DocumentFormat::Json),
];

impl DocumentFormat {
    /// Look up a format by extension (`"md"`, `".CSV"`, ...).
    pub fn from_extension(extension: &str) -> Result<Self, LoaderError> {
        let ext = extension.trim().trim_start_matches('.').to_ascii_lowercase();
        EXTENSIONS
            .iter()
            .find(|(e, _)| *e == ext)
            .map(|(_, format)| *format)
            .ok_or_else(|| LoaderError::UnsupportedFormat {
                extension: ext,
                supported: Self::supported_extensions(),
            })
    }

    /// Detect the format from a path's extension.
    pub fn from_path(path: &Path) -> Result<Self, LoaderError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();
        Self::from_extension(ext)
    }

    pub fn supported_extensions() -> Vec<&'static str> {
        EXTENSIONS.iter().map(|(e, _)| *e).collect()
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Text => "text",
            DocumentFormat::Markdown => "markdown",
            DocumentFormat::Csv => "csv",
            DocumentFormat::Json => "json",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DocumentFormat {
    type Err = LoaderError;

    /// Accepts a format name (`"text"`) or an extension (`"txt"`).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(DocumentFormat::Text),
            other => Self::from_extension(other),
        }
    }
}
