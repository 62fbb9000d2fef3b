//! Load files into chunked documents.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info};

use crate::error::LoaderError;
use crate::format::DocumentFormat;
use crate::splitter::TextSplitter;

/// A chunk of loaded text with provenance metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    pub content: String,

    /// `source`, `format` and `chunk` are always set; `row` for CSV records
    /// and `index` for JSON array elements.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl Document {
    pub fn source(&self) -> Option<&str> {
        self.metadata.get("source").and_then(Value::as_str)
    }
}

/// Reads supported files and splits them into [`Document`] chunks.
#[derive(Debug, Clone, Default)]
pub struct DataLoader {
    splitter: TextSplitter,
}

impl DataLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_splitter(mut self, splitter: TextSplitter) -> Self {
        self.splitter = splitter;
        self
    }

    /// Load one file. The format is detected from the extension unless given.
    pub fn load(
        &self,
        path: impl AsRef<Path>,
        format: Option<DocumentFormat>,
    ) -> Result<Vec<Document>, LoaderError> {
        let path = path.as_ref();
        if !path.is_file() {
            return Err(LoaderError::NotFound(path.to_path_buf()));
        }
        let format = match format {
            Some(f) => f,
            None => DocumentFormat::from_path(path)?,
        };

        let text = read_text(path)?;
        let records = match format {
            DocumentFormat::Text | DocumentFormat::Markdown => vec![(text, Map::new())],
            DocumentFormat::Csv => csv_records(&text),
            DocumentFormat::Json => json_records(path, &text)?,
        };

        let mut documents = Vec::new();
        for (body, extra) in records {
            for chunk in self.splitter.split_text(&body) {
                let mut metadata = Map::new();
                metadata.insert("source".into(), Value::from(path.display().to_string()));
                metadata.insert("format".into(), Value::from(format.as_str()));
                metadata.insert("chunk".into(), Value::from(documents.len()));
                metadata.extend(extra.clone());
                documents.push(Document {
                    content: chunk,
                    metadata,
                });
            }
        }

        info!(
            path = %path.display(),
            format = %format,
            chunks = documents.len(),
            "Loaded document"
        );
        Ok(documents)
    }

    /// Load several files, stopping at the first failure.
    pub fn batch_load<P: AsRef<Path>>(
        &self,
        paths: &[P],
        format: Option<DocumentFormat>,
    ) -> Result<Vec<Vec<Document>>, LoaderError> {
        paths.iter().map(|p| self.load(p, format)).collect()
    }
}

fn read_text(path: &Path) -> Result<String, LoaderError> {
    let text = std::fs::read_to_string(path).map_err(|e| LoaderError::Read {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    // Editors on Windows like to prepend a BOM.
    Ok(text.strip_prefix('\u{feff}').map(str::to_string).unwrap_or(text))
}

/// One record per CSV row, rendered as `header: value` lines.
fn csv_records(text: &str) -> Vec<(String, Map<String, Value>)> {
    let mut rows = parse_csv(text).into_iter();
    let Some(headers) = rows.next() else {
        return Vec::new();
    };

    rows.enumerate()
        .filter(|(_, row)| row.iter().any(|field| !field.trim().is_empty()))
        .map(|(i, row)| {
            let body = row
                .iter()
                .enumerate()
                .map(|(col, value)| {
                    let header = headers
                        .get(col)
                        .cloned()
                        .unwrap_or_else(|| format!("column_{}", col + 1));
                    format!("{}: {}", header.trim(), value.trim())
                })
                .collect::<Vec<_>>()
                .join("\n");
            let mut extra = Map::new();
            extra.insert("row".into(), Value::from(i));
            (body, extra)
        })
        .collect()
}

/// Minimal RFC 4180 reader: quoted fields, `""` escapes, embedded newlines.
fn parse_csv(text: &str) -> Vec<Vec<String>> {
    let mut rows = Vec::new();
    let mut row = Vec::new();
    let mut field = String::new();
    let mut in_quotes = false;
    let mut chars = text.chars().peekable();

    while let Some(c) = chars.next() {
        match (c, in_quotes) {
            ('"', true) if chars.peek() == Some(&'"') => {
                field.push('"');
                chars.next();
            }
            ('"', true) => in_quotes = false,
            ('"', false) if field.is_empty() => in_quotes = true,
            (',', false) => row.push(std::mem::take(&mut field)),
            ('\r', false) => {}
            ('\n', false) => {
                row.push(std::mem::take(&mut field));
                rows.push(std::mem::take(&mut row));
            }
            (c, _) => field.push(c),
        }
    }
    if !field.is_empty() || !row.is_empty() {
        row.push(field);
        rows.push(row);
    }
    debug!(rows = rows.len(), "Parsed CSV");
    rows
}

/// One record per array element, or a single record for any other value.
fn json_records(
    path: &Path,
    text: &str,
) -> Result<Vec<(String, Map<String, Value>)>, LoaderError> {
    let value: Value = serde_json::from_str(text).map_err(|e| LoaderError::Parse {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    let render = |v: &Value| match v {
        Value::String(s) => s.clone(),
        other => serde_json::to_string_pretty(other).unwrap_or_default(),
    };

    Ok(match value {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| {
                let mut extra = Map::new();
                extra.insert("index".into(), Value::from(i));
                (render(item), extra)
            })
            .collect(),
        other => vec![(render(&other), Map::new())],
    })
}

/// Replace each directory with the supported files directly inside it,
/// sorted by name. Other paths pass through untouched.
pub fn expand_paths(paths: &[PathBuf]) -> Result<Vec<PathBuf>, LoaderError> {
    let mut expanded = Vec::new();
    for path in paths {
        if path.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(path)
                .map_err(|e| LoaderError::Read {
                    path: path.clone(),
                    reason: e.to_string(),
                })?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|p| p.is_file() && DocumentFormat::from_path(p).is_ok())
                .collect();
            entries.sort();
            expanded.extend(entries);
        } else {
            expanded.push(path.clone());
        }
    }
    Ok(expanded)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn loads_text_with_metadata() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "notes.txt", "\u{feff}Rust is fun.");

        let docs = DataLoader::new().load(&path, None).unwrap();
        assert_eq!(docs.len(), 1);
        assert_eq!(docs[0].content, "Rust is fun.");
        assert_eq!(docs[0].metadata["format"], "text");
        assert_eq!(docs[0].metadata["chunk"], 0);
        assert_eq!(docs[0].source(), Some(path.display().to_string().as_str()));
    }

    #[test]
    fn long_markdown_is_chunked() {
        let dir = tempfile::tempdir().unwrap();
        let body = (0..40)
            .map(|i| format!("Paragraph {i} talks about ownership and borrowing."))
            .collect::<Vec<_>>()
            .join("\n\n");
        let path = write(&dir, "guide.md", &body);

        let loader = DataLoader::new().with_splitter(TextSplitter::new(200, 50).unwrap());
        let docs = loader.load(&path, None).unwrap();
        assert!(docs.len() > 1);
        assert!(docs.iter().all(|d| d.content.chars().count() <= 200));
        assert_eq!(docs.last().unwrap().metadata["chunk"], docs.len() - 1);
    }

    #[test]
    fn csv_rows_become_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "people.csv",
            "name,quote\r\nAda,\"Hello, \"\"world\"\"\"\r\n\r\nLinus,\"multi\nline\"\n",
        );

        let docs = DataLoader::new().load(&path, None).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].content, "name: Ada\nquote: Hello, \"world\"");
        assert_eq!(docs[0].metadata["row"], 0);
        assert_eq!(docs[1].content, "name: Linus\nquote: multi\nline");
    }

    #[test]
    fn json_array_elements_become_documents() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "faq.json", r#"["plain text", {"q": "why", "a": "because"}]"#);

        let docs = DataLoader::new().load(&path, None).unwrap();
        assert_eq!(docs.len(), 2);
        assert_eq!(docs[0].content, "plain text");
        assert!(docs[1].content.contains("\"q\": \"why\""));
        assert_eq!(docs[1].metadata["index"], 1);
    }

    #[test]
    fn invalid_json_is_parse_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "broken.json", "{not json");
        assert!(matches!(
            DataLoader::new().load(&path, None),
            Err(LoaderError::Parse { .. })
        ));
    }

    #[test]
    fn explicit_format_overrides_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "data.log", "a,b\n1,2\n");
        let docs = DataLoader::new()
            .load(&path, Some(DocumentFormat::Csv))
            .unwrap();
        assert_eq!(docs[0].content, "a: 1\nb: 2");
    }

    #[test]
    fn missing_and_unsupported_files() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            DataLoader::new().load(dir.path().join("nope.txt"), None),
            Err(LoaderError::NotFound(_))
        ));

        let pdf = write(&dir, "paper.pdf", "%PDF-1.7");
        assert!(matches!(
            DataLoader::new().load(&pdf, None),
            Err(LoaderError::UnsupportedFormat { .. })
        ));
    }

    #[test]
    fn batch_load_fails_fast() {
        let dir = tempfile::tempdir().unwrap();
        let a = write(&dir, "a.txt", "alpha");
        let b = write(&dir, "b.md", "# beta");

        let all = DataLoader::new().batch_load(&[&a, &b], None).unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1][0].content, "# beta");

        let missing = dir.path().join("missing.txt");
        assert!(DataLoader::new().batch_load(&[&a, &missing], None).is_err());
    }

    #[test]
    fn expand_paths_lists_supported_files_in_directories() {
        let dir = tempfile::tempdir().unwrap();
        write(&dir, "b.txt", "b");
        write(&dir, "a.json", "{}");
        write(&dir, "skip.pdf", "x");

        let expanded = expand_paths(&[dir.path().to_path_buf()]).unwrap();
        let names: Vec<_> = expanded
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, ["a.json", "b.txt"]);
    }
}
