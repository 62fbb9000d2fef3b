//! In-memory knowledge base over loaded documents.
//!
//! Each added file becomes one entry, keyed by a generated id, holding its
//! chunks plus bookkeeping metadata. `search` ranks chunks by query-term
//! overlap weighted by inverse document frequency.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::LoaderError;
use crate::format::DocumentFormat;
use crate::loader::{DataLoader, Document};

/// Default number of hits returned by [`KnowledgeBase::search`].
pub const DEFAULT_TOP_K: usize = 4;

/// Identifier of a document added to the knowledge base.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DocumentId(pub String);

impl DocumentId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Bookkeeping for one added document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentInfo {
    pub id: DocumentId,
    pub source: String,
    pub added_at: DateTime<Utc>,
    pub chunk_count: usize,

    /// Caller-supplied metadata, kept as given.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

/// Aggregate figures for the whole knowledge base.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KnowledgeStats {
    pub total_documents: usize,
    pub total_chunks: usize,
    pub last_updated: Option<DateTime<Utc>>,
}

/// A chunk matched by a search, best first.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub document_id: DocumentId,
    pub score: f32,
    pub chunk: Document,
}

struct Entry {
    info: DocumentInfo,
    chunks: Vec<Document>,
}

/// Documents held in memory for lookup and keyword search.
#[derive(Default)]
pub struct KnowledgeBase {
    loader: DataLoader,
    /// Insertion order
    entries: Vec<Entry>,
}

impl KnowledgeBase {
    pub fn new(loader: DataLoader) -> Self {
        Self {
            loader,
            entries: Vec::new(),
        }
    }

    /// Load `path` and add its chunks. The format is detected from the
    /// extension unless given.
    pub fn add_document(
        &mut self,
        path: impl AsRef<Path>,
        format: Option<DocumentFormat>,
        metadata: Map<String, Value>,
    ) -> Result<DocumentId, LoaderError> {
        let path = path.as_ref();
        let chunks = self.loader.load(path, format)?;
        Ok(self.insert(path.display().to_string(), chunks, metadata))
    }

    /// Add already loaded chunks under `source`.
    pub fn insert(
        &mut self,
        source: impl Into<String>,
        chunks: Vec<Document>,
        metadata: Map<String, Value>,
    ) -> DocumentId {
        let info = DocumentInfo {
            id: DocumentId::new(),
            source: source.into(),
            added_at: Utc::now(),
            chunk_count: chunks.len(),
            metadata,
        };
        info!(
            document_id = %info.id,
            source = %info.source,
            chunks = info.chunk_count,
            "Added document to knowledge base"
        );
        let id = info.id.clone();
        self.entries.push(Entry { info, chunks });
        id
    }

    /// Remove a document. Returns `false` if the id is unknown.
    pub fn remove_document(&mut self, id: &DocumentId) -> bool {
        match self.entries.iter().position(|e| &e.info.id == id) {
            Some(index) => {
                let entry = self.entries.remove(index);
                info!(document_id = %id, source = %entry.info.source, "Removed document");
                true
            }
            None => {
                warn!(document_id = %id, "Document not found");
                false
            }
        }
    }

    pub fn get_document_info(&self, id: &DocumentId) -> Option<&DocumentInfo> {
        self.entries
            .iter()
            .find(|e| &e.info.id == id)
            .map(|e| &e.info)
    }

    /// All documents, in the order they were added.
    pub fn list_documents(&self) -> impl Iterator<Item = &DocumentInfo> + '_ {
        self.entries.iter().map(|e| &e.info)
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn stats(&self) -> KnowledgeStats {
        KnowledgeStats {
            total_documents: self.entries.len(),
            total_chunks: self.entries.iter().map(|e| e.info.chunk_count).sum(),
            last_updated: self.entries.iter().map(|e| e.info.added_at).max(),
        }
    }

    /// The `k` chunks sharing the most (rarity-weighted) terms with `query`.
    ///
    /// Chunks with no term in common are never returned. Ties keep insertion
    /// order.
    pub fn search(&self, query: &str, k: usize) -> Vec<SearchHit> {
        let query_terms: HashSet<String> = terms(query).collect();
        if k == 0 || query_terms.is_empty() {
            return Vec::new();
        }

        let indexed: Vec<(&DocumentId, &Document, HashSet<String>)> = self
            .entries
            .iter()
            .flat_map(|e| e.chunks.iter().map(move |c| (&e.info.id, c)))
            .map(|(id, chunk)| (id, chunk, terms(&chunk.content).collect()))
            .collect();

        let total = indexed.len() as f32;
        let mut frequency: HashMap<&str, usize> = HashMap::new();
        for (_, _, chunk_terms) in &indexed {
            for term in &query_terms {
                if chunk_terms.contains(term) {
                    *frequency.entry(term.as_str()).or_default() += 1;
                }
            }
        }

        let mut hits: Vec<SearchHit> = indexed
            .iter()
            .filter_map(|(id, chunk, chunk_terms)| {
                let score: f32 = query_terms
                    .iter()
                    .filter(|t| chunk_terms.contains(*t))
                    .map(|t| {
                        let df = frequency.get(t.as_str()).copied().unwrap_or(1) as f32;
                        (1.0 + total / df).ln()
                    })
                    .sum();
                (score > 0.0).then(|| SearchHit {
                    document_id: (*id).clone(),
                    score,
                    chunk: (*chunk).clone(),
                })
            })
            .collect();

        hits.sort_by(|a, b| b.score.total_cmp(&a.score));
        hits.truncate(k);
        debug!(query = %query, hits = hits.len(), "Searched knowledge base");
        hits
    }
}

/// Lowercased alphanumeric words. CJK ideographs count as one term each,
/// since those scripts do not separate words with spaces.
fn terms(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .flat_map(|word| {
            let mut out = Vec::new();
            let mut run = String::new();
            for c in word.chars() {
                if is_cjk(c) {
                    if !run.is_empty() {
                        out.push(std::mem::take(&mut run).to_lowercase());
                    }
                    out.push(c.to_string());
                } else {
                    run.push(c);
                }
            }
            if !run.is_empty() {
                out.push(run.to_lowercase());
            }
            out
        })
}

fn is_cjk(c: char) -> bool {
    matches!(c, '\u{3400}'..='\u{4DBF}' | '\u{4E00}'..='\u{9FFF}' | '\u{F900}'..='\u{FAFF}')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn chunk(content: &str) -> Document {
        Document {
            content: content.to_string(),
            metadata: Map::new(),
        }
    }

    fn sample() -> (KnowledgeBase, DocumentId, DocumentId) {
        let mut kb = KnowledgeBase::default();
        let rust = kb.insert(
            "rust.md",
            vec![
                chunk("Ownership moves values between bindings."),
                chunk("Borrowing lends a reference without moving."),
            ],
            Map::new(),
        );
        let python = kb.insert(
            "python.md",
            vec![chunk("Python uses reference counting and a garbage collector.")],
            Map::new(),
        );
        (kb, rust, python)
    }

    #[test]
    fn add_document_loads_file_and_records_info() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes.txt");
        fs::write(&path, "Tokio is an async runtime.").unwrap();

        let mut metadata = Map::new();
        metadata.insert("topic".into(), Value::from("async"));

        let mut kb = KnowledgeBase::default();
        let id = kb.add_document(&path, None, metadata).unwrap();

        let info = kb.get_document_info(&id).unwrap();
        assert_eq!(info.source, path.display().to_string());
        assert_eq!(info.chunk_count, 1);
        assert_eq!(info.metadata["topic"], "async");
    }

    #[test]
    fn failed_load_adds_nothing() {
        let mut kb = KnowledgeBase::default();
        let result = kb.add_document("/nonexistent/notes.txt", None, Map::new());
        assert!(matches!(result, Err(LoaderError::NotFound(_))));
        assert!(kb.is_empty());
    }

    #[test]
    fn list_remove_and_stats() {
        let (mut kb, rust, python) = sample();
        let sources: Vec<_> = kb.list_documents().map(|d| d.source.as_str()).collect();
        assert_eq!(sources, ["rust.md", "python.md"]);

        let stats = kb.stats();
        assert_eq!(stats.total_documents, 2);
        assert_eq!(stats.total_chunks, 3);
        assert!(stats.last_updated.is_some());

        assert!(kb.remove_document(&rust));
        assert!(!kb.remove_document(&rust));
        assert!(kb.get_document_info(&rust).is_none());
        assert_eq!(kb.stats().total_chunks, 1);
        assert_eq!(kb.list_documents().next().unwrap().id, python);
    }

    #[test]
    fn empty_stats_have_no_timestamp() {
        let stats = KnowledgeBase::default().stats();
        assert_eq!(stats.total_documents, 0);
        assert_eq!(stats.last_updated, None);
    }

    #[test]
    fn search_ranks_rarer_terms_higher() {
        let (kb, rust, python) = sample();

        // "reference" appears in two chunks, "garbage" in one.
        let hits = kb.search("garbage reference", DEFAULT_TOP_K);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].document_id, python);
        assert_eq!(hits[1].document_id, rust);
        assert!(hits[0].score > hits[1].score);
        assert!(hits[1].chunk.content.starts_with("Borrowing"));
    }

    #[test]
    fn search_is_case_insensitive_and_bounded() {
        let (kb, rust, _) = sample();
        let hits = kb.search("OWNERSHIP", 1);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id, rust);

        assert!(kb.search("ownership", 0).is_empty());
        assert!(kb.search("  ?! ", 4).is_empty());
        assert!(kb.search("haskell", 4).is_empty());
    }

    #[test]
    fn cjk_text_matches_by_character() {
        let mut kb = KnowledgeBase::default();
        let id = kb.insert("zh.txt", vec![chunk("所有权是Rust的核心概念。")], Map::new());
        kb.insert("en.txt", vec![chunk("Unrelated text.")], Map::new());

        let hits = kb.search("核心", 4);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].document_id, id);
    }

    #[test]
    fn terms_split_words_and_ideographs() {
        let collected: Vec<String> = terms("Hello, 世界 rust2024!").collect();
        assert_eq!(collected, ["hello", "世", "界", "rust2024"]);
    }
}
