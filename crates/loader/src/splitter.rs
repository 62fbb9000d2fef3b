//! Recursive character text splitter.
//!
//! Splits on the coarsest separator present in the text (paragraphs, then
//! lines, then sentences, then words, then characters), recursing into any
//! piece that is still too long, and merges small pieces back together up to
//! `chunk_size`. Consecutive chunks repeat up to `chunk_overlap` characters of
//! trailing context. Lengths are counted in characters, not bytes.

use std::collections::VecDeque;

use crate::error::LoaderError;

pub const DEFAULT_CHUNK_SIZE: usize = 1000;
pub const DEFAULT_CHUNK_OVERLAP: usize = 200;

/// Separators in priority order. The empty separator splits into characters.
pub const DEFAULT_SEPARATORS: &[&str] = &["\n\n", "\n", "。", "！", "？", ".", "!", "?", " ", ""];

#[derive(Debug, Clone)]
pub struct TextSplitter {
    chunk_size: usize,
    chunk_overlap: usize,
    separators: Vec<String>,
}

impl Default for TextSplitter {
    fn default() -> Self {
        Self {
            chunk_size: DEFAULT_CHUNK_SIZE,
            chunk_overlap: DEFAULT_CHUNK_OVERLAP,
            separators: DEFAULT_SEPARATORS.iter().map(|s| s.to_string()).collect(),
        }
    }
}

impl TextSplitter {
    /// Create a splitter. `chunk_overlap` must be smaller than `chunk_size`.
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Result<Self, LoaderError> {
        if chunk_size == 0 {
            return Err(LoaderError::InvalidSplitter("chunk_size must be > 0".into()));
        }
        if chunk_overlap >= chunk_size {
            return Err(LoaderError::InvalidSplitter(format!(
                "chunk_overlap ({chunk_overlap}) must be smaller than chunk_size ({chunk_size})"
            )));
        }
        Ok(Self {
            chunk_size,
            chunk_overlap,
            ..Self::default()
        })
    }

    /// Replace the separator list. An empty separator is always tried last.
    pub fn with_separators<I, S>(mut self, separators: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.separators = separators.into_iter().map(Into::into).collect();
        if self.separators.last().is_none_or(|s| !s.is_empty()) {
            self.separators.push(String::new());
        }
        self
    }

    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.chunk_overlap
    }

    /// Split `text` into trimmed, non-empty chunks.
    pub fn split_text(&self, text: &str) -> Vec<String> {
        self.split_recursive(text, &self.separators)
    }

    fn split_recursive(&self, text: &str, separators: &[String]) -> Vec<String> {
        let position = separators
            .iter()
            .position(|s| s.is_empty() || text.contains(s.as_str()))
            .unwrap_or(separators.len().saturating_sub(1));
        let separator = separators.get(position).map(String::as_str).unwrap_or("");
        let finer = separators.get(position + 1..).unwrap_or(&[]);

        // Keep each separator attached to the piece it ends.
        let pieces: Vec<String> = if separator.is_empty() {
            text.chars().map(String::from).collect()
        } else {
            text.split_inclusive(separator).map(str::to_string).collect()
        };

        let mut chunks = Vec::new();
        let mut small = Vec::new();
        for piece in pieces {
            if char_len(&piece) < self.chunk_size {
                small.push(piece);
                continue;
            }
            if !small.is_empty() {
                chunks.extend(self.merge(&small));
                small.clear();
            }
            if finer.is_empty() {
                push_trimmed(&mut chunks, &piece);
            } else {
                chunks.extend(self.split_recursive(&piece, finer));
            }
        }
        if !small.is_empty() {
            chunks.extend(self.merge(&small));
        }
        chunks
    }

    /// Greedily pack pieces into chunks, carrying overlap between them.
    fn merge(&self, pieces: &[String]) -> Vec<String> {
        let mut chunks = Vec::new();
        let mut window: VecDeque<&str> = VecDeque::new();
        let mut total = 0;

        for piece in pieces {
            let len = char_len(piece);
            if total + len > self.chunk_size && !window.is_empty() {
                push_trimmed(&mut chunks, &window.iter().copied().collect::<String>());
                while total > self.chunk_overlap
                    || (total + len > self.chunk_size && total > 0)
                {
                    match window.pop_front() {
                        Some(front) => total -= char_len(front),
                        None => break,
                    }
                }
            }
            window.push_back(piece);
            total += len;
        }
        if !window.is_empty() {
            push_trimmed(&mut chunks, &window.iter().copied().collect::<String>());
        }
        chunks
    }
}

fn char_len(s: &str) -> usize {
    s.chars().count()
}

fn push_trimmed(chunks: &mut Vec<String>, chunk: &str) {
    let trimmed = chunk.trim();
    if !trimmed.is_empty() {
        chunks.push(trimmed.to_string());
    }
}
