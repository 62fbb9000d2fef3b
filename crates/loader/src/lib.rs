//! Document loading for aichat.
//!
//! Maps a file extension to a parser ([`DocumentFormat`]), reads the file into
//! one or more records, and splits each record into chunks with a recursive
//! character [`TextSplitter`]. A [`KnowledgeBase`] keeps loaded documents by
//! id and answers keyword searches over their chunks.

pub mod error;
pub mod format;
pub mod knowledge_base;
pub mod loader;
pub mod splitter;

pub use error::LoaderError;
pub use format::DocumentFormat;
pub use knowledge_base::{
    DEFAULT_TOP_K, DocumentId, DocumentInfo, KnowledgeBase, KnowledgeStats, SearchHit,
};
pub use loader::{DataLoader, Document, expand_paths};
pub use splitter::TextSplitter;
