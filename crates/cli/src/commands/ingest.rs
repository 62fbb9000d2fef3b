//! `aichat ingest`: Load documents into a knowledge base and report its stats.

use std::path::PathBuf;

use aichat_loader::{DataLoader, DocumentFormat, KnowledgeBase, TextSplitter, expand_paths};
use clap::Args;
use serde_json::{Map, Value};

/// Where documents come from and how they are chunked.
#[derive(Args, Debug)]
pub struct SourceArgs {
    /// Files or directories to load
    #[arg(required = true)]
    pub paths: Vec<PathBuf>,

    /// Force a format instead of detecting it from the extension
    #[arg(long)]
    pub format: Option<DocumentFormat>,

    /// Maximum characters per chunk
    #[arg(long, default_value_t = 1000)]
    pub chunk_size: usize,

    /// Characters shared between neighbouring chunks
    #[arg(long, default_value_t = 200)]
    pub chunk_overlap: usize,
}

impl SourceArgs {
    /// Load every supported file under `paths`, stopping at the first failure.
    pub fn knowledge_base(&self) -> Result<KnowledgeBase, Box<dyn std::error::Error>> {
        let splitter = TextSplitter::new(self.chunk_size, self.chunk_overlap)?;
        let mut kb = KnowledgeBase::new(DataLoader::new().with_splitter(splitter));

        let files = expand_paths(&self.paths)?;
        if files.is_empty() {
            return Err("No supported files found".into());
        }
        for path in &files {
            let mut metadata = Map::new();
            if let Some(format) = self.format {
                metadata.insert("format".into(), Value::from(format.to_string()));
            }
            kb.add_document(path, self.format, metadata)?;
        }
        Ok(kb)
    }
}

pub fn run(source: &SourceArgs) -> Result<(), Box<dyn std::error::Error>> {
    let kb = source.knowledge_base()?;

    for doc in kb.list_documents() {
        println!("  {:>5} chunks  {}  ({})", doc.chunk_count, doc.source, doc.id);
    }

    let stats = kb.stats();
    println!();
    println!("  Documents:     {}", stats.total_documents);
    println!("  Chunks:        {}", stats.total_chunks);
    if let Some(at) = stats.last_updated {
        println!("  Last updated:  {}", at.format("%Y-%m-%d %H:%M:%S UTC"));
    }
    Ok(())
}
