//! `aichat search`: Keyword search over freshly loaded documents.

use super::ingest::SourceArgs;

pub fn run(
    query: &str,
    source: &SourceArgs,
    top_k: usize,
) -> Result<(), Box<dyn std::error::Error>> {
    let kb = source.knowledge_base()?;
    let hits = kb.search(query, top_k);

    if hits.is_empty() {
        println!("  No matches for \"{query}\".");
        return Ok(());
    }

    for (rank, hit) in hits.iter().enumerate() {
        let source = kb
            .get_document_info(&hit.document_id)
            .map(|d| d.source.as_str())
            .unwrap_or("?");
        println!("  {}. [{:.3}] {source}", rank + 1, hit.score);
        for line in hit.chunk.content.lines().take(3) {
            println!("       {line}");
        }
    }
    Ok(())
}
