//! `issuespilot ingest`: load a dataset directory into the collection.

use std::path::Path;
use std::sync::Arc;

use issuespilot_agent::{Ingestor, TextSplitter};

use super::{CommandResult, ConfigSource};

pub async fn run(source: &ConfigSource, dir: &Path) -> CommandResult {
    let config = source
        .load()
        .map_err(|e| format!("Failed to load config: {e}"))?;

    let collection = config.require_collection()?;
    let index = Arc::new(super::connect_index(&config)?);
    let embedder = issuespilot_providers::build_embedder(&config)?;
    let splitter = TextSplitter::new(
        config.ingest.chunk_size,
        config.ingest.chunk_overlap,
        config.ingest.separator.as_str(),
    )?;

    let ingestor = Ingestor::new(embedder, index, splitter);
    let report = ingestor.ingest_dir(collection, dir).await?;

    println!("📥 Ingested {} from {}", collection, dir.display());
    println!("  Files:       {}", report.files_ingested);
    println!("  Chunks:      {}", report.chunks_added);
    println!("  Collection:  {} chunks", report.collection_count);
    if !report.skipped.is_empty() {
        println!("  ⚠️  Skipped {} file(s):", report.skipped.len());
        for path in &report.skipped {
            println!("      {}", path.display());
        }
    }

    Ok(())
}
