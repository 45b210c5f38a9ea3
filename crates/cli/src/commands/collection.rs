//! `issuespilot collection`: create, delete or count the configured collection.

use clap::Subcommand;
use issuespilot_core::VectorIndex;

use super::{CommandResult, ConfigSource};

#[derive(Subcommand)]
pub enum Action {
    /// Create the collection if it does not exist
    Create,
    /// Delete the collection and everything in it
    Delete,
    /// Print the number of stored chunks
    Count,
}

pub async fn run(source: &ConfigSource, action: Action) -> CommandResult {
    let config = source
        .load()
        .map_err(|e| format!("Failed to load config: {e}"))?;
    let index = super::connect_index(&config)?;
    let name = config.require_collection()?;

    match action {
        Action::Create => {
            let info = index.get_or_create_collection(name).await?;
            println!("  ✅ Collection '{}' ready (id {})", info.name, info.id);
        }
        Action::Delete => {
            index.delete_collection(name).await?;
            println!("  🗑️  Collection '{name}' deleted");
        }
        Action::Count => {
            let count = index.count(name).await?;
            println!("  Collection '{name}' holds {count} chunks");
        }
    }

    let beat = index.heartbeat().await?;
    println!("  Heartbeat: {beat}");
    Ok(())
}
