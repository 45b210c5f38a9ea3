//! `issuespilot chat`: multi-turn session with bounded history.

use super::{CommandResult, ConfigSource, Mode};

pub async fn run(source: &ConfigSource) -> CommandResult {
    let config = source
        .load()
        .map_err(|e| format!("Failed to load config: {e}"))?;
    let conversation = super::build_conversation(&config, Mode::Conversational).await?;

    let answered = super::run_repl(conversation).await?;
    tracing::info!(turns = answered, "Chat session finished");
    Ok(())
}
