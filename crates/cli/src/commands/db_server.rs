//! `issuespilot db-server`: run a local Chroma server.

use issuespilot_config::ConfigError;
use tracing::info;

use super::{CommandResult, ConfigSource};

pub async fn run(source: &ConfigSource) -> CommandResult {
    let config = source
        .load()
        .map_err(|e| format!("Failed to load config: {e}"))?;

    let path = config.require_db_path()?;
    let port = config.index.port.ok_or(ConfigError::Missing("DB_PORT"))?;

    if !path.exists() {
        tokio::fs::create_dir_all(path).await?;
        info!(path = %path.display(), "Created database directory");
    }

    info!(port, path = %path.display(), "Starting chroma");
    let status = tokio::process::Command::new("chroma")
        .arg("run")
        .arg("--port")
        .arg(port.to_string())
        .arg("--path")
        .arg(path)
        .kill_on_drop(true)
        .status()
        .await
        .map_err(|e| format!("Failed to start `chroma run`: {e}"))?;

    if !status.success() {
        return Err(format!("chroma exited with {status}").into());
    }
    Ok(())
}
