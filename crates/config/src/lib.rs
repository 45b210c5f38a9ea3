//! Configuration loading, validation, and management for IssuesPilot.
//!
//! Configuration is resolved once at startup, in increasing priority:
//!
//! 1. Built-in defaults
//! 2. An optional TOML file (`issuespilot.toml`) for non-secret tuning
//! 3. Process environment, after loading `environment.env` via `dotenvy`
//!
//! The resulting [`AppConfig`] is passed by reference into every component
//! constructor; nothing reads the environment after startup.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default dotenv file, relative to the working directory.
pub const DEFAULT_ENV_FILE: &str = "environment.env";

/// Default TOML file, relative to the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "issuespilot.toml";

/// The root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Vector store connection
    #[serde(default)]
    pub index: IndexConfig,

    /// Embedding model endpoint
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Hosted LLM settings
    #[serde(default)]
    pub llm: LlmConfig,

    /// Similarity search settings
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Conversation memory settings
    #[serde(default)]
    pub conversation: ConversationConfig,

    /// Ingestion splitter settings
    #[serde(default)]
    pub ingest: IngestConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexConfig {
    /// Chroma host (`DB_SERVER`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub server: Option<String>,

    /// Chroma port (`DB_PORT`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,

    /// Collection name (`DB_COLLECTION`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub collection: Option<String>,

    /// On-disk path for a locally launched Chroma server (`DB_PATH`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<PathBuf>,

    #[serde(default = "default_tenant")]
    pub tenant: String,

    #[serde(default = "default_database")]
    pub database: String,

    /// HTTP timeout for index requests
    #[serde(default = "default_index_timeout")]
    pub timeout_secs: u64,
}

fn default_tenant() -> String {
    "default_tenant".into()
}
fn default_database() -> String {
    "default_database".into()
}
fn default_index_timeout() -> u64 {
    30
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            server: None,
            port: None,
            collection: None,
            path: None,
            tenant: default_tenant(),
            database: default_database(),
            timeout_secs: default_index_timeout(),
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct EmbeddingConfig {
    /// Embedding model name (`MODEL_NAME`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// OpenAI-compatible embeddings endpoint (`EMBEDDING_API_URL`)
    #[serde(default = "default_embedding_url")]
    pub api_url: String,

    /// Optional bearer key (`EMBEDDING_API_KEY`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

fn default_embedding_url() -> String {
    "http://localhost:11434/v1".into()
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: None,
            api_url: default_embedding_url(),
            api_key: None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "openai", "anthropic", or any OpenAI-compatible name (`LLM_PROVIDER`)
    #[serde(default = "default_provider")]
    pub provider: String,

    /// API key (`OPENAI_API_KEY` / `CLAUDE_API_KEY`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Model name (`OPENAI_MODEL` / `CLAUDE_MODEL`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,

    /// Base URL override (`LLM_API_URL`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,

    /// Extra attempts for transient failures; 0 disables retry (`LLM_MAX_RETRIES`)
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
}

fn default_provider() -> String {
    "openai".into()
}
fn default_temperature() -> f32 {
    1.0
}
fn default_max_tokens() -> u32 {
    1024
}
fn default_max_retries() -> u32 {
    2
}
fn default_llm_timeout() -> u64 {
    120
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            api_key: None,
            model: None,
            api_url: None,
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
            max_retries: default_max_retries(),
            timeout_secs: default_llm_timeout(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// Nearest neighbours per query (`RETRIEVAL_K`)
    #[serde(default = "default_k")]
    pub k: usize,
}

fn default_k() -> usize {
    8
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self { k: default_k() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversationConfig {
    /// History cap in turns, i.e. twice the number of exchanges (`HISTORY_MAX_TURNS`)
    #[serde(default = "default_max_turns")]
    pub max_turns: usize,

    /// Replacement instruction template; must contain `{context}`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instructions: Option<String>,
}

fn default_max_turns() -> usize {
    10
}

impl Default for ConversationConfig {
    fn default() -> Self {
        Self {
            max_turns: default_max_turns(),
            instructions: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,

    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,

    #[serde(default = "default_separator")]
    pub separator: String,
}

fn default_chunk_size() -> usize {
    100
}
fn default_chunk_overlap() -> usize {
    25
}
fn default_separator() -> String {
    "!".into()
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            separator: default_separator(),
        }
    }
}

/// Redact a secret string for Debug output.
fn redact(s: &Option<String>) -> &'static str {
    match s {
        Some(_) => "[REDACTED]",
        None => "None",
    }
}

impl std::fmt::Debug for EmbeddingConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EmbeddingConfig")
            .field("model", &self.model)
            .field("api_url", &self.api_url)
            .field("api_key", &redact(&self.api_key))
            .finish()
    }
}

impl std::fmt::Debug for LlmConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LlmConfig")
            .field("provider", &self.provider)
            .field("api_key", &redact(&self.api_key))
            .field("model", &self.model)
            .field("api_url", &self.api_url)
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("max_retries", &self.max_retries)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl AppConfig {
    /// Load configuration for this process.
    ///
    /// `env_file` defaults to `environment.env` and `config_file` to
    /// `issuespilot.toml`; both are optional on disk.
    pub fn load(env_file: Option<&Path>, config_file: Option<&Path>) -> Result<Self, ConfigError> {
        let env_path = env_file.unwrap_or_else(|| Path::new(DEFAULT_ENV_FILE));
        match dotenvy::from_path(env_path) {
            Ok(()) => tracing::debug!(path = %env_path.display(), "Loaded environment file"),
            Err(e) if e.not_found() => {
                tracing::debug!(path = %env_path.display(), "No environment file, using process env")
            }
            Err(e) => {
                return Err(ConfigError::ReadError {
                    path: env_path.to_path_buf(),
                    reason: e.to_string(),
                });
            }
        }

        let config_path = config_file.unwrap_or_else(|| Path::new(DEFAULT_CONFIG_FILE));
        let mut config = Self::load_from(config_path)?;
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a specific TOML file. A missing file yields defaults.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            tracing::debug!("No config file found at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        let config: Self = toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Overlay environment variables on top of the file/default values.
    ///
    /// `lookup` is `std::env::var` in production and a map in tests.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = get("DB_SERVER") {
            self.index.server = Some(v);
        }
        if let Some(v) = get("DB_PORT") {
            self.index.port = Some(parse_var("DB_PORT", &v)?);
        }
        if let Some(v) = get("DB_COLLECTION") {
            self.index.collection = Some(v);
        }
        if let Some(v) = get("DB_PATH") {
            self.index.path = Some(PathBuf::from(v));
        }

        if let Some(v) = get("MODEL_NAME") {
            self.embedding.model = Some(v);
        }
        if let Some(v) = get("EMBEDDING_API_URL") {
            self.embedding.api_url = v;
        }
        if let Some(v) = get("EMBEDDING_API_KEY") {
            self.embedding.api_key = Some(v);
        }

        if let Some(v) = get("LLM_PROVIDER") {
            let provider = v.to_lowercase();
            if provider != self.llm.provider {
                // File values were written for the other provider.
                self.llm.model = None;
                self.llm.api_key = None;
                self.llm.api_url = None;
                self.llm.provider = provider;
            }
        }
        let (key_var, model_var) = if self.llm.provider == "anthropic" {
            ("CLAUDE_API_KEY", "CLAUDE_MODEL")
        } else {
            ("OPENAI_API_KEY", "OPENAI_MODEL")
        };
        if let Some(v) = get(key_var) {
            self.llm.api_key = Some(v);
        }
        if let Some(v) = get(model_var) {
            self.llm.model = Some(v);
        }
        if let Some(v) = get("LLM_API_URL") {
            self.llm.api_url = Some(v);
        }
        if let Some(v) = get("LLM_TEMPERATURE") {
            self.llm.temperature = parse_var("LLM_TEMPERATURE", &v)?;
        }
        if let Some(v) = get("LLM_MAX_TOKENS") {
            self.llm.max_tokens = parse_var("LLM_MAX_TOKENS", &v)?;
        }
        if let Some(v) = get("LLM_MAX_RETRIES") {
            self.llm.max_retries = parse_var("LLM_MAX_RETRIES", &v)?;
        }

        if let Some(v) = get("RETRIEVAL_K") {
            self.retrieval.k = parse_var("RETRIEVAL_K", &v)?;
        }
        if let Some(v) = get("HISTORY_MAX_TURNS") {
            self.conversation.max_turns = parse_var("HISTORY_MAX_TURNS", &v)?;
        }

        Ok(())
    }

    /// Validate ranges. Presence of required values is checked by the `require_*` accessors.
    fn validate(&self) -> Result<(), ConfigError> {
        let max_temperature = if self.llm.provider == "anthropic" { 1.0 } else { 2.0 };
        if !(0.0..=max_temperature).contains(&self.llm.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "llm.temperature must be between 0.0 and {max_temperature:.1} for {}",
                self.llm.provider
            )));
        }
        if self.llm.max_tokens == 0 {
            return Err(ConfigError::ValidationError(
                "llm.max_tokens must be > 0".into(),
            ));
        }
        if self.retrieval.k == 0 {
            return Err(ConfigError::ValidationError(
                "retrieval.k must be > 0".into(),
            ));
        }
        if self.conversation.max_turns < 2 || self.conversation.max_turns % 2 != 0 {
            return Err(ConfigError::ValidationError(
                "conversation.max_turns must be an even number >= 2".into(),
            ));
        }
        if self.ingest.chunk_size == 0 || self.ingest.chunk_overlap >= self.ingest.chunk_size {
            return Err(ConfigError::ValidationError(
                "ingest.chunk_overlap must be smaller than a non-zero ingest.chunk_size".into(),
            ));
        }
        Ok(())
    }

    /// Base URL of the vector store, e.g. `http://localhost:8000`.
    pub fn require_index_url(&self) -> Result<String, ConfigError> {
        let server = self
            .index
            .server
            .as_deref()
            .ok_or(ConfigError::Missing("DB_SERVER"))?;
        let port = self.index.port.ok_or(ConfigError::Missing("DB_PORT"))?;
        if server.starts_with("http://") || server.starts_with("https://") {
            Ok(format!("{}:{port}", server.trim_end_matches('/')))
        } else {
            Ok(format!("http://{server}:{port}"))
        }
    }

    pub fn require_collection(&self) -> Result<&str, ConfigError> {
        self.index
            .collection
            .as_deref()
            .ok_or(ConfigError::Missing("DB_COLLECTION"))
    }

    pub fn require_db_path(&self) -> Result<&Path, ConfigError> {
        self.index
            .path
            .as_deref()
            .ok_or(ConfigError::Missing("DB_PATH"))
    }

    pub fn require_embedding_model(&self) -> Result<&str, ConfigError> {
        self.embedding
            .model
            .as_deref()
            .ok_or(ConfigError::Missing("MODEL_NAME"))
    }

    pub fn require_llm_api_key(&self) -> Result<&str, ConfigError> {
        self.llm.api_key.as_deref().ok_or(if self.llm.provider == "anthropic" {
            ConfigError::Missing("CLAUDE_API_KEY")
        } else {
            ConfigError::Missing("OPENAI_API_KEY")
        })
    }

    pub fn require_llm_model(&self) -> Result<&str, ConfigError> {
        self.llm.model.as_deref().ok_or(if self.llm.provider == "anthropic" {
            ConfigError::Missing("CLAUDE_MODEL")
        } else {
            ConfigError::Missing("OPENAI_MODEL")
        })
    }

    /// Check everything a question-answering session needs, reporting every
    /// missing variable at once.
    pub fn require_query_settings(&self) -> Result<(), ConfigError> {
        let missing: Vec<&'static str> = [
            self.require_index_url().err(),
            self.require_collection().err(),
            self.require_embedding_model().err(),
            self.require_llm_api_key().err(),
            self.require_llm_model().err(),
        ]
        .into_iter()
        .flatten()
        .flat_map(|e| match e {
            ConfigError::Missing(var) => vec![var],
            _ => vec![],
        })
        .collect();

        if missing.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::MissingMany(missing.join(", ")))
        }
    }
}

fn parse_var<T: std::str::FromStr>(var: &'static str, value: &str) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    value
        .trim()
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            var,
            reason: e.to_string(),
        })
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file at {path}: {reason}")]
    ReadError { path: PathBuf, reason: String },

    #[error("Failed to parse config file at {path}: {reason}")]
    ParseError { path: PathBuf, reason: String },

    #[error("Configuration validation failed: {0}")]
    ValidationError(String),

    #[error("Required environment variable {0} is not set")]
    Missing(&'static str),

    #[error("Required environment variables are not set: {0}")]
    MissingMany(String),

    #[error("Environment variable {var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

impl From<ConfigError> for issuespilot_core::Error {
    fn from(err: ConfigError) -> Self {
        issuespilot_core::Error::config(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    fn full_env() -> Vec<(&'static str, &'static str)> {
        vec![
            ("DB_SERVER", "10.0.0.5"),
            ("DB_PORT", "8000"),
            ("DB_COLLECTION", "network_issues"),
            ("MODEL_NAME", "all-MiniLM-L6-v2"),
            ("OPENAI_API_KEY", "sk-test"),
            ("OPENAI_MODEL", "gpt-4o"),
        ]
    }

    #[test]
    fn default_config_is_valid() {
        let config = AppConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.retrieval.k, 8);
        assert_eq!(config.conversation.max_turns, 10);
        assert_eq!(config.llm.provider, "openai");
        assert_eq!(config.ingest.separator, "!");
    }

    #[test]
    fn env_overlay_populates_required_values() {
        let mut config = AppConfig::default();
        config.apply_env(env(&full_env())).unwrap();

        assert_eq!(config.require_index_url().unwrap(), "http://10.0.0.5:8000");
        assert_eq!(config.require_collection().unwrap(), "network_issues");
        assert_eq!(config.require_llm_model().unwrap(), "gpt-4o");
        assert!(config.require_query_settings().is_ok());
    }

    #[test]
    fn anthropic_reads_claude_variables() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[
                ("LLM_PROVIDER", "Anthropic"),
                ("CLAUDE_API_KEY", "sk-ant"),
                ("CLAUDE_MODEL", "claude-sonnet-4-20250514"),
                ("OPENAI_API_KEY", "sk-ignored"),
            ]))
            .unwrap();
        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.require_llm_api_key().unwrap(), "sk-ant");
        assert_eq!(
            config.require_llm_model().unwrap(),
            "claude-sonnet-4-20250514"
        );
    }

    #[test]
    fn missing_variables_are_all_reported() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[("DB_SERVER", "localhost"), ("MODEL_NAME", "m")]))
            .unwrap();
        let err = config.require_query_settings().unwrap_err().to_string();
        assert!(err.contains("DB_PORT"));
        assert!(err.contains("DB_COLLECTION"));
        assert!(err.contains("OPENAI_API_KEY"));
        assert!(err.contains("OPENAI_MODEL"));
        assert!(!err.contains("DB_SERVER"));
    }

    #[test]
    fn invalid_port_is_rejected() {
        let mut config = AppConfig::default();
        let err = config
            .apply_env(env(&[("DB_PORT", "eighty")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { var: "DB_PORT", .. }));
    }

    #[test]
    fn blank_values_are_ignored() {
        let mut config = AppConfig::default();
        config.apply_env(env(&[("DB_COLLECTION", "  ")])).unwrap();
        assert!(config.require_collection().is_err());
    }

    #[test]
    fn scheme_in_server_is_preserved() {
        let mut config = AppConfig::default();
        config
            .apply_env(env(&[("DB_SERVER", "https://chroma.lab/"), ("DB_PORT", "443")]))
            .unwrap();
        assert_eq!(config.require_index_url().unwrap(), "https://chroma.lab:443");
    }

    #[test]
    fn invalid_temperature_rejected() {
        let mut config = AppConfig::default();
        config.llm.temperature = 5.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn odd_history_cap_rejected() {
        let mut config = AppConfig::default();
        config.conversation.max_turns = 7;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_config_file_returns_defaults() {
        let config = AppConfig::load_from(Path::new("/nonexistent/issuespilot.toml")).unwrap();
        assert_eq!(config.retrieval.k, 8);
    }

    #[test]
    fn toml_file_overrides_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("issuespilot.toml");
        std::fs::write(
            &path,
            "[retrieval]\nk = 10\n\n[llm]\nprovider = \"anthropic\"\nmax_tokens = 2048\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(config.retrieval.k, 10);
        assert_eq!(config.llm.provider, "anthropic");
        assert_eq!(config.llm.max_tokens, 2048);
        assert_eq!(config.conversation.max_turns, 10);
    }

    #[test]
    fn anthropic_temperature_capped_at_one() {
        let mut config = AppConfig::default();
        config.llm.temperature = 1.5;
        assert!(config.validate().is_ok());

        config.llm.provider = "anthropic".into();
        let err = config.validate().unwrap_err().to_string();
        assert!(err.contains("between 0.0 and 1.0 for anthropic"));
    }

    #[test]
    fn provider_switch_drops_file_model() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("issuespilot.toml");
        std::fs::write(
            &path,
            "[llm]\nprovider = \"openai\"\nmodel = \"gpt-4o\"\napi_url = \"http://localhost:8080/v1\"\n",
        )
        .unwrap();

        let mut config = AppConfig::load_from(&path).unwrap();
        config
            .apply_env(env(&[("LLM_PROVIDER", "anthropic"), ("CLAUDE_API_KEY", "sk-ant")]))
            .unwrap();

        assert!(config.llm.api_url.is_none());
        let err = config.require_llm_model().unwrap_err();
        assert!(matches!(err, ConfigError::Missing("CLAUDE_MODEL")));
    }

    #[test]
    fn same_provider_keeps_file_model() {
        let mut config = AppConfig::default();
        config.llm.model = Some("gpt-4o-mini".into());
        config.apply_env(env(&[("LLM_PROVIDER", "OpenAI")])).unwrap();
        assert_eq!(config.require_llm_model().unwrap(), "gpt-4o-mini");
    }

    #[test]
    fn toml_instructions_are_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("issuespilot.toml");
        std::fs::write(
            &path,
            "[conversation]\ninstructions = \"\"\"\nAnswer as a NOC engineer.\n{context}\"\"\"\n",
        )
        .unwrap();

        let config = AppConfig::load_from(&path).unwrap();
        assert_eq!(
            config.conversation.instructions.as_deref(),
            Some("Answer as a NOC engineer.\n{context}")
        );
        assert_eq!(config.conversation.max_turns, 10);
    }

    #[test]
    fn debug_redacts_keys() {
        let mut config = AppConfig::default();
        config.llm.api_key = Some("sk-very-secret".into());
        let debug = format!("{config:?}");
        assert!(!debug.contains("sk-very-secret"));
        assert!(debug.contains("[REDACTED]"));
    }

    #[test]
    fn config_error_becomes_core_config_error() {
        let err: issuespilot_core::Error = ConfigError::Missing("DB_SERVER").into();
        assert!(matches!(err, issuespilot_core::Error::Config { .. }));
        assert!(err.to_string().contains("DB_SERVER"));
    }
}
