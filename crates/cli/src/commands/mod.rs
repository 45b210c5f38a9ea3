pub mod chat;
pub mod collection;
pub mod db_server;
pub mod doctor;
pub mod ingest;
pub mod query;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use issuespilot_agent::{
    ConversationLoop, GenerationSettings, LlmClient, PromptAssembler, Repl, Retriever,
};
use issuespilot_config::{AppConfig, ConfigError};
use issuespilot_core::VectorIndex;
use issuespilot_index::ChromaIndex;
use tracing::{info, warn};

pub type CommandResult = Result<(), Box<dyn std::error::Error>>;

/// Where configuration comes from, as given on the command line.
pub struct ConfigSource {
    pub env_file: Option<PathBuf>,
    pub config_file: Option<PathBuf>,
}

impl ConfigSource {
    pub fn load(&self) -> Result<AppConfig, ConfigError> {
        AppConfig::load(self.env_file.as_deref(), self.config_file.as_deref())
    }
}

/// Chroma client for the configured server, tenant and database.
pub fn connect_index(config: &AppConfig) -> Result<ChromaIndex, Box<dyn std::error::Error>> {
    let url = config.require_index_url()?;
    let index = ChromaIndex::new(url, Duration::from_secs(config.index.timeout_secs))?
        .with_tenant(&config.index.tenant, &config.index.database);
    Ok(index)
}

pub enum Mode {
    Stateless,
    Conversational,
}

/// Wire retriever, model and history into a ready conversation.
pub async fn build_conversation(
    config: &AppConfig,
    mode: Mode,
) -> Result<ConversationLoop, Box<dyn std::error::Error>> {
    config.require_query_settings()?;

    let index: Arc<dyn VectorIndex> = Arc::new(connect_index(config)?);
    if let Err(e) = index.heartbeat().await {
        warn!(error = %e, "Vector store not reachable yet; queries will fail until it is");
    }

    let embedder = issuespilot_providers::build_embedder(config)?;
    let retriever = Retriever::new(embedder, index, config.require_collection()?);

    let provider = issuespilot_providers::build_llm(config)?;
    let llm = LlmClient::new(provider, config.require_llm_model()?);

    let settings = GenerationSettings {
        k: config.retrieval.k,
        temperature: config.llm.temperature,
        max_tokens: config.llm.max_tokens,
    };

    info!(
        provider = llm.provider_name(),
        model = llm.model(),
        collection = retriever.collection(),
        k = settings.k,
        "Session ready"
    );

    let conversation = match mode {
        Mode::Stateless => ConversationLoop::stateless(retriever, llm, settings),
        Mode::Conversational => ConversationLoop::conversational(
            retriever,
            llm,
            settings,
            config.conversation.max_turns,
        ),
    };

    Ok(match &config.conversation.instructions {
        Some(template) => conversation.with_assembler(PromptAssembler::new(template.as_str())?),
        None => conversation,
    })
}

/// Drive the conversation from stdin until the user ends it.
pub async fn run_repl(mut conversation: ConversationLoop) -> std::io::Result<usize> {
    let stdin = tokio::io::BufReader::new(tokio::io::stdin());
    let mut repl = Repl::new(stdin, tokio::io::stdout(), tokio::io::stderr());
    repl.run(&mut conversation).await
}
