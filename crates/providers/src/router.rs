//! Provider router: builds the configured LLM and embedder.
//!
//! Called once at startup; the rest of the program only sees trait objects.

use std::sync::Arc;
use std::time::Duration;

use issuespilot_config::{AppConfig, ConfigError};
use issuespilot_core::Embedder;
use issuespilot_core::error::ProviderError;
use issuespilot_core::provider::Provider;
use tracing::info;

use crate::anthropic::{self, AnthropicProvider};
use crate::embedder::ProviderEmbedder;
use crate::openai_compat::OpenAiCompatProvider;
use crate::retry::{RetryPolicy, RetryingProvider};

/// Startup failures while wiring providers.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Provider(#[from] ProviderError),
}

impl From<BuildError> for issuespilot_core::Error {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::Config(e) => e.into(),
            BuildError::Provider(e) => issuespilot_core::Error::config(e.to_string()),
        }
    }
}

/// The chat provider selected by `llm.provider`, wrapped in the retry policy.
pub fn build_llm(config: &AppConfig) -> Result<Arc<dyn Provider>, BuildError> {
    let api_key = config.require_llm_api_key()?;
    let timeout = Duration::from_secs(config.llm.timeout_secs);
    let name = config.llm.provider.as_str();

    let provider: Arc<dyn Provider> = if name == "anthropic" {
        let mut p = AnthropicProvider::new(api_key, timeout)?;
        if let Some(url) = &config.llm.api_url {
            p = p.with_base_url(url);
        }
        Arc::new(p)
    } else {
        let base_url = config
            .llm
            .api_url
            .clone()
            .unwrap_or_else(|| default_base_url(name));
        Arc::new(OpenAiCompatProvider::new(
            name,
            base_url,
            Some(api_key.to_string()),
            timeout,
        )?)
    };

    info!(
        provider = name,
        max_retries = config.llm.max_retries,
        "LLM provider configured"
    );

    Ok(wrap_retry(provider, config.llm.max_retries))
}

/// The embedder for `MODEL_NAME` served from `embedding.api_url`.
///
/// Not retried: an embedding failure fails the turn on the first attempt.
pub fn build_embedder(config: &AppConfig) -> Result<Arc<dyn Embedder>, BuildError> {
    let model = config.require_embedding_model()?;
    let provider: Arc<dyn Provider> = Arc::new(OpenAiCompatProvider::new(
        "embeddings",
        config.embedding.api_url.clone(),
        config.embedding.api_key.clone(),
        Duration::from_secs(config.llm.timeout_secs),
    )?);

    info!(model, url = %config.embedding.api_url, "Embedder configured");

    Ok(Arc::new(ProviderEmbedder::new(provider, model)))
}

fn wrap_retry(provider: Arc<dyn Provider>, max_retries: u32) -> Arc<dyn Provider> {
    if max_retries == 0 {
        provider
    } else {
        Arc::new(RetryingProvider::new(
            provider,
            RetryPolicy::with_max_retries(max_retries),
        ))
    }
}

/// Get the default base URL for well-known providers.
fn default_base_url(provider_name: &str) -> String {
    match provider_name {
        "openai" => "https://api.openai.com/v1".into(),
        "anthropic" => anthropic::DEFAULT_BASE_URL.into(),
        "openrouter" => "https://openrouter.ai/api/v1".into(),
        "ollama" => "http://localhost:11434/v1".into(),
        "groq" => "https://api.groq.com/openai/v1".into(),
        "vllm" => "http://localhost:8000/v1".into(),
        "llamacpp" | "llama.cpp" => "http://localhost:8080/v1".into(),
        _ => "https://api.openai.com/v1".into(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Read one HTTP request (head plus `Content-Length` body) off the socket.
    async fn drain_request(socket: &mut TcpStream) {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 4096];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                return;
            }
            buf.extend_from_slice(&chunk[..n]);

            let Some(head_end) = buf.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let head = String::from_utf8_lossy(&buf[..head_end]).to_lowercase();
            let body_len = head
                .lines()
                .find_map(|l| l.strip_prefix("content-length:"))
                .and_then(|v| v.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if buf.len() >= head_end + 4 + body_len {
                return;
            }
        }
    }

    /// A server that answers every request with 503 and counts them.
    async fn always_overloaded() -> (String, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let hits = Arc::new(AtomicUsize::new(0));
        let counter = hits.clone();
        tokio::spawn(async move {
            loop {
                let (mut socket, _) = listener.accept().await.unwrap();
                let counter = counter.clone();
                tokio::spawn(async move {
                    drain_request(&mut socket).await;
                    counter.fetch_add(1, Ordering::SeqCst);
                    let _ = socket
                        .write_all(
                            b"HTTP/1.1 503 Service Unavailable\r\n\
                              content-type: text/plain\r\n\
                              content-length: 10\r\n\
                              connection: close\r\n\r\noverloaded",
                        )
                        .await;
                    let _ = socket.shutdown().await;
                });
            }
        });
        (format!("http://{addr}"), hits)
    }

    fn configured(provider: &str) -> AppConfig {
        let mut config = AppConfig::default();
        config.llm.provider = provider.into();
        config.llm.api_key = Some("sk-test".into());
        config.llm.model = Some("model".into());
        config.embedding.model = Some("all-MiniLM-L6-v2".into());
        config
    }

    #[test]
    fn default_base_urls() {
        assert!(default_base_url("openai").contains("api.openai.com"));
        assert!(default_base_url("ollama").contains("localhost:11434"));
        assert!(default_base_url("anthropic").contains("api.anthropic.com"));
    }

    #[test]
    fn builds_openai_with_retry() {
        let provider = build_llm(&configured("openai")).unwrap();
        assert_eq!(provider.name(), "openai");
    }

    #[test]
    fn builds_anthropic_without_retry() {
        let mut config = configured("anthropic");
        config.llm.max_retries = 0;
        let provider = build_llm(&config).unwrap();
        assert_eq!(provider.name(), "anthropic");
    }

    #[test]
    fn missing_key_is_a_config_error() {
        let mut config = configured("anthropic");
        config.llm.api_key = None;
        let err = build_llm(&config).err().unwrap();
        assert!(err.to_string().contains("CLAUDE_API_KEY"));
    }

    #[test]
    fn builds_embedder_for_model() {
        let embedder = build_embedder(&configured("openai")).unwrap();
        assert_eq!(embedder.model(), "all-MiniLM-L6-v2");
    }

    #[tokio::test]
    async fn embedding_failure_is_not_retried() {
        let (url, hits) = always_overloaded().await;
        let mut config = configured("openai");
        config.llm.max_retries = 2;
        config.embedding.api_url = url;

        let embedder = build_embedder(&config).unwrap();
        let err = embedder
            .encode("What is the status of device PDX-RO?")
            .await
            .unwrap_err();

        assert!(matches!(err, ProviderError::ApiError { status_code: 503, .. }));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn missing_embedding_model_is_reported() {
        let mut config = configured("openai");
        config.embedding.model = None;
        let err = build_embedder(&config).err().unwrap();
        assert!(err.to_string().contains("MODEL_NAME"));
    }
}
