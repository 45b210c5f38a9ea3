//! LLM and embedding provider implementations for IssuesPilot.
//!
//! All providers implement the `issuespilot_core::Provider` trait.
//! The router builds the configured chat provider and embedder.

mod http;

pub mod anthropic;
pub mod embedder;
pub mod openai_compat;
pub mod retry;
pub mod router;

pub use anthropic::AnthropicProvider;
pub use embedder::ProviderEmbedder;
pub use openai_compat::OpenAiCompatProvider;
pub use retry::{RetryPolicy, RetryingProvider};
pub use router::{BuildError, build_embedder, build_llm};
