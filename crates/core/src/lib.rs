//! # IssuesPilot Core
//!
//! Domain types, traits, and error definitions for the IssuesPilot
//! network-troubleshooting assistant. This crate has **no I/O**; it defines
//! the model that the index, provider, and agent crates implement against.
//!
//! ## Seams
//!
//! Every external collaborator is a trait here:
//! - [`Provider`]: a hosted LLM (and optionally an embeddings endpoint)
//! - [`Embedder`]: text → vector
//! - [`VectorIndex`]: a remote store of (vector, text, metadata) per collection
//!
//! Implementations live in their respective crates, so the conversation loop
//! can be exercised end-to-end with in-process fakes.

pub mod chunk;
pub mod embedder;
pub mod error;
pub mod index;
pub mod message;
pub mod prompt;
pub mod provider;

// Re-export key types at crate root for ergonomics
pub use chunk::{Chunk, Metadata, RetrievalResult, SearchHit};
pub use embedder::Embedder;
pub use error::{Error, IndexError, ProviderError};
pub use index::{CollectionInfo, VectorIndex};
pub use message::{Message, Role, Speaker, Turn};
pub use prompt::Prompt;
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
