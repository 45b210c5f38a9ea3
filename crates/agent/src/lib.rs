//! The conversational retrieval loop: the heart of IssuesPilot.
//!
//! Every turn follows the same path:
//!
//! 1. **Retrieve** the top-k chunks for the query (embed, then similarity search)
//! 2. **Assemble** system instructions, context, history and the query
//! 3. **Generate** an answer with the hosted LLM
//! 4. **Remember** the (query, answer) pair, evicting the oldest turns past the cap
//!
//! Blank input ends the conversation without touching any remote service.

pub mod conversation;
pub mod history;
pub mod ingest;
pub mod llm;
pub mod prompt;
pub mod repl;
pub mod retriever;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use conversation::{ConversationLoop, GenerationSettings, LoopState, TurnOutcome};
pub use history::HistoryBuffer;
pub use ingest::{FileMetadata, IngestReport, Ingestor, TextSplitter};
pub use llm::LlmClient;
pub use prompt::{CONVERSATIONAL_INSTRUCTIONS, PromptAssembler, STATELESS_INSTRUCTIONS};
pub use repl::Repl;
pub use retriever::Retriever;
