//! ConversationLoop: one turn at a time: retrieve, assemble, generate, remember.
//!
//! # States
//!
//! ```text
//! AwaitingInput ──non-empty──▶ Processing ──ok / err──▶ AwaitingInput
//!       │
//!       └──blank input──▶ Terminated
//! ```
//!
//! The loop itself never retries. A failed turn leaves history untouched and
//! the loop ready for the next input.

use issuespilot_core::Error;
use tracing::{info, warn};

use crate::history::HistoryBuffer;
use crate::llm::LlmClient;
use crate::prompt::PromptAssembler;
use crate::retriever::Retriever;

/// Printed when the user ends the session.
pub const FAREWELL: &str = "IssuesPilot. Goodbye!";

/// Where the loop is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoopState {
    AwaitingInput,
    Processing,
    Terminated,
}

/// Per-turn retrieval and sampling parameters.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GenerationSettings {
    /// Chunks retrieved per query.
    pub k: usize,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl Default for GenerationSettings {
    fn default() -> Self {
        Self {
            k: 8,
            temperature: 1.0,
            max_tokens: 1024,
        }
    }
}

/// What one call to [`ConversationLoop::handle_input`] produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TurnOutcome {
    /// The model's answer to a query.
    Answer(String),
    /// The session ended; carries the farewell text.
    Farewell(String),
}

/// Drives a single conversation.
///
/// Stateless mode has no history; conversational mode threads a
/// [`HistoryBuffer`] through every turn and owns it exclusively.
pub struct ConversationLoop {
    retriever: Retriever,
    assembler: PromptAssembler,
    llm: LlmClient,
    history: Option<HistoryBuffer>,
    settings: GenerationSettings,
    state: LoopState,
}

impl ConversationLoop {
    /// Single-question mode: every query stands alone.
    pub fn stateless(retriever: Retriever, llm: LlmClient, settings: GenerationSettings) -> Self {
        Self {
            retriever,
            assembler: PromptAssembler::stateless(),
            llm,
            history: None,
            settings,
            state: LoopState::AwaitingInput,
        }
    }

    /// Multi-turn mode with history capped at `max_turns` entries.
    pub fn conversational(
        retriever: Retriever,
        llm: LlmClient,
        settings: GenerationSettings,
        max_turns: usize,
    ) -> Self {
        Self {
            retriever,
            assembler: PromptAssembler::conversational(),
            llm,
            history: Some(HistoryBuffer::new(max_turns)),
            settings,
            state: LoopState::AwaitingInput,
        }
    }

    /// Replace the instruction template.
    pub fn with_assembler(mut self, assembler: PromptAssembler) -> Self {
        self.assembler = assembler;
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn is_terminated(&self) -> bool {
        self.state == LoopState::Terminated
    }

    /// `None` in stateless mode.
    pub fn history(&self) -> Option<&HistoryBuffer> {
        self.history.as_ref()
    }

    pub fn settings(&self) -> GenerationSettings {
        self.settings
    }

    /// Process one line of user input.
    ///
    /// Blank or whitespace-only input terminates the loop without touching
    /// the retriever or the model. Otherwise the trimmed query is answered
    /// and, in conversational mode, the exchange is appended to history.
    pub async fn handle_input(&mut self, input: &str) -> Result<TurnOutcome, Error> {
        if self.state == LoopState::Terminated {
            return Err(Error::Internal("conversation has already ended".into()));
        }

        let query = input.trim();
        if query.is_empty() {
            self.state = LoopState::Terminated;
            info!("Conversation ended by user");
            return Ok(TurnOutcome::Farewell(FAREWELL.to_string()));
        }

        self.state = LoopState::Processing;
        let result = self.process(query).await;
        self.state = LoopState::AwaitingInput;

        match result {
            Ok(answer) => {
                if let Some(history) = self.history.as_mut() {
                    history.append_exchange(query, answer.as_str());
                }
                Ok(TurnOutcome::Answer(answer))
            }
            Err(e) => {
                warn!(error = %e, "Turn failed; history unchanged");
                Err(e)
            }
        }
    }

    async fn process(&self, query: &str) -> Result<String, Error> {
        let context = self.retriever.retrieve(query, self.settings.k).await?;

        let history = self
            .history
            .as_ref()
            .map(HistoryBuffer::turns)
            .unwrap_or_default();
        let prompt = self.assembler.build(&context, &history, query);

        let answer = self
            .llm
            .generate(&prompt, self.settings.temperature, self.settings.max_tokens)
            .await?;

        info!(
            chunks = context.len(),
            history_turns = history.len(),
            answer_len = answer.len(),
            "Turn complete"
        );

        Ok(answer)
    }
}
