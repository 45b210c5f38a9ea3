//! PromptAssembler: system instructions + retrieved context + history + query.
//!
//! Retrieved chunk texts are joined in retrieval order, without deduplication
//! or re-ranking, and substituted into the instruction template at the
//! `{context}` placeholder. Nothing is truncated: an oversized prompt is the
//! model's to reject.

use issuespilot_core::{Error, Prompt, RetrievalResult, Turn};

/// Placeholder in the instruction template that receives the context block.
pub const CONTEXT_PLACEHOLDER: &str = "{context}";

/// Separator between chunk texts in the context block.
pub const CHUNK_SEPARATOR: &str = "\n\n";

/// Instructions for single-question mode.
pub const STATELESS_INSTRUCTIONS: &str = "You are an assistant for network troubleshooting tasks. \
Use the following pieces of retrieved context to answer the question. \
If you don't know the answer, say that you don't know. \
The user is networking knowledgeable.\n\n\
Retrieved Context:\n{context}";

/// Instructions for multi-turn mode; asks the model to resolve references
/// against the conversation history.
pub const CONVERSATIONAL_INSTRUCTIONS: &str = "You are an assistant for network troubleshooting tasks. \
Use the following pieces of retrieved context to answer the question. \
Consider the conversation history when answering follow-up questions. \
If the user refers to previous topics (like 'that', 'it', 'those steps'), \
use the chat history to understand what they're referring to. \
If you don't know the answer, say that you don't know. \
The user is networking knowledgeable.\n\n\
Retrieved Context:\n{context}";

/// Builds one [`Prompt`] per turn from a fixed instruction template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PromptAssembler {
    template: String,
}

impl PromptAssembler {
    /// Use a custom instruction template. It must contain `{context}`.
    pub fn new(template: impl Into<String>) -> Result<Self, Error> {
        let template = template.into();
        if !template.contains(CONTEXT_PLACEHOLDER) {
            return Err(Error::config(format!(
                "prompt template has no {CONTEXT_PLACEHOLDER} placeholder"
            )));
        }
        Ok(Self { template })
    }

    pub fn stateless() -> Self {
        Self {
            template: STATELESS_INSTRUCTIONS.into(),
        }
    }

    pub fn conversational() -> Self {
        Self {
            template: CONVERSATIONAL_INSTRUCTIONS.into(),
        }
    }

    pub fn template(&self) -> &str {
        &self.template
    }

    /// Join chunk texts in retrieval order.
    pub fn render_context(context: &RetrievalResult) -> String {
        context
            .chunks()
            .map(|c| c.text.as_str())
            .collect::<Vec<_>>()
            .join(CHUNK_SEPARATOR)
    }

    /// Assemble the prompt for one turn. Pure: same inputs, same prompt.
    ///
    /// Stateless deployments pass an empty `history`.
    pub fn build(&self, context: &RetrievalResult, history: &[Turn], query: &str) -> Prompt {
        let rendered = Self::render_context(context);

        Prompt {
            system_instructions: self.template.replace(CONTEXT_PLACEHOLDER, &rendered),
            context: context.chunks().cloned().collect(),
            history: history.to_vec(),
            query: query.to_string(),
        }
    }
}
