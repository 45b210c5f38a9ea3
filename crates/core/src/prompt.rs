//! The structured model input for one turn.

use serde::{Deserialize, Serialize};

use crate::chunk::Chunk;
use crate::message::{Message, Turn};

/// Instructions, retrieved context, prior turns and the new query.
///
/// Assembled fresh per turn and discarded after use. `system_instructions`
/// already has the context block substituted in; `context` keeps the chunks
/// themselves for logging and inspection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Prompt {
    pub system_instructions: String,
    pub context: Vec<Chunk>,
    #[serde(default)]
    pub history: Vec<Turn>,
    pub query: String,
}

impl Prompt {
    /// Flatten into provider messages: system, then history in order, then the query.
    pub fn to_messages(&self) -> Vec<Message> {
        let mut messages = Vec::with_capacity(self.history.len() + 2);
        messages.push(Message::system(&self.system_instructions));
        messages.extend(self.history.iter().map(Message::from));
        messages.push(Message::user(&self.query));
        messages
    }
}
