//! Bounded conversation memory.

use std::collections::VecDeque;

use issuespilot_core::Turn;

/// Default cap: five exchanges.
pub const DEFAULT_MAX_TURNS: usize = 10;

/// An ordered log of prior turns, capped at `max_turns` entries.
///
/// Appends happen one exchange at a time; when the cap is exceeded the
/// oldest turns are dropped first. Lives only as long as its conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct HistoryBuffer {
    turns: VecDeque<Turn>,
    max_turns: usize,
}

impl HistoryBuffer {
    pub fn new(max_turns: usize) -> Self {
        Self {
            turns: VecDeque::with_capacity(max_turns + 2),
            max_turns,
        }
    }

    /// Record a completed exchange, then enforce the cap.
    pub fn append_exchange(&mut self, query: impl Into<String>, answer: impl Into<String>) {
        self.turns.push_back(Turn::user(query));
        self.turns.push_back(Turn::assistant(answer));

        while self.turns.len() > self.max_turns {
            self.turns.pop_front();
        }
    }

    /// Snapshot of the current turns, oldest first.
    pub fn turns(&self) -> Vec<Turn> {
        self.turns.iter().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Turn> {
        self.turns.iter()
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_TURNS)
    }
}
