//! Line-oriented REPL over any async reader/writer pair.
//!
//! The binary wires it to stdin/stdout/stderr; tests use in-memory buffers.

use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, Lines};

use crate::conversation::{ConversationLoop, TurnOutcome};

pub const GREETING: &str = "Hi, I am your IssuesPilot! Enter your query or press Enter to end.";
pub const INPUT_PROMPT: &str = "Your input: ";
pub const ANSWER_PREFIX: &str = "IssuesPilot: ";

/// Reads one query per line, prints one answer per turn.
///
/// Answers go to `out`; turn failures go to `err` and the session continues.
pub struct Repl<R, W, E> {
    lines: Lines<R>,
    out: W,
    err: E,
}

impl<R, W, E> Repl<R, W, E>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
    E: AsyncWrite + Unpin,
{
    pub fn new(input: R, out: W, err: E) -> Self {
        Self {
            lines: input.lines(),
            out,
            err,
        }
    }

    /// Run until the conversation terminates or input is exhausted.
    ///
    /// Returns the number of answered turns.
    pub async fn run(&mut self, conversation: &mut ConversationLoop) -> std::io::Result<usize> {
        self.write_out(&format!("\n{GREETING}\n\n")).await?;
        let mut answered = 0;

        while !conversation.is_terminated() {
            self.write_out(INPUT_PROMPT).await?;

            // End of input behaves like an empty line.
            let line = self.lines.next_line().await?.unwrap_or_default();

            match conversation.handle_input(&line).await {
                Ok(TurnOutcome::Answer(answer)) => {
                    answered += 1;
                    self.write_out(&format!("{ANSWER_PREFIX}{answer}\n\n"))
                        .await?;
                }
                Ok(TurnOutcome::Farewell(farewell)) => {
                    self.write_out(&format!("\n{farewell}\n\n")).await?;
                }
                Err(e) => {
                    self.err
                        .write_all(format!("[Error] {e}\n").as_bytes())
                        .await?;
                    self.err.flush().await?;
                }
            }
        }

        Ok(answered)
    }

    async fn write_out(&mut self, text: &str) -> std::io::Result<()> {
        self.out.write_all(text.as_bytes()).await?;
        self.out.flush().await
    }

    /// Consume the REPL, returning its writers.
    pub fn into_writers(self) -> (W, E) {
        (self.out, self.err)
    }
}
