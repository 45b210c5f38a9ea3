//! `issuespilot query`: stateless questions, interactive or single-shot.

use issuespilot_agent::TurnOutcome;
use issuespilot_agent::repl::ANSWER_PREFIX;

use super::{CommandResult, ConfigSource, Mode};

pub async fn run(source: &ConfigSource, message: Option<String>) -> CommandResult {
    let config = source
        .load()
        .map_err(|e| format!("Failed to load config: {e}"))?;
    let mut conversation = super::build_conversation(&config, Mode::Stateless).await?;

    match message {
        Some(msg) => match conversation.handle_input(&msg).await? {
            TurnOutcome::Answer(answer) => println!("{ANSWER_PREFIX}{answer}"),
            TurnOutcome::Farewell(farewell) => println!("{farewell}"),
        },
        None => {
            super::run_repl(conversation).await?;
        }
    }

    Ok(())
}
