//! `@action-type` command recognition.
//!
//! A question such as `@create-task assign me to write the report` names an
//! action and an entity in its first token. Anything that does not start with
//! `@` is passed through untouched.

use crate::domain::chat::{ActionKind, EntityKind};
use crate::errors::ChatError;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ParsedCommand {
    pub action: Option<ActionKind>,
    pub entity: Option<EntityKind>,
    /// The question with the command token removed, or the original text.
    pub question: String,
}

/// True when the trimmed question opens with an `@` command marker.
pub fn is_command(question: &str) -> bool {
    question.trim_start().starts_with('@')
}

pub fn parse_command(question: &str) -> Result<ParsedCommand, ChatError> {
    let trimmed = question.trim();
    let Some(rest) = trimmed.strip_prefix('@') else {
        return Ok(ParsedCommand { action: None, entity: None, question: question.to_string() });
    };

    let command = rest.split(char::is_whitespace).next().unwrap_or_default();
    let segments = command.split('-').collect::<Vec<_>>();
    let [action, entity] = segments.as_slice() else {
        return Err(ChatError::MalformedCommand { command: command.to_string() });
    };

    match (ActionKind::parse(action), EntityKind::parse(entity)) {
        (Some(action), Some(entity)) => Ok(ParsedCommand {
            action: Some(action),
            entity: Some(entity),
            question: rest[command.len()..].trim().to_string(),
        }),
        _ => Err(ChatError::InvalidCommandTarget { command: command.to_string() }),
    }
}
