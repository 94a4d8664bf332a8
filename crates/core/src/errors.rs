use std::fmt;

use thiserror::Error;

use crate::domain::chat::{ActionKind, EntityKind};

/// How an `action`/`type` pair disagreed with the question text.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mismatch {
    /// Both were supplied but the question carries no `@` command.
    MissingCommandMarker { action: ActionKind, entity: EntityKind },
    /// Only one of the two was supplied.
    IncompletePair,
}

impl fmt::Display for Mismatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingCommandMarker { action, entity } => {
                write!(f, "{action}-{entity} supplied without an @ command")
            }
            Self::IncompletePair => f.write_str("only one of action/type supplied"),
        }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ChatError {
    #[error("invalid API key: at least 20 characters are required")]
    InvalidCredentials,
    #[error("malformed command `@{command}`")]
    MalformedCommand { command: String },
    #[error("unknown command target `@{command}`")]
    InvalidCommandTarget { command: String },
    #[error("action/type mismatch: {0}")]
    ActionTypeMismatch(Mismatch),
    #[error("unsupported operation `{action}-{entity}`")]
    UnsupportedOperation { action: ActionKind, entity: EntityKind },
    #[error("upstream generation failed: {0}")]
    UpstreamGeneration(String),
}

impl ChatError {
    /// Everything except a bad API key is answered with HTTP 200 and a message.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, Self::InvalidCredentials)
    }

    pub fn reason_code(&self) -> &'static str {
        match self {
            Self::InvalidCredentials => "invalid_credentials",
            Self::MalformedCommand { .. } => "malformed_command",
            Self::InvalidCommandTarget { .. } => "invalid_command_target",
            Self::ActionTypeMismatch(Mismatch::MissingCommandMarker { .. }) => {
                "action_without_command"
            }
            Self::ActionTypeMismatch(Mismatch::IncompletePair) => "partial_action_type",
            Self::UnsupportedOperation { .. } => "unsupported_operation",
            Self::UpstreamGeneration(_) => "upstream_generation",
        }
    }

    pub fn user_message(&self) -> String {
        match self {
            Self::InvalidCredentials => {
                "Invalid API key. Please provide a valid Google Gemini API key.".to_string()
            }
            Self::MalformedCommand { .. } => {
                "Invalid command format. Use @action-type, like @create-task.".to_string()
            }
            Self::InvalidCommandTarget { command } => format!(
                "Invalid command: @{command}. Valid commands are like @create-task, @read-appointment, etc."
            ),
            Self::ActionTypeMismatch(Mismatch::MissingCommandMarker { action, entity }) => {
                format!(
                    "To perform actions you need to use a valid tool mention like @{action}-{entity} ..."
                )
            }
            Self::ActionTypeMismatch(Mismatch::IncompletePair) => {
                "Invalid request: both action and type must be provided together.".to_string()
            }
            Self::UnsupportedOperation { action, entity } => {
                format!("Sorry, I don't know how to {action} {entity}s.")
            }
            Self::UpstreamGeneration(_) => {
                "Sorry, I encountered an error while processing your request.".to_string()
            }
        }
    }
}
