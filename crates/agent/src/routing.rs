//! Deterministic routing table. Decides, before any model call, which
//! prompt a request needs or which refusal it gets.

use bizassist_core::{is_command, parse_command, ActionKind, ChatError, EntityKind, Mismatch};

use crate::prompts::Prompt;

/// What a validated `(action, type)` pair turns into.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Dispatch {
    /// A dedicated create prompt producing a typed draft.
    Create(Prompt),
    /// Read/update/delete are answered conversationally.
    Converse,
    Unsupported,
}

pub fn dispatch(action: ActionKind, entity: EntityKind) -> Dispatch {
    use ActionKind::{Create, Delete, Read, Update};
    use EntityKind::{Appointment, Company, Sale, Task, User};

    match (action, entity) {
        (Create, Appointment) => Dispatch::Create(Prompt::CreateAppointment),
        (Create, Task) => Dispatch::Create(Prompt::CreateTask),
        (Create, Sale) => Dispatch::Create(Prompt::CreateSale),
        (Create, Company) => Dispatch::Create(Prompt::CreateCompany),
        (Read | Update | Delete, Appointment | Task | Sale | Company) => Dispatch::Converse,
        (_, User) => Dispatch::Unsupported,
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RouteDecision {
    /// No action requested: filter the context and answer conversationally.
    GeneralQuestion { question: String },
    /// A command with a supported pair. `prompt` produces the final answer.
    Action { action: ActionKind, entity: EntityKind, question: String, prompt: Prompt },
    /// Answered without calling the model.
    Refuse(ChatError),
}

impl RouteDecision {
    pub fn label(&self) -> &'static str {
        match self {
            Self::GeneralQuestion { .. } => "general_question",
            Self::Action { .. } => "action",
            Self::Refuse(_) => "refuse",
        }
    }
}

/// Classifies a question and an optional body-supplied pair.
///
/// The `@` command is only parsed when the body names neither action nor
/// type; a body pair always wins over the question text.
pub fn decide(
    question: &str,
    action: Option<ActionKind>,
    entity: Option<EntityKind>,
) -> RouteDecision {
    let command_marker = is_command(question);
    let mut question = question.to_string();
    let (mut action, mut entity) = (action, entity);

    if command_marker && action.is_none() && entity.is_none() {
        match parse_command(&question) {
            Ok(parsed) => {
                action = parsed.action;
                entity = parsed.entity;
                question = parsed.question;
            }
            Err(error) => return RouteDecision::Refuse(error),
        }
    }

    match (action, entity) {
        (None, None) => RouteDecision::GeneralQuestion { question },
        (Some(action), Some(entity)) if !command_marker => RouteDecision::Refuse(
            ChatError::ActionTypeMismatch(Mismatch::MissingCommandMarker { action, entity }),
        ),
        (Some(action), Some(entity)) => match dispatch(action, entity) {
            Dispatch::Create(prompt) => RouteDecision::Action { action, entity, question, prompt },
            Dispatch::Converse => RouteDecision::Action {
                action,
                entity,
                question,
                prompt: Prompt::GeneralQuestion,
            },
            Dispatch::Unsupported => {
                RouteDecision::Refuse(ChatError::UnsupportedOperation { action, entity })
            }
        },
        _ => RouteDecision::Refuse(ChatError::ActionTypeMismatch(Mismatch::IncompletePair)),
    }
}
