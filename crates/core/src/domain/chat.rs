use std::fmt;

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::context::ContextBundle;
use crate::errors::ChatError;

/// Shortest accepted `x-api-key`, measured after trimming.
pub const MIN_API_KEY_LEN: usize = 20;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionKind {
    Create,
    Read,
    Update,
    Delete,
}

impl ActionKind {
    pub const ALL: [Self; 4] = [Self::Create, Self::Read, Self::Update, Self::Delete];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Read => "read",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Exact, case-sensitive lookup used by the command parser.
    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == raw)
    }
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Appointment,
    Task,
    User,
    Sale,
    Company,
}

impl EntityKind {
    pub const ALL: [Self; 5] =
        [Self::Appointment, Self::Task, Self::User, Self::Sale, Self::Company];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Appointment => "appointment",
            Self::Task => "task",
            Self::User => "user",
            Self::Sale => "sale",
            Self::Company => "company",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == raw)
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Caller-supplied model API key. Only ever printed as `[REDACTED]`.
#[derive(Clone)]
pub struct ApiKey(SecretString);

impl ApiKey {
    pub fn parse(raw: Option<&str>) -> Result<Self, ChatError> {
        let trimmed = raw.map(str::trim).unwrap_or_default();
        if trimmed.chars().count() < MIN_API_KEY_LEN {
            return Err(ChatError::InvalidCredentials);
        }
        Ok(Self(SecretString::from(trimmed.to_string())))
    }

    pub fn expose(&self) -> &str {
        self.0.expose_secret()
    }
}

impl fmt::Debug for ApiKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("ApiKey([REDACTED])")
    }
}

/// JSON body of `POST /ai/chat`. The API key travels in a header, not here.
#[derive(Clone, Debug, PartialEq, Deserialize, Serialize)]
pub struct ChatBody {
    pub question: String,
    pub context: ContextBundle,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<ActionKind>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub entity: Option<EntityKind>,
}

#[derive(Clone, Debug)]
pub struct ChatRequest {
    pub question: String,
    pub context: ContextBundle,
    pub action: Option<ActionKind>,
    pub entity: Option<EntityKind>,
    pub api_key: ApiKey,
}

impl ChatRequest {
    pub fn from_body(body: ChatBody, api_key: ApiKey) -> Self {
        Self {
            question: body.question,
            context: body.context,
            action: body.action,
            entity: body.entity,
            api_key,
        }
    }
}

/// Uniform reply envelope. Absent members are left out of the JSON body.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct ChatResponse {
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub entity: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

impl ChatResponse {
    pub fn answer_only(answer: impl Into<String>) -> Self {
        Self { answer: answer.into(), ..Self::default() }
    }

    pub fn is_answer_only(&self) -> bool {
        self.action.is_none() && self.entity.is_none() && self.data.is_none()
    }
}
