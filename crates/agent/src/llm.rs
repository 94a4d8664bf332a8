use std::sync::Arc;

use async_trait::async_trait;
use bizassist_core::{ApiKey, ChatError};
use serde_json::Value;
use thiserror::Error;

use crate::prompts::{Prompt, PromptInput};

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum GenerationError {
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("upstream returned HTTP {status}: {body}")]
    Status { status: u16, body: String },
    #[error("upstream did not answer within {timeout_secs}s")]
    Timeout { timeout_secs: u64 },
    #[error("upstream returned no candidates")]
    EmptyResponse,
    #[error("`{prompt}` output did not match its schema: {reason}")]
    MalformedOutput { prompt: &'static str, reason: String },
    #[error("could not render prompt `{prompt}`: {reason}")]
    Template { prompt: &'static str, reason: String },
}

impl From<GenerationError> for ChatError {
    fn from(error: GenerationError) -> Self {
        ChatError::UpstreamGeneration(error.to_string())
    }
}

/// Executes one named prompt and returns the model's structured output.
#[async_trait]
pub trait PromptInvoker: Send + Sync {
    async fn invoke(&self, prompt: Prompt, input: &PromptInput) -> Result<Value, GenerationError>;
}

#[async_trait]
impl<T> PromptInvoker for Arc<T>
where
    T: PromptInvoker + ?Sized,
{
    async fn invoke(&self, prompt: Prompt, input: &PromptInput) -> Result<Value, GenerationError> {
        (**self).invoke(prompt, input).await
    }
}

/// Builds a request-scoped invoker bound to the caller's API key.
pub trait InvokerFactory: Send + Sync {
    fn invoker_for(&self, api_key: ApiKey) -> Arc<dyn PromptInvoker>;
}
