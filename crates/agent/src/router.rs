use bizassist_core::{
    filter_context, ActionKind, AppointmentDraft, ChatError, ChatRequest, ChatResponse,
    CompanyDraft, ContextBundle, DraftViolation, EntityKind, FilterCriteria, SaleDraft, TaskDraft,
};
use chrono::{NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::llm::{GenerationError, PromptInvoker};
use crate::prompts::{Prompt, PromptInput};
use crate::routing::{decide, RouteDecision};

pub const NO_ANSWER_FALLBACK: &str = "I'm sorry, I couldn't generate a response to your question.";

/// Envelope every answer prompt replies with. `data` is prompt specific.
#[derive(Debug, Deserialize)]
struct ModelReply<D> {
    #[serde(default)]
    answer: Option<String>,
    #[serde(default)]
    action: Option<String>,
    #[serde(default, rename = "type")]
    entity: Option<String>,
    data: Option<D>,
}

pub struct ActionRouter<I> {
    invoker: I,
    today: fn() -> NaiveDate,
}

impl<I> ActionRouter<I>
where
    I: PromptInvoker,
{
    pub fn new(invoker: I) -> Self {
        Self { invoker, today: || Utc::now().date_naive() }
    }

    pub fn with_clock(invoker: I, today: fn() -> NaiveDate) -> Self {
        Self { invoker, today }
    }

    /// Answers a chat request. Every recoverable failure becomes an
    /// answer-only response; only non-recoverable errors are returned.
    pub async fn route(
        &self,
        request: ChatRequest,
        correlation_id: &str,
    ) -> Result<ChatResponse, ChatError> {
        let decision = decide(&request.question, request.action, request.entity);
        info!(
            event_name = "chat.route.decided",
            correlation_id,
            route = decision.label(),
            "chat request routed"
        );

        let outcome = match decision {
            RouteDecision::Refuse(error) => Err(error),
            RouteDecision::GeneralQuestion { question } => {
                self.answer_general(question, request.context, correlation_id).await
            }
            RouteDecision::Action { action, entity, question, prompt } => {
                let target = (action, entity, prompt);
                self.answer_action(target, question, request.context, correlation_id).await
            }
        };

        match outcome {
            Ok(response) => Ok(response),
            Err(error) if error.is_recoverable() => {
                warn!(
                    event_name = "chat.route.recovered",
                    correlation_id,
                    reason_code = error.reason_code(),
                    error = %error,
                    "chat request answered with a fallback message"
                );
                Ok(ChatResponse::answer_only(error.user_message()))
            }
            Err(error) => Err(error),
        }
    }

    async fn answer_general(
        &self,
        question: String,
        context: ContextBundle,
        correlation_id: &str,
    ) -> Result<ChatResponse, ChatError> {
        let filtered = self.narrow_context(&question, &context, correlation_id).await?;

        info!(
            event_name = "chat.prompt.invoke",
            correlation_id,
            prompt = Prompt::GeneralQuestion.name(),
            "generating final response"
        );
        let input = PromptInput::new(question, filtered, (self.today)());
        let output = self.invoker.invoke(Prompt::GeneralQuestion, &input).await?;

        // General answers never carry an action payload.
        let answer = match output {
            Value::Null => None,
            other => parse_output::<ModelReply<Value>>(Prompt::GeneralQuestion, other)?.answer,
        };
        let answer = answer
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| NO_ANSWER_FALLBACK.to_string());
        Ok(ChatResponse::answer_only(answer))
    }

    async fn answer_action(
        &self,
        (action, entity, prompt): (ActionKind, EntityKind, Prompt),
        question: String,
        context: ContextBundle,
        correlation_id: &str,
    ) -> Result<ChatResponse, ChatError> {
        let filtered = self.narrow_context(&question, &context, correlation_id).await?;

        info!(
            event_name = "chat.prompt.invoke",
            correlation_id,
            prompt = prompt.name(),
            action = action.as_str(),
            entity = entity.as_str(),
            "generating final response"
        );
        let input = PromptInput::new(question, filtered, (self.today)());
        let output = self.invoker.invoke(prompt, &input).await?;

        let target = (action, entity);
        let response = match prompt {
            Prompt::CreateAppointment => {
                draft_response(prompt, output, target, AppointmentDraft::validate)?
            }
            Prompt::CreateTask => draft_response(prompt, output, target, TaskDraft::validate)?,
            Prompt::CreateSale => draft_response(prompt, output, target, SaleDraft::validate)?,
            Prompt::CreateCompany => {
                draft_response(prompt, output, target, CompanyDraft::validate)?
            }
            Prompt::GeneralQuestion | Prompt::DetermineContext => {
                let reply = parse_output::<ModelReply<Value>>(prompt, output)?;
                ChatResponse {
                    answer: reply.answer.unwrap_or_default(),
                    action: reply.action,
                    entity: reply.entity,
                    data: reply.data,
                }
            }
        };

        Ok(response)
    }

    /// First suspension point: ask the model which records it needs, then
    /// drop everything else from the context.
    async fn narrow_context(
        &self,
        question: &str,
        context: &ContextBundle,
        correlation_id: &str,
    ) -> Result<ContextBundle, ChatError> {
        info!(
            event_name = "chat.prompt.invoke",
            correlation_id,
            prompt = Prompt::DetermineContext.name(),
            "determining required context"
        );
        let input = PromptInput::new(
            question,
            ContextBundle::new(context.user.clone()),
            (self.today)(),
        );
        let output = self.invoker.invoke(Prompt::DetermineContext, &input).await?;
        let criteria = parse_output::<FilterCriteria>(Prompt::DetermineContext, output)?;

        Ok(filter_context(context, &criteria))
    }
}

fn parse_output<T>(prompt: Prompt, output: Value) -> Result<T, GenerationError>
where
    T: DeserializeOwned,
{
    serde_json::from_value(output).map_err(|error| GenerationError::MalformedOutput {
        prompt: prompt.name(),
        reason: error.to_string(),
    })
}

/// Decodes a create reply, validates its draft and fills in a missing
/// `action`/`type` from the routed pair.
fn draft_response<D>(
    prompt: Prompt,
    output: Value,
    (action, entity): (ActionKind, EntityKind),
    validate: fn(&D) -> Result<(), DraftViolation>,
) -> Result<ChatResponse, GenerationError>
where
    D: DeserializeOwned + Serialize,
{
    let reply = parse_output::<ModelReply<D>>(prompt, output)?;
    let malformed =
        |reason: String| GenerationError::MalformedOutput { prompt: prompt.name(), reason };

    let draft = reply.data.ok_or_else(|| malformed("missing `data`".to_string()))?;
    validate(&draft).map_err(|violation| malformed(violation.to_string()))?;
    let data = serde_json::to_value(&draft).map_err(|error| malformed(error.to_string()))?;

    Ok(ChatResponse {
        answer: reply.answer.unwrap_or_default(),
        action: reply.action.or_else(|| Some(action.to_string())),
        entity: reply.entity.or_else(|| Some(entity.to_string())),
        data: Some(data),
    })
}
