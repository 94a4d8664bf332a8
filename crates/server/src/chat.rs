use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use bizassist_agent::{ActionRouter, InvokerFactory};
use bizassist_core::{ApiKey, ChatBody, ChatRequest, ChatResponse, Collection};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{ApiError, ValidatedJson};

pub const API_KEY_HEADER: &str = "x-api-key";
const QUESTION_PREVIEW_CHARS: usize = 100;

#[derive(Clone)]
pub struct ChatState {
    pub invokers: Arc<dyn InvokerFactory>,
    /// Whether 500 responses may carry the underlying message.
    pub expose_internal_errors: bool,
}

pub async fn chat(
    State(state): State<ChatState>,
    headers: HeaderMap,
    ValidatedJson(body): ValidatedJson<ChatBody>,
) -> Result<Json<ChatResponse>, ApiError> {
    let correlation_id = format!("chat-{}", Uuid::new_v4());
    let raw_key = headers.get(API_KEY_HEADER).and_then(|value| value.to_str().ok());
    log_request(&correlation_id, &body, raw_key.is_some());

    let api_key = ApiKey::parse(raw_key).map_err(|error| {
        warn!(
            event_name = "chat.request.rejected",
            correlation_id = %correlation_id,
            reason_code = error.reason_code(),
            "chat request rejected"
        );
        ApiError::from_chat(error, state.expose_internal_errors)
    })?;

    let router = ActionRouter::new(state.invokers.invoker_for(api_key.clone()));
    let response = router
        .route(ChatRequest::from_body(body, api_key), &correlation_id)
        .await
        .map_err(|error| ApiError::from_chat(error, state.expose_internal_errors))?;

    info!(
        event_name = "chat.request.completed",
        correlation_id = %correlation_id,
        answer_only = response.is_answer_only(),
        "chat request completed"
    );
    Ok(Json(response))
}

fn log_request(correlation_id: &str, body: &ChatBody, has_api_key: bool) {
    let question: String = body.question.chars().take(QUESTION_PREVIEW_CHARS).collect();
    let context = &body.context;
    info!(
        event_name = "chat.request.received",
        correlation_id,
        question = %question,
        companies = context.len_of(Collection::Companies),
        employees = context.len_of(Collection::Employees),
        tasks = context.len_of(Collection::Tasks),
        sales = context.len_of(Collection::Sales),
        appointments = context.len_of(Collection::Appointments),
        user_role = context.user.role.map(|role| role.as_str()).unwrap_or("unknown"),
        user_department = context.user.department.map(|dept| dept.as_str()).unwrap_or("unknown"),
        has_api_key,
        action = body.action.map(|action| action.as_str()),
        entity = body.entity.map(|entity| entity.as_str()),
        "chat request received"
    );
}
