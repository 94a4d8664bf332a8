//! HTTP error envelope shared by every route.
//!
//! Every failure leaves the service as
//! `{statusCode, error, message[, details]}` with the matching status code.

use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request};
use axum::http::header::RETRY_AFTER;
use axum::http::{HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use bizassist_core::ChatError;
use serde::de::DeserializeOwned;
use serde::Serialize;

pub const VALIDATION_FAILED: &str = "Validation failed.";
pub const INTERNAL_SERVER_ERROR: &str = "Internal Server Error";
/// Path reported when the body as a whole is unusable.
pub const BODY_PATH: &str = "body";
const DATA_ERROR_PREFIX: &str = "Failed to deserialize the JSON body into the target type: ";

/// One validation failure: the dotted field path and what was wrong there.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ValidationDetail {
    pub path: String,
    pub message: String,
}

impl ValidationDetail {
    pub fn new(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self { path: path.into(), message: message.into() }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorBody {
    pub status_code: u16,
    pub error: &'static str,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Vec<ValidationDetail>>,
}

#[derive(Debug)]
pub enum ApiError {
    /// 400: the body failed JSON or schema validation.
    Validation(Vec<ValidationDetail>),
    /// 401: missing or short `x-api-key`.
    Unauthorized(String),
    PayloadTooLarge(String),
    /// 429 with a `retry-after` header in seconds.
    RateLimited { retry_after_secs: u64 },
    /// 500. `expose` is false outside development so the cause stays in logs.
    Internal { message: String, expose: bool },
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Maps a chat failure that the router could not turn into an answer.
    pub fn from_chat(error: ChatError, expose_internal: bool) -> Self {
        match error {
            ChatError::InvalidCredentials => Self::Unauthorized(error.user_message()),
            other => Self::Internal { message: other.to_string(), expose: expose_internal },
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        let error = status.canonical_reason().unwrap_or("Error");
        let mut retry_after = None;

        let (message, details) = match self {
            Self::Validation(details) => (VALIDATION_FAILED.to_string(), Some(details)),
            Self::Unauthorized(message) | Self::PayloadTooLarge(message) => (message, None),
            Self::RateLimited { retry_after_secs } => {
                retry_after = Some(retry_after_secs);
                (format!("Rate limit exceeded, retry in {retry_after_secs} seconds"), None)
            }
            Self::Internal { message, expose } => {
                (if expose { message } else { INTERNAL_SERVER_ERROR.to_string() }, None)
            }
        };

        let body = ErrorBody { status_code: status.as_u16(), error, message, details };
        let mut response = (status, Json(body)).into_response();
        if let Some(seconds) = retry_after {
            response.headers_mut().insert(RETRY_AFTER, HeaderValue::from(seconds));
        }
        response
    }
}

/// `Json<T>` whose rejections use the service envelope instead of plain text.
pub struct ValidatedJson<T>(pub T);

impl<S, T> FromRequest<S> for ValidatedJson<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(rejection_to_error(rejection)),
        }
    }
}

fn rejection_to_error(rejection: JsonRejection) -> ApiError {
    if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
        return ApiError::PayloadTooLarge(rejection.body_text());
    }
    let detail = match &rejection {
        JsonRejection::JsonDataError(error) => data_error_detail(&error.body_text()),
        other => ValidationDetail::new(BODY_PATH, other.body_text()),
    };
    ApiError::Validation(vec![detail])
}

/// Splits a typed-deserialization failure such as
/// "context.tasks[0]: missing field `title` at line 1 column 80" into the
/// offending path and the bare message.
fn data_error_detail(text: &str) -> ValidationDetail {
    let text = text.strip_prefix(DATA_ERROR_PREFIX).unwrap_or(text);
    let text = strip_position(text);

    let (parent, message) = match text.split_once(": ") {
        Some((path, message)) if !path.is_empty() && !path.contains(char::is_whitespace) => {
            (path, message)
        }
        _ => ("", text),
    };

    let missing = message
        .strip_prefix("missing field `")
        .and_then(|rest| rest.strip_suffix('`'));
    let path = match (parent, missing) {
        ("", Some(field)) => field.to_string(),
        (parent, Some(field)) => format!("{parent}.{field}"),
        ("", None) => BODY_PATH.to_string(),
        (parent, None) => parent.to_string(),
    };
    ValidationDetail::new(path, message)
}

fn strip_position(text: &str) -> &str {
    let Some(index) = text.rfind(" at line ") else {
        return text;
    };
    let position = &text[index + " at line ".len()..];
    let is_position = position.split_once(" column ").is_some_and(|(line, column)| {
        line.chars().all(|c| c.is_ascii_digit()) && column.chars().all(|c| c.is_ascii_digit())
    });
    if is_position {
        &text[..index]
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use axum::body::{to_bytes, Body};
    use axum::extract::FromRequest;
    use axum::http::header::RETRY_AFTER;
    use axum::http::{Request, StatusCode};
    use axum::response::IntoResponse;
    use bizassist_core::ChatError;
    use serde::Deserialize;
    use serde_json::{json, Value};

    use super::{ApiError, ValidatedJson, ValidationDetail};

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Order {
        id: String,
        customer: Customer,
        lines: Vec<Line>,
    }

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Customer {
        name: String,
    }

    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct Line {
        quantity: u32,
    }

    async fn details_for(content_type: &str, body: &str) -> Vec<ValidationDetail> {
        let request = Request::post("/")
            .header("content-type", content_type)
            .body(Body::from(body.to_string()))
            .expect("request");
        match ValidatedJson::<Order>::from_request(request, &()).await {
            Ok(_) => panic!("body should be rejected"),
            Err(ApiError::Validation(details)) => details,
            Err(other) => panic!("expected a validation error, got {other:?}"),
        }
    }

    async fn render(error: ApiError) -> (StatusCode, Option<String>, Value) {
        let response = error.into_response();
        let status = response.status();
        let retry_after = response
            .headers()
            .get(RETRY_AFTER)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        (status, retry_after, serde_json::from_slice(&bytes).expect("json body"))
    }

    #[tokio::test]
    async fn validation_errors_carry_details() {
        let (status, _, body) = render(ApiError::Validation(vec![ValidationDetail::new(
            "question",
            "missing field `question`",
        )]))
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(
            body,
            json!({
                "statusCode": 400,
                "error": "Bad Request",
                "message": "Validation failed.",
                "details": [{ "path": "question", "message": "missing field `question`" }]
            })
        );
    }

    #[tokio::test]
    async fn missing_fields_are_reported_by_path() {
        let top_level =
            details_for("application/json", r#"{"customer":{"name":"a"},"lines":[]}"#).await;
        assert_eq!(top_level, vec![ValidationDetail::new("id", "missing field `id`")]);

        let nested =
            details_for("application/json", r#"{"id":"o1","customer":{},"lines":[]}"#).await;
        assert_eq!(nested, vec![ValidationDetail::new("customer.name", "missing field `name`")]);
    }

    #[tokio::test]
    async fn wrong_types_point_at_the_offending_element() {
        let details = details_for(
            "application/json",
            r#"{"id":"o1","customer":{"name":"a"},"lines":[{"quantity":"many"}]}"#,
        )
        .await;

        assert_eq!(details.len(), 1);
        assert_eq!(details[0].path, "lines[0].quantity");
        assert!(details[0].message.starts_with("invalid type: string"));
        assert!(!details[0].message.contains("at line"));
    }

    #[tokio::test]
    async fn unusable_bodies_are_reported_against_the_body() {
        let syntax = details_for("application/json", "{\"id\":").await;
        assert_eq!(syntax.len(), 1);
        assert_eq!(syntax[0].path, "body");

        let wrong_type = details_for("text/plain", r#"{"id":"o1"}"#).await;
        assert_eq!(wrong_type[0].path, "body");
        assert!(wrong_type[0].message.contains("Content-Type"));
    }

    #[tokio::test]
    async fn invalid_credentials_become_unauthorized() {
        let (status, _, body) =
            render(ApiError::from_chat(ChatError::InvalidCredentials, true)).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["statusCode"], json!(401));
        assert_eq!(body["error"], json!("Unauthorized"));
        assert_eq!(
            body["message"],
            json!("Invalid API key. Please provide a valid Google Gemini API key.")
        );
        assert!(body.get("details").is_none());
    }

    #[tokio::test]
    async fn rate_limited_sets_retry_after() {
        let (status, retry_after, body) =
            render(ApiError::RateLimited { retry_after_secs: 42 }).await;

        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(retry_after.as_deref(), Some("42"));
        assert_eq!(body["error"], json!("Too Many Requests"));
    }

    #[tokio::test]
    async fn internal_message_is_hidden_unless_exposed() {
        let upstream = ChatError::UpstreamGeneration("quota exhausted".to_string());

        let (_, _, hidden) = render(ApiError::from_chat(upstream.clone(), false)).await;
        assert_eq!(hidden["message"], json!("Internal Server Error"));

        let (status, _, shown) = render(ApiError::from_chat(upstream, true)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(shown["message"].as_str().unwrap_or_default().contains("quota exhausted"));
    }
}
