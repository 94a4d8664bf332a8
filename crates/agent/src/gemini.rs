//! Prompt invoker backed by the Gemini `generateContent` REST endpoint.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bizassist_core::config::LlmConfig;
use bizassist_core::ApiKey;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::llm::{GenerationError, InvokerFactory, PromptInvoker};
use crate::prompts::{Prompt, PromptCatalog, PromptInput};

const MAX_ERROR_BODY_CHARS: usize = 512;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Serialize, Deserialize)]
struct Content {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Serialize, Deserialize)]
struct Part {
    #[serde(default)]
    text: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    response_mime_type: &'static str,
    response_schema: Value,
}

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

fn request_body(prompt: Prompt, rendered: String) -> GenerateContentRequest {
    GenerateContentRequest {
        contents: vec![Content {
            role: Some("user".to_string()),
            parts: vec![Part { text: rendered }],
        }],
        generation_config: GenerationConfig {
            response_mime_type: "application/json",
            response_schema: prompt.output_schema(),
        },
    }
}

/// Joins the first candidate's text parts and parses them as JSON.
fn extract_output(prompt: Prompt, raw: &str) -> Result<Value, GenerationError> {
    let response: GenerateContentResponse =
        serde_json::from_str(raw).map_err(|error| GenerationError::MalformedOutput {
            prompt: prompt.name(),
            reason: format!("unreadable response envelope: {error}"),
        })?;

    let text = response
        .candidates
        .into_iter()
        .next()
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().map(|part| part.text).collect::<String>())
        .filter(|text| !text.trim().is_empty())
        .ok_or(GenerationError::EmptyResponse)?;

    serde_json::from_str(&text).map_err(|error| GenerationError::MalformedOutput {
        prompt: prompt.name(),
        reason: error.to_string(),
    })
}

fn truncate(body: &str) -> String {
    body.chars().take(MAX_ERROR_BODY_CHARS).collect()
}

pub struct GeminiInvoker {
    client: reqwest::Client,
    endpoint: String,
    api_key: ApiKey,
    catalog: Arc<PromptCatalog>,
    timeout_secs: u64,
}

#[async_trait]
impl PromptInvoker for GeminiInvoker {
    async fn invoke(&self, prompt: Prompt, input: &PromptInput) -> Result<Value, GenerationError> {
        let rendered = self.catalog.render(prompt, input)?;
        debug!(
            event_name = "llm.gemini.request",
            prompt = prompt.name(),
            prompt_chars = rendered.len(),
            "sending generateContent request"
        );

        let response = self
            .client
            .post(&self.endpoint)
            .header("x-goog-api-key", self.api_key.expose())
            .json(&request_body(prompt, rendered))
            .send()
            .await
            .map_err(|error| self.transport_error(error))?;

        let status = response.status();
        let body = response.text().await.map_err(|error| self.transport_error(error))?;
        if !status.is_success() {
            return Err(GenerationError::Status { status: status.as_u16(), body: truncate(&body) });
        }

        extract_output(prompt, &body)
    }
}

impl GeminiInvoker {
    fn transport_error(&self, error: reqwest::Error) -> GenerationError {
        if error.is_timeout() {
            GenerationError::Timeout { timeout_secs: self.timeout_secs }
        } else {
            GenerationError::Transport(error.to_string())
        }
    }
}

/// Shares one connection pool and one template set across all requests.
#[derive(Clone)]
pub struct GeminiInvokerFactory {
    client: reqwest::Client,
    endpoint: String,
    catalog: Arc<PromptCatalog>,
    timeout_secs: u64,
}

impl GeminiInvokerFactory {
    pub fn from_config(config: &LlmConfig) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|error| GenerationError::Transport(error.to_string()))?;

        Ok(Self {
            client,
            endpoint: generate_content_url(&config.base_url, &config.model),
            catalog: Arc::new(PromptCatalog::new()?),
            timeout_secs: config.timeout_secs,
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl InvokerFactory for GeminiInvokerFactory {
    fn invoker_for(&self, api_key: ApiKey) -> Arc<dyn PromptInvoker> {
        Arc::new(GeminiInvoker {
            client: self.client.clone(),
            endpoint: self.endpoint.clone(),
            api_key,
            catalog: Arc::clone(&self.catalog),
            timeout_secs: self.timeout_secs,
        })
    }
}

pub fn generate_content_url(base_url: &str, model: &str) -> String {
    format!("{}/models/{model}:generateContent", base_url.trim_end_matches('/'))
}

#[cfg(test)]
mod tests {
    use bizassist_core::config::LlmConfig;
    use bizassist_core::{ApiKey, ContextBundle, UserProfile};
    use chrono::NaiveDate;
    use serde_json::json;

    use super::{extract_output, generate_content_url, request_body, GeminiInvokerFactory};
    use crate::llm::{GenerationError, InvokerFactory, PromptInvoker};
    use crate::prompts::{Prompt, PromptInput};

    #[test]
    fn endpoint_joins_base_and_model() {
        let base = "https://generativelanguage.googleapis.com/v1beta";

        assert_eq!(
            generate_content_url(&format!("{base}/"), "gemini-2.5-flash-lite"),
            format!("{base}/models/gemini-2.5-flash-lite:generateContent")
        );
    }

    #[test]
    fn request_asks_for_json_with_the_prompt_schema() {
        let body = serde_json::to_value(request_body(Prompt::CreateCompany, "hi".to_string()))
            .expect("encode");

        assert_eq!(body["contents"][0]["parts"][0]["text"], json!("hi"));
        assert_eq!(body["generationConfig"]["responseMimeType"], json!("application/json"));
        assert_eq!(
            body["generationConfig"]["responseSchema"],
            Prompt::CreateCompany.output_schema()
        );
    }

    #[test]
    fn first_candidate_text_is_parsed_as_json() {
        let raw = json!({
            "candidates": [
                {
                    "content": {
                        "role": "model",
                        "parts": [{ "text": "{\"answer\":" }, { "text": "\"hi\"}" }]
                    }
                },
                { "content": { "parts": [{ "text": "{\"answer\":\"ignored\"}" }] } }
            ]
        })
        .to_string();

        assert_eq!(extract_output(Prompt::GeneralQuestion, &raw), Ok(json!({ "answer": "hi" })));
    }

    #[test]
    fn missing_candidates_are_an_empty_response() {
        assert_eq!(
            extract_output(Prompt::GeneralQuestion, r#"{"candidates":[]}"#),
            Err(GenerationError::EmptyResponse)
        );
        let blocked = r#"{"promptFeedback":{"blockReason":"SAFETY"}}"#;
        assert_eq!(
            extract_output(Prompt::GeneralQuestion, blocked),
            Err(GenerationError::EmptyResponse)
        );
    }

    #[test]
    fn non_json_text_is_malformed_output() {
        let raw =
            json!({ "candidates": [{ "content": { "parts": [{ "text": "Sure! Here you go" }] } }] })
                .to_string();

        assert!(matches!(
            extract_output(Prompt::DetermineContext, &raw),
            Err(GenerationError::MalformedOutput { prompt: "determine_context", .. })
        ));
    }

    #[tokio::test]
    async fn unreachable_upstream_is_a_generation_error() {
        let factory = GeminiInvokerFactory::from_config(&LlmConfig {
            model: "gemini-2.5-flash-lite".to_string(),
            base_url: "http://127.0.0.1:9".to_string(),
            timeout_secs: 2,
        })
        .expect("factory");
        let api_key = ApiKey::parse(Some("AIzaSyExampleKey-0123456789")).expect("key");
        let invoker = factory.invoker_for(api_key);
        let input = PromptInput::new(
            "hello",
            ContextBundle::new(UserProfile::with_id("u1")),
            NaiveDate::from_ymd_opt(2025, 6, 3).unwrap_or_default(),
        );

        let result = invoker.invoke(Prompt::DetermineContext, &input).await;

        assert!(matches!(
            result,
            Err(GenerationError::Transport(_) | GenerationError::Timeout { .. })
        ));
    }
}
