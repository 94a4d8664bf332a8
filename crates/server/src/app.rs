//! HTTP surface: the `/ai` routes plus the cross-cutting layers around them.

use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::http::header::{CONTENT_TYPE, InvalidHeaderValue};
use axum::http::{HeaderName, HeaderValue, Method};
use axum::routing::{get, post};
use axum::{middleware, Router};
use bizassist_agent::InvokerFactory;
use bizassist_core::config::ServerConfig;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::chat::{self, ChatState, API_KEY_HEADER};
use crate::health;
use crate::rate_limit::{self, FixedWindowLimiter};

pub const MAX_BODY_BYTES: usize = 1024 * 1024;

pub fn router(
    server: &ServerConfig,
    invokers: Arc<dyn InvokerFactory>,
) -> Result<Router, InvalidHeaderValue> {
    let state = ChatState {
        invokers,
        expose_internal_errors: !server.environment.is_production(),
    };
    let limiter = FixedWindowLimiter::per_minute(server.rate_limit_per_minute)
        .trusting_forwarded_for(server.trust_forwarded_for);

    let ai = Router::new()
        .route("/chat", post(chat::chat))
        .route("/health", get(health::health))
        .with_state(state)
        .route_layer(middleware::from_fn_with_state(limiter, rate_limit::enforce));

    Ok(Router::new()
        .nest(&server.ai_base_path(), ai)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors(&server.cors_origin)?)
        .layer(TraceLayer::new_for_http()))
}

fn cors(origin: &str) -> Result<CorsLayer, InvalidHeaderValue> {
    Ok(CorsLayer::new()
        .allow_origin(HeaderValue::from_str(origin)?)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE, HeaderName::from_static(API_KEY_HEADER)]))
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    use async_trait::async_trait;
    use axum::body::{to_bytes, Body};
    use axum::extract::ConnectInfo;
    use axum::http::{Request, StatusCode};
    use axum::Router;
    use bizassist_agent::{GenerationError, InvokerFactory, Prompt, PromptInput, PromptInvoker};
    use bizassist_core::config::{AppEnvironment, ServerConfig};
    use bizassist_core::ApiKey;
    use serde_json::{json, Value};
    use tower::ServiceExt;

    use super::{router, MAX_BODY_BYTES};

    const KEY: &str = "AIzaSyExampleKey-0123456789";

    /// Returns empty criteria for context selection and a fixed answer otherwise.
    #[derive(Default)]
    struct CountingInvoker {
        calls: AtomicUsize,
    }

    #[async_trait]
    impl PromptInvoker for CountingInvoker {
        async fn invoke(
            &self,
            prompt: Prompt,
            _input: &PromptInput,
        ) -> Result<Value, GenerationError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(match prompt {
                Prompt::DetermineContext => json!({}),
                _ => json!({ "answer": "Three tasks are overdue." }),
            })
        }
    }

    struct SharedFactory(Arc<CountingInvoker>);

    impl InvokerFactory for SharedFactory {
        fn invoker_for(&self, _api_key: ApiKey) -> Arc<dyn PromptInvoker> {
            self.0.clone()
        }
    }

    fn server_config(rate_limit_per_minute: u32) -> ServerConfig {
        ServerConfig {
            bind_address: "127.0.0.1".to_string(),
            port: 3000,
            base_path: "/api/v1".to_string(),
            cors_origin: "http://localhost:5173".to_string(),
            rate_limit_per_minute,
            environment: AppEnvironment::Development,
            graceful_shutdown_secs: 15,
            trust_forwarded_for: false,
        }
    }

    fn app(rate_limit_per_minute: u32) -> (Router, Arc<CountingInvoker>) {
        app_with(server_config(rate_limit_per_minute))
    }

    fn app_with(config: ServerConfig) -> (Router, Arc<CountingInvoker>) {
        let invoker = Arc::new(CountingInvoker::default());
        let factory = Arc::new(SharedFactory(invoker.clone()));
        let router = router(&config, factory).expect("router");
        (router, invoker)
    }

    /// Health request as it arrives from `peer`, carrying a forwarded-for header.
    fn health_from(peer: &str, forwarded_for: &str) -> Request<Body> {
        let peer: SocketAddr = peer.parse().expect("peer address");
        let mut request = Request::get("/api/v1/ai/health")
            .header("x-forwarded-for", forwarded_for)
            .body(Body::empty())
            .expect("request");
        request.extensions_mut().insert(ConnectInfo(peer));
        request
    }

    fn chat_request(key: Option<&str>, body: Value) -> Request<Body> {
        let mut builder = Request::builder()
            .method("POST")
            .uri("/api/v1/ai/chat")
            .header("content-type", "application/json");
        if let Some(key) = key {
            builder = builder.header("x-api-key", key);
        }
        builder.body(Body::from(body.to_string())).expect("request")
    }

    fn question(text: &str) -> Value {
        json!({
            "question": text,
            "context": {
                "user": { "id": "u1", "role": "Manager", "department": "Sales" },
                "tasks": [{ "id": "t1", "title": "Renew contract", "status": "To Do" }]
            }
        })
    }

    async fn json_body(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.expect("body");
        serde_json::from_slice(&bytes).expect("json body")
    }

    #[tokio::test]
    async fn health_is_mounted_under_the_ai_base_path() {
        let (app, _) = app(10);

        let response = app
            .oneshot(Request::get("/api/v1/ai/health").body(Body::empty()).expect("request"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], json!("ok"));
    }

    #[tokio::test]
    async fn general_question_is_answered_with_two_model_calls() {
        let (app, invoker) = app(10);

        let response = app
            .oneshot(chat_request(Some(KEY), question("What is overdue?")))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await, json!({ "answer": "Three tasks are overdue." }));
        assert_eq!(invoker.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn short_api_key_is_unauthorized_before_any_model_call() {
        let (app, invoker) = app(10);

        for key in [None, Some("   too-short   ")] {
            let response = app
                .clone()
                .oneshot(chat_request(key, question("What is overdue?")))
                .await
                .expect("response");

            assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
            let body = json_body(response).await;
            assert_eq!(body["statusCode"], json!(401));
            assert_eq!(body["error"], json!("Unauthorized"));
        }
        assert_eq!(invoker.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalid_body_is_a_validation_error() {
        let (app, invoker) = app(10);

        let response = app
            .oneshot(chat_request(Some(KEY), json!({ "context": { "user": { "id": "u1" } } })))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json_body(response).await;
        assert_eq!(body["message"], json!("Validation failed."));
        assert_eq!(
            body["details"],
            json!([{ "path": "question", "message": "missing field `question`" }])
        );
        assert_eq!(invoker.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn unsupported_command_is_refused_with_status_ok() {
        let (app, invoker) = app(10);

        let response = app
            .oneshot(chat_request(Some(KEY), question("@delete-user bob")))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(
            json_body(response).await,
            json!({ "answer": "Sorry, I don't know how to delete users." })
        );
        assert_eq!(invoker.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn requests_over_the_limit_get_429_with_retry_after() {
        let (app, _) = app(2);

        for _ in 0..2 {
            let response =
                app.clone().oneshot(health_from("10.0.0.1:4000", "203.0.113.7")).await;
            assert_eq!(response.expect("response").status(), StatusCode::OK);
        }
        let response = app
            .clone()
            .oneshot(health_from("10.0.0.1:4000", "203.0.113.7"))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key("retry-after"));
        assert_eq!(json_body(response).await["statusCode"], json!(429));

        let response =
            app.oneshot(health_from("10.0.0.2:4000", "203.0.113.7")).await.expect("response");
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn rotating_forwarded_for_does_not_reset_the_limit() {
        let (app, _) = app(2);

        let mut admitted = 0;
        for hop in 0..20 {
            let response = app
                .clone()
                .oneshot(health_from("10.0.0.1:4000", &format!("198.51.100.{hop}")))
                .await
                .expect("response");
            if response.status() == StatusCode::OK {
                admitted += 1;
            }
        }

        assert_eq!(admitted, 2);
    }

    #[tokio::test]
    async fn trusted_proxy_limits_each_forwarded_client() {
        let mut config = server_config(1);
        config.trust_forwarded_for = true;
        let (app, _) = app_with(config);

        for client in ["203.0.113.7", "203.0.113.8"] {
            let response =
                app.clone().oneshot(health_from("10.0.0.1:4000", client)).await.expect("response");
            assert_eq!(response.status(), StatusCode::OK);
        }
        let response = app
            .oneshot(health_from("10.0.0.1:4000", "203.0.113.7"))
            .await
            .expect("response");
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    }

    #[tokio::test]
    async fn preflight_allows_the_configured_origin() {
        let (app, _) = app(10);

        let response = app
            .oneshot(
                Request::builder()
                    .method("OPTIONS")
                    .uri("/api/v1/ai/chat")
                    .header("origin", "http://localhost:5173")
                    .header("access-control-request-method", "POST")
                    .header("access-control-request-headers", "content-type,x-api-key")
                    .body(Body::empty())
                    .expect("request"),
            )
            .await
            .expect("response");

        assert_eq!(
            response
                .headers()
                .get("access-control-allow-origin")
                .and_then(|value| value.to_str().ok()),
            Some("http://localhost:5173")
        );
    }

    #[tokio::test]
    async fn oversized_body_is_rejected() {
        let (app, invoker) = app(10);
        let padding = "x".repeat(MAX_BODY_BYTES);

        let response = app
            .oneshot(chat_request(Some(KEY), question(&padding)))
            .await
            .expect("response");

        assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
        assert_eq!(invoker.calls.load(Ordering::SeqCst), 0);
    }
}
