use std::sync::Arc;

use axum::http::header::InvalidHeaderValue;
use axum::Router;
use bizassist_agent::{GeminiInvokerFactory, GenerationError};
use bizassist_core::config::AppConfig;
use thiserror::Error;
use tracing::info;

use crate::app;

pub struct Application {
    pub config: AppConfig,
    pub router: Router,
}

#[derive(Debug, Error)]
pub enum BootstrapError {
    #[error("llm client initialization failed: {0}")]
    LlmClient(#[source] GenerationError),
    #[error("server.cors_origin is not a valid header value: {0}")]
    CorsOrigin(#[source] InvalidHeaderValue),
}

pub fn bootstrap_with_config(config: AppConfig) -> Result<Application, BootstrapError> {
    info!(
        event_name = "system.bootstrap.start",
        correlation_id = "bootstrap",
        environment = config.server.environment.as_str(),
        "starting application bootstrap"
    );

    let invokers =
        GeminiInvokerFactory::from_config(&config.llm).map_err(BootstrapError::LlmClient)?;
    info!(
        event_name = "system.bootstrap.llm_ready",
        correlation_id = "bootstrap",
        model = %config.llm.model,
        endpoint = invokers.endpoint(),
        "llm invoker factory ready"
    );

    let router =
        app::router(&config.server, Arc::new(invokers)).map_err(BootstrapError::CorsOrigin)?;

    Ok(Application { config, router })
}
