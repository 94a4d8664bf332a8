use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use bizassist_core::config::{AppConfig, LoadOptions, DEFAULT_CONFIG_PATHS};
use toml::Value;

use crate::commands::CommandResult;

/// One printed setting: dotted key, rendered value, env vars in precedence order.
struct Field {
    key: &'static str,
    value: String,
    env_keys: &'static [&'static str],
}

pub fn run() -> CommandResult {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => {
            return CommandResult::failure(
                "config",
                "config_validation",
                format!("config validation failed: {error}"),
                2,
            )
        }
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: env > file > default):".to_string()];
    for field in fields(&config) {
        let source = field_source(
            field.key,
            field.env_keys,
            config_file_doc.as_ref(),
            config_file_path.as_deref(),
        );
        lines.push(render_line(field.key, &field.value, source));
    }

    CommandResult::success(lines.join("\n"))
}

fn fields(config: &AppConfig) -> Vec<Field> {
    let server = &config.server;
    vec![
        Field {
            key: "llm.model",
            value: config.llm.model.clone(),
            env_keys: &["BIZASSIST_LLM_MODEL"],
        },
        Field {
            key: "llm.base_url",
            value: redact_url(&config.llm.base_url),
            env_keys: &["BIZASSIST_LLM_BASE_URL"],
        },
        Field {
            key: "llm.timeout_secs",
            value: config.llm.timeout_secs.to_string(),
            env_keys: &["BIZASSIST_LLM_TIMEOUT_SECS"],
        },
        Field {
            key: "server.bind_address",
            value: server.bind_address.clone(),
            env_keys: &["BIZASSIST_SERVER_BIND_ADDRESS"],
        },
        Field {
            key: "server.port",
            value: server.port.to_string(),
            env_keys: &["BIZASSIST_SERVER_PORT", "PORT"],
        },
        Field {
            key: "server.base_path",
            value: server.base_path.clone(),
            env_keys: &["BIZASSIST_SERVER_BASE_PATH"],
        },
        Field {
            key: "server.cors_origin",
            value: server.cors_origin.clone(),
            env_keys: &["BIZASSIST_SERVER_CORS_ORIGIN", "CORS_ORIGIN"],
        },
        Field {
            key: "server.rate_limit_per_minute",
            value: server.rate_limit_per_minute.to_string(),
            env_keys: &["BIZASSIST_SERVER_RATE_LIMIT_PER_MINUTE"],
        },
        Field {
            key: "server.environment",
            value: server.environment.to_string(),
            env_keys: &["BIZASSIST_SERVER_ENVIRONMENT"],
        },
        Field {
            key: "server.graceful_shutdown_secs",
            value: server.graceful_shutdown_secs.to_string(),
            env_keys: &["BIZASSIST_SERVER_GRACEFUL_SHUTDOWN_SECS"],
        },
        Field {
            key: "server.trust_forwarded_for",
            value: server.trust_forwarded_for.to_string(),
            env_keys: &["BIZASSIST_SERVER_TRUST_FORWARDED_FOR"],
        },
        Field {
            key: "logging.level",
            value: config.logging.level.clone(),
            env_keys: &["BIZASSIST_LOGGING_LEVEL", "BIZASSIST_LOG_LEVEL"],
        },
        Field {
            key: "logging.format",
            value: format!("{:?}", config.logging.format),
            env_keys: &["BIZASSIST_LOGGING_FORMAT", "BIZASSIST_LOG_FORMAT"],
        },
    ]
}

fn detect_config_path() -> Option<PathBuf> {
    DEFAULT_CONFIG_PATHS.into_iter().map(PathBuf::from).find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let set_env = env_keys
        .iter()
        .find(|key| env::var(key).map(|value| !value.trim().is_empty()).unwrap_or(false));
    if let Some(env_key) = set_env {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

/// Hides `user:password@` credentials embedded in a URL.
fn redact_url(url: &str) -> String {
    let Some((scheme, rest)) = url.split_once("://") else {
        return url.to_string();
    };
    let authority_end = rest.find('/').unwrap_or(rest.len());
    match rest[..authority_end].rfind('@') {
        Some(at) => format!("{scheme}://***@{}", &rest[at + 1..]),
        None => url.to_string(),
    }
}
