use std::env;
use std::sync::{Mutex, OnceLock};

use bizassist_cli::commands::{config, doctor};
use serde_json::Value;

#[test]
fn config_reports_defaults_with_default_source() {
    with_env(&[], || {
        let result = config::run();
        assert_eq!(result.exit_code, 0);

        assert!(result
            .output
            .contains("- llm.model = gemini-2.5-flash-lite (source: default)"));
        assert!(result.output.contains("- server.base_path = /api/v1 (source: default)"));
        assert!(result.output.contains("- server.rate_limit_per_minute = 10 (source: default)"));
        assert!(result
            .output
            .contains("- server.trust_forwarded_for = false (source: default)"));
    });
}

#[test]
fn config_attributes_env_and_platform_aliases() {
    with_env(
        &[
            ("BIZASSIST_LLM_MODEL", "gemini-2.5-pro"),
            ("PORT", "8080"),
            ("CORS_ORIGIN", "https://app.example.com"),
        ],
        || {
            let result = config::run();
            assert_eq!(result.exit_code, 0);

            assert!(result
                .output
                .contains("- llm.model = gemini-2.5-pro (source: env (BIZASSIST_LLM_MODEL))"));
            assert!(result.output.contains("- server.port = 8080 (source: env (PORT))"));
            assert!(result.output.contains(
                "- server.cors_origin = https://app.example.com (source: env (CORS_ORIGIN))"
            ));
        },
    );
}

#[test]
fn config_returns_structured_failure_when_invalid() {
    with_env(&[("BIZASSIST_SERVER_RATE_LIMIT_PER_MINUTE", "0")], || {
        let result = config::run();
        assert_eq!(result.exit_code, 2);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn doctor_passes_with_default_config() {
    with_env(&[], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 0, "doctor output: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "pass");
        let names = payload["checks"]
            .as_array()
            .map(|checks| checks.iter().map(|check| check["name"].clone()).collect::<Vec<_>>())
            .unwrap_or_default();
        assert_eq!(names, vec!["config_validation", "llm_endpoint", "prompt_templates"]);
    });
}

#[test]
fn doctor_skips_endpoint_check_when_config_is_invalid() {
    with_env(&[("BIZASSIST_LLM_BASE_URL", "ftp://example.com")], || {
        let result = doctor::run(true);
        assert_eq!(result.exit_code, 1);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["overall_status"], "fail");
        assert_eq!(payload["checks"][0]["status"], "fail");
        assert_eq!(payload["checks"][1]["status"], "skipped");
        assert_eq!(payload["checks"][2]["status"], "pass");
    });
}

#[test]
fn doctor_human_output_lists_each_check() {
    with_env(&[], || {
        let result = doctor::run(false);

        assert!(result.output.starts_with("doctor: all readiness checks passed"));
        assert!(result.output.contains("- [ok] prompt_templates: 6 prompt templates rendered"));
    });
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "BIZASSIST_LLM_MODEL",
        "BIZASSIST_LLM_BASE_URL",
        "BIZASSIST_LLM_TIMEOUT_SECS",
        "BIZASSIST_SERVER_BIND_ADDRESS",
        "BIZASSIST_SERVER_PORT",
        "BIZASSIST_SERVER_BASE_PATH",
        "BIZASSIST_SERVER_CORS_ORIGIN",
        "BIZASSIST_SERVER_RATE_LIMIT_PER_MINUTE",
        "BIZASSIST_SERVER_ENVIRONMENT",
        "BIZASSIST_SERVER_GRACEFUL_SHUTDOWN_SECS",
        "BIZASSIST_SERVER_TRUST_FORWARDED_FOR",
        "BIZASSIST_LOGGING_LEVEL",
        "BIZASSIST_LOGGING_FORMAT",
        "BIZASSIST_LOG_LEVEL",
        "BIZASSIST_LOG_FORMAT",
        "PORT",
        "CORS_ORIGIN",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
