use bizassist_agent::{GeminiInvokerFactory, Prompt, PromptCatalog, PromptInput};
use bizassist_core::config::{AppConfig, LoadOptions};
use bizassist_core::{ContextBundle, UserProfile};
use chrono::Utc;
use serde::Serialize;

use crate::commands::CommandResult;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
enum CheckStatus {
    Pass,
    Fail,
    Skipped,
}

#[derive(Debug, Serialize)]
struct DoctorCheck {
    name: &'static str,
    status: CheckStatus,
    details: String,
}

#[derive(Debug, Serialize)]
struct DoctorReport {
    overall_status: CheckStatus,
    summary: String,
    checks: Vec<DoctorCheck>,
}

pub fn run(json_output: bool) -> CommandResult {
    let report = build_report();
    let exit_code = if report.overall_status == CheckStatus::Pass { 0 } else { 1 };

    let output = if json_output {
        serde_json::to_string_pretty(&report).unwrap_or_else(|error| {
            format!(
                "{{\"overall_status\":\"fail\",\"summary\":\"doctor serialization failed\",\"error\":\"{}\"}}",
                escape_json(&error.to_string())
            )
        })
    } else {
        render_human(&report)
    };

    CommandResult { exit_code, output }
}

fn build_report() -> DoctorReport {
    let mut checks = Vec::new();

    match AppConfig::load(LoadOptions::default()) {
        Ok(config) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Pass,
                details: "configuration loaded and validated".to_string(),
            });
            checks.push(check_llm_endpoint(&config));
        }
        Err(error) => {
            checks.push(DoctorCheck {
                name: "config_validation",
                status: CheckStatus::Fail,
                details: error.to_string(),
            });
            checks.push(DoctorCheck {
                name: "llm_endpoint",
                status: CheckStatus::Skipped,
                details: "skipped because configuration did not load".to_string(),
            });
        }
    }
    checks.push(check_prompt_templates());

    let all_pass = checks.iter().all(|check| check.status == CheckStatus::Pass);
    let overall_status = if all_pass { CheckStatus::Pass } else { CheckStatus::Fail };
    let summary = if all_pass {
        "doctor: all readiness checks passed".to_string()
    } else {
        "doctor: one or more readiness checks failed".to_string()
    };

    DoctorReport { overall_status, summary, checks }
}

/// Builds the HTTP client and endpoint exactly as the server would. No request is sent.
fn check_llm_endpoint(config: &AppConfig) -> DoctorCheck {
    match GeminiInvokerFactory::from_config(&config.llm) {
        Ok(factory) if factory.endpoint().ends_with(":generateContent") => DoctorCheck {
            name: "llm_endpoint",
            status: CheckStatus::Pass,
            details: format!(
                "model `{}` at {} (timeout {}s)",
                config.llm.model,
                factory.endpoint(),
                config.llm.timeout_secs
            ),
        },
        Ok(factory) => DoctorCheck {
            name: "llm_endpoint",
            status: CheckStatus::Fail,
            details: format!("unexpected endpoint shape `{}`", factory.endpoint()),
        },
        Err(error) => DoctorCheck {
            name: "llm_endpoint",
            status: CheckStatus::Fail,
            details: error.to_string(),
        },
    }
}

fn check_prompt_templates() -> DoctorCheck {
    let catalog = match PromptCatalog::new() {
        Ok(catalog) => catalog,
        Err(error) => {
            return DoctorCheck {
                name: "prompt_templates",
                status: CheckStatus::Fail,
                details: error.to_string(),
            };
        }
    };

    let sample = PromptInput::new(
        "doctor readiness check",
        ContextBundle::new(UserProfile::with_id("doctor")),
        Utc::now().date_naive(),
    );
    let failures = Prompt::ALL
        .into_iter()
        .filter_map(|prompt| catalog.render(prompt, &sample).err())
        .map(|error| error.to_string())
        .collect::<Vec<_>>();

    if failures.is_empty() {
        DoctorCheck {
            name: "prompt_templates",
            status: CheckStatus::Pass,
            details: format!("{} prompt templates rendered", Prompt::ALL.len()),
        }
    } else {
        DoctorCheck {
            name: "prompt_templates",
            status: CheckStatus::Fail,
            details: failures.join("; "),
        }
    }
}

fn render_human(report: &DoctorReport) -> String {
    let mut lines = Vec::new();
    lines.push(report.summary.clone());

    for check in &report.checks {
        let marker = match check.status {
            CheckStatus::Pass => "ok",
            CheckStatus::Fail => "fail",
            CheckStatus::Skipped => "skip",
        };
        lines.push(format!("- [{marker}] {}: {}", check.name, check.details));
    }

    lines.join("\n")
}

fn escape_json(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
