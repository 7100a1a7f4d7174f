use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::generation::prompts::TrimLimits;
use crate::generation::workflow::{PromptStrategy, WorkflowOptions};

/// Upper bound for `WORKFLOW_MAX_RETRIES`.
const MAX_RETRIES_LIMIT: u32 = 10;

/// Application configuration loaded from environment variables.
/// Startup fails if a variable is present but malformed.
#[derive(Debug, Clone)]
pub struct Config {
    /// When unset, settings/profile/template live in process memory only.
    pub redis_url: Option<String>,
    pub redis_prefix: String,
    pub port: u16,
    pub rust_log: String,
    pub workflow: WorkflowOptions,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok(); // load .env if present; ignore if missing
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key lookup (the environment in production).
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = WorkflowOptions::default();

        let workflow = WorkflowOptions {
            store_timeout: Duration::from_millis(parse_or(
                &lookup,
                "WORKFLOW_STORE_TIMEOUT_MS",
                defaults.store_timeout.as_millis() as u64,
            )?),
            llm_timeout: Duration::from_secs(parse_or(
                &lookup,
                "WORKFLOW_LLM_TIMEOUT_SECS",
                defaults.llm_timeout.as_secs(),
            )?),
            max_retries: parse_or(&lookup, "WORKFLOW_MAX_RETRIES", defaults.max_retries)?,
            backoff_base: Duration::from_millis(parse_or(
                &lookup,
                "WORKFLOW_BACKOFF_BASE_MS",
                defaults.backoff_base.as_millis() as u64,
            )?),
            max_request_bytes: parse_or(
                &lookup,
                "WORKFLOW_MAX_REQUEST_BYTES",
                defaults.max_request_bytes,
            )?,
            trim: TrimLimits {
                job_chars: parse_or(&lookup, "WORKFLOW_TRIMMED_JOB_CHARS", defaults.trim.job_chars)?,
                experience_entries: parse_or(
                    &lookup,
                    "WORKFLOW_TRIMMED_EXPERIENCE_ENTRIES",
                    defaults.trim.experience_entries,
                )?,
            },
            temperature: parse_or(&lookup, "LLM_TEMPERATURE", defaults.temperature)?,
            max_tokens: parse_or(&lookup, "LLM_MAX_TOKENS", defaults.max_tokens)?,
            strategy: match lookup("WORKFLOW_PROMPT_STRATEGY") {
                Some(raw) => raw
                    .parse::<PromptStrategy>()
                    .map_err(|e| anyhow!(e))
                    .context("WORKFLOW_PROMPT_STRATEGY is invalid")?,
                None => defaults.strategy,
            },
        };

        if workflow.max_retries > MAX_RETRIES_LIMIT {
            return Err(anyhow!(
                "WORKFLOW_MAX_RETRIES must be at most {MAX_RETRIES_LIMIT}, got {}",
                workflow.max_retries
            ));
        }

        if !(0.0..=1.0).contains(&workflow.temperature) {
            return Err(anyhow!(
                "LLM_TEMPERATURE must be between 0 and 1, got {}",
                workflow.temperature
            ));
        }

        Ok(Config {
            redis_url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),
            redis_prefix: lookup("REDIS_PREFIX").unwrap_or_else(|| "tailor".to_string()),
            port: parse_or(&lookup, "PORT", 8080u16)?,
            rust_log: lookup("RUST_LOG").unwrap_or_else(|| "info".to_string()),
            workflow,
        })
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("Environment variable '{key}' has an invalid value: '{raw}'")),
        None => Ok(default),
    }
}
