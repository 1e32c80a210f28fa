use crate::error::{LearnHubError, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL: &str = "gpt-4o-mini";
const DEFAULT_RULES_PATH: &str = "extreme_rules.json";
const DEFAULT_BIND_ADDR: &str = "127.0.0.1:3000";

/// Service configuration, resolved from the environment at startup.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// API key for the LLM provider (required)
    pub api_key: String,
    /// Base URL for the provider API
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Default chat model
    #[serde(default = "default_model")]
    pub model: String,
    /// Assistant identifier; chat requests fall back to plain completions when unset
    #[serde(default)]
    pub assistant_id: Option<String>,
    /// Vector store bound to the assistant's file search tool
    #[serde(default)]
    pub vector_store_id: Option<String>,
    /// Temperature override; the provider default (1) is never sent explicitly
    #[serde(default)]
    pub temperature: Option<f32>,
    /// Path to the query rules document, relative to the working directory
    #[serde(default = "default_rules_path")]
    pub rules_path: PathBuf,
    /// Run poll interval in milliseconds
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,
    /// Run polling ceiling in milliseconds, measured from run creation
    #[serde(default = "default_run_timeout_ms")]
    pub run_timeout_ms: u64,
    /// Per-request HTTP timeout in seconds
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
    /// Listen address for the HTTP server
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
}

fn default_base_url() -> String {
    DEFAULT_BASE_URL.to_string()
}

fn default_model() -> String {
    DEFAULT_MODEL.to_string()
}

fn default_rules_path() -> PathBuf {
    PathBuf::from(DEFAULT_RULES_PATH)
}

fn default_poll_interval_ms() -> u64 {
    800
}

fn default_run_timeout_ms() -> u64 {
    30_000
}

fn default_request_timeout_secs() -> u64 {
    120
}

fn default_bind_addr() -> String {
    DEFAULT_BIND_ADDR.to_string()
}

impl Settings {
    /// Resolve settings from environment variables.
    ///
    /// Fails fast with a descriptive error when the API key is absent;
    /// everything else falls back to defaults.
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").unwrap_or_default();
        let settings = Self {
            api_key,
            base_url: env_or("OPENAI_BASE_URL", DEFAULT_BASE_URL),
            model: env_or("OPENAI_MODEL", DEFAULT_MODEL),
            assistant_id: env_opt("OPENAI_ASSISTANT_ID"),
            vector_store_id: env_opt("OPENAI_VECTOR_STORE_ID"),
            temperature: env_opt("OPENAI_TEMPERATURE").and_then(|raw| parse_temperature(&raw)),
            rules_path: PathBuf::from(env_or("RULES_PATH", DEFAULT_RULES_PATH)),
            poll_interval_ms: env_u64("ASSISTANT_POLL_INTERVAL_MS", 800),
            run_timeout_ms: env_u64("ASSISTANT_RUN_TIMEOUT_MS", 30_000),
            request_timeout_secs: env_u64("REQUEST_TIMEOUT_SECS", 120),
            bind_addr: env_or("BIND_ADDR", DEFAULT_BIND_ADDR),
        };
        settings.validate()?;
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.api_key.is_empty() {
            return Err(LearnHubError::Configuration(
                "Missing API key. Set OPENAI_API_KEY in the server environment.".to_string(),
            ));
        }
        Ok(())
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_millis(self.run_timeout_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key)
        .ok()
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

/// Non-finite values are discarded rather than forwarded upstream.
fn parse_temperature(raw: &str) -> Option<f32> {
    raw.trim().parse::<f32>().ok().filter(|t| t.is_finite())
}
