//! Application configuration loaded from environment variables.

use crate::errors::{Result, StepError};

#[derive(Debug, Clone)]
pub struct Config {
    /// Base URL of the steps backend (requests go to `{base}/api/steps/...`)
    pub api_url: String,
    /// Bearer credential attached to every backend request
    pub api_token: Option<String>,
    /// Path to the SQLite database holding the step cache
    pub database_url: String,
    /// Port for the local REST API
    pub api_port: u16,
    /// How often (in seconds) to reconcile with the backend; `0` disables it
    pub sync_interval_secs: u64,
    /// Timeout (in seconds) applied to each backend request
    pub request_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Ok(Config {
            api_url: env_var("STEP_API_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
            api_token: env_var("STEP_API_TOKEN")
                .ok()
                .filter(|token| !token.trim().is_empty()),
            database_url: env_var("DATABASE_URL")
                .unwrap_or_else(|_| "sqlite:./step_cache.db".to_string()),
            api_port: parse_var("API_PORT", "3002")?,
            sync_interval_secs: parse_var("SYNC_INTERVAL_SECS", "30")?,
            request_timeout_secs: parse_var("REQUEST_TIMEOUT_SECS", "30")?,
        })
    }
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| StepError::Config(format!("Missing env var: {key}")))
}

fn parse_var<T: std::str::FromStr>(key: &str, default: &str) -> Result<T> {
    env_var(key)
        .unwrap_or_else(|_| default.to_string())
        .trim()
        .parse()
        .map_err(|_| StepError::Config(format!("Invalid {key}")))
}
