use crate::error::Result;
use serde::Deserialize;
use tracing::info;

pub(crate) mod cli;

pub use cli::Args;

/// Anti-detection tuning knobs, constructed once at startup and passed by
/// reference into every component. Defaults track values that held up in
/// production against the target site; all of them can be overridden from
/// the batch config file.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AntiDetectionConfig {
    /// Lower bound of the base inter-request delay, in seconds.
    pub base_delay_min: f64,
    /// Upper bound of the base inter-request delay, in seconds.
    pub base_delay_max: f64,
    /// Hard ceiling on any single computed delay, in seconds.
    pub max_delay: f64,
    /// Ceiling on the adaptive backoff multiplier.
    pub backoff_cap: u32,
    /// Rotate the session after this many requests.
    pub requests_before_rotation: u32,
    /// Rotate the session after this many seconds of age.
    pub max_session_duration_secs: u64,
    /// Rotate the session after this many consecutive failures.
    pub max_consecutive_failures: u32,
    /// Case-insensitive substrings that mark a challenge page.
    pub soft_block_indicators: Vec<String>,
    /// Bodies shorter than this are treated as block pages.
    pub min_response_length: usize,
    /// Retry attempts per fetch before surfacing a terminal outcome.
    pub max_retries: u32,
    /// Base for exponential retry sleeps on hard failures, in seconds.
    pub retry_delay_base_secs: u64,
    /// Penalty sleep multiplier after a 429, in seconds per attempt.
    pub rate_limit_wait_multiplier: u64,
    /// Penalty sleep multiplier after a 403, in seconds per attempt.
    pub forbidden_wait_multiplier: u64,
    /// Penalty sleep multiplier after a challenge page, in seconds per attempt.
    pub soft_block_wait_multiplier: u64,
    /// Wall-clock timeout for a single HTTP call, in seconds.
    pub request_timeout_secs: u64,
}

impl Default for AntiDetectionConfig {
    fn default() -> Self {
        Self {
            base_delay_min: 5.0,
            base_delay_max: 8.0,
            max_delay: 15.0,
            backoff_cap: 4,
            requests_before_rotation: 15,
            max_session_duration_secs: 300,
            max_consecutive_failures: 2,
            soft_block_indicators: [
                "captcha",
                "verify you are human",
                "please wait",
                "access denied",
                "blocked",
                "suspicious activity",
                "too many requests",
                "rate limit",
                "security check",
                "checking your browser",
                "cloudflare",
                "ddos protection",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
            min_response_length: 1000,
            max_retries: 3,
            retry_delay_base_secs: 2,
            rate_limit_wait_multiplier: 60,
            forbidden_wait_multiplier: 30,
            soft_block_wait_multiplier: 30,
            request_timeout_secs: 30,
        }
    }
}

/// One entry in the batch config: a page to fetch plus optional content
/// markers that must appear in a healthy response body.
#[derive(Debug, Clone, Deserialize)]
pub struct TargetSpec {
    pub url: String,
    #[serde(default)]
    pub expected_markers: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BatchConfig {
    pub targets: Vec<TargetSpec>,
    #[serde(default)]
    pub anti_detection: AntiDetectionConfig,
}

impl BatchConfig {
    pub fn load(path: &std::path::Path) -> Result<Self> {
        let config: BatchConfig = serde_json::from_str(&std::fs::read_to_string(path)?)?;
        info!(
            "Loaded batch config with {} targets from {:?}",
            config.targets.len(),
            path
        );
        Ok(config)
    }
}
