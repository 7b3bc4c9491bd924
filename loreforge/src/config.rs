//! Process-wide configuration for the generation backend.
//!
//! All values can be overridden through environment variables, read once when
//! the client is constructed:
//!
//! | Variable             | Default                  |
//! |----------------------|--------------------------|
//! | `OLLAMA_URL`         | `http://127.0.0.1:11434` |
//! | `OLLAMA_MODEL`       | `gemma3`                 |
//! | `OLLAMA_TIMEOUT`     | `30000` (milliseconds)   |
//! | `OLLAMA_MAX_RETRIES` | `6`                      |

use std::env;
use std::time::Duration;

use serde::Serialize;

/// Default backend base URL.
pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:11434";
/// Default model identifier.
pub const DEFAULT_MODEL: &str = "gemma3";
/// Default per-attempt timeout, in milliseconds.
pub const DEFAULT_TIMEOUT_MS: u64 = 30_000;
/// Default total number of attempts per generation call.
pub const DEFAULT_MAX_RETRIES: u32 = 6;

/// Backend connection settings.
#[derive(Debug, Clone)]
pub struct GenerationConfig {
    /// Base URL of the generation backend, without a trailing path.
    pub base_url: String,
    /// Model identifier sent with every request.
    pub model: String,
    /// Per-attempt request timeout.
    pub timeout: Duration,
    /// Total number of attempts made before giving up.
    pub max_retries: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_millis(DEFAULT_TIMEOUT_MS),
            max_retries: DEFAULT_MAX_RETRIES,
        }
    }
}

impl GenerationConfig {
    /// Builds a configuration from environment variables, falling back to the
    /// documented defaults for anything unset or unparseable.
    pub fn from_env() -> Self {
        let base_url = env::var("OLLAMA_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let model = env::var("OLLAMA_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        let timeout_ms = env::var("OLLAMA_TIMEOUT")
            .ok()
            .and_then(|v| v.parse::<u64>().ok())
            .unwrap_or(DEFAULT_TIMEOUT_MS);
        let max_retries = env::var("OLLAMA_MAX_RETRIES")
            .ok()
            .and_then(|v| v.parse::<u32>().ok())
            .unwrap_or(DEFAULT_MAX_RETRIES);

        Self {
            base_url,
            model,
            timeout: Duration::from_millis(timeout_ms),
            max_retries,
        }
    }

    /// Sets the backend base URL.
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    /// Sets the model identifier.
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Sets the per-attempt timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sets the total attempt count.
    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries.max(1);
        self
    }
}

/// Retry schedule for a generation call.
///
/// The first failed attempt sleeps `initial_delay`; each further retry
/// multiplies the delay by `backoff_factor`.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total number of attempts, including the first.
    pub max_attempts: u32,
    /// Delay before the second attempt.
    pub initial_delay: Duration,
    /// Multiplier applied to the delay after each retry.
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_RETRIES,
            initial_delay: Duration::from_millis(1000),
            backoff_factor: 1.5,
        }
    }
}

impl RetryPolicy {
    /// Builds a policy taking the attempt count from a configuration.
    pub fn from_config(config: &GenerationConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            ..Self::default()
        }
    }

    /// Sets the total attempt count.
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    /// Sets the delay before the second attempt.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }
}

/// Sampling parameters forwarded to the backend verbatim.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct SamplingOptions {
    /// Sampling temperature.
    pub temperature: f64,
    /// Nucleus sampling parameter.
    pub top_p: f64,
    /// Maximum number of tokens to generate.
    pub num_predict: u32,
    /// Repetition penalty. Omitted from the request body when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeat_penalty: Option<f64>,
    /// Top-k sampling cutoff. Omitted from the request body when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_k: Option<u32>,
}

impl SamplingOptions {
    /// Low-temperature settings for structured JSON generation.
    pub const fn json_default() -> Self {
        Self {
            temperature: 0.3,
            top_p: 0.9,
            num_predict: 2048,
            repeat_penalty: Some(1.1),
            top_k: Some(40),
        }
    }

    /// Looser settings for free-form narrative generation.
    pub const fn narrative_default() -> Self {
        Self {
            temperature: 0.7,
            top_p: 0.9,
            num_predict: 1024,
            repeat_penalty: None,
            top_k: None,
        }
    }
}
