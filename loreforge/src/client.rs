//! HTTP client for the local generation backend.
//!
//! Issues text-completion requests against an Ollama-style `/api/generate`
//! endpoint with bounded retries and exponential backoff. Failures are
//! classified into typed [`GenerationError`] variants; everything transient
//! (connection refused, model not yet pulled, timeout, empty body) is retried
//! up to the configured limit, while DNS-resolution failure aborts
//! immediately as a configuration error.

use std::time::Duration;

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, error, info, warn};

use crate::config::{GenerationConfig, RetryPolicy, SamplingOptions};
use crate::error::GenerationError;

/// Client for a local Ollama-compatible generation backend.
///
/// Build it once from a [`GenerationConfig`] and share it across concurrent
/// generation calls. Each call is fully independent; retries re-send the
/// identical prompt.
#[derive(Debug, Clone)]
pub struct GenerationClient {
    config: GenerationConfig,
    http: Client,
}

/// Request body for `/api/generate`.
#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    options: SamplingOptions,
}

/// Response body from `/api/generate`.
#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    response: Option<String>,
}

/// Response body from `/api/version`.
#[derive(Debug, Deserialize)]
struct VersionResponse {
    #[serde(default)]
    version: Option<String>,
}

/// Response body from `/api/tags`.
#[derive(Debug, Deserialize)]
struct TagsResponse {
    #[serde(default)]
    models: Vec<ModelTag>,
}

#[derive(Debug, Deserialize)]
struct ModelTag {
    name: String,
}

impl GenerationClient {
    /// Creates a client from an explicit configuration.
    pub fn new(config: GenerationConfig) -> Self {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .expect("failed to build HTTP client");
        Self { config, http }
    }

    /// Creates a client from the `OLLAMA_*` environment variables.
    pub fn from_env() -> Self {
        Self::new(GenerationConfig::from_env())
    }

    /// Returns the active configuration.
    #[inline]
    pub fn config(&self) -> &GenerationConfig {
        &self.config
    }

    fn generate_url(&self) -> String {
        format!("{}/api/generate", self.config.base_url)
    }

    /// Generates a completion with low-temperature JSON-mode sampling.
    ///
    /// Returns the trimmed raw response text; extracting and repairing the
    /// JSON inside it is [`crate::parser::parse_json_response`]'s job.
    pub async fn generate_json(&self, prompt: &str) -> Result<String, GenerationError> {
        self.generate_with(
            prompt,
            SamplingOptions::json_default(),
            RetryPolicy::from_config(&self.config),
        )
        .await
    }

    /// Generates a free-form narrative completion.
    pub async fn generate_text(&self, prompt: &str) -> Result<String, GenerationError> {
        self.generate_with(
            prompt,
            SamplingOptions::narrative_default(),
            RetryPolicy::from_config(&self.config),
        )
        .await
    }

    /// Generates a completion with explicit sampling and retry settings.
    ///
    /// Makes up to `retry.max_attempts` requests, sleeping between failed
    /// attempts with the delay growing by `retry.backoff_factor` each time.
    /// DNS-resolution failure is returned immediately without retrying. After
    /// the final failed attempt, the error reports the attempt count, backend
    /// URL, model identifier, and the last underlying failure.
    pub async fn generate_with(
        &self,
        prompt: &str,
        sampling: SamplingOptions,
        retry: RetryPolicy,
    ) -> Result<String, GenerationError> {
        debug!(
            model = %self.config.model,
            prompt_len = prompt.len(),
            "generating completion"
        );

        let mut delay = retry.initial_delay;
        let mut last_error = String::new();

        for attempt in 1..=retry.max_attempts {
            if attempt > 1 {
                info!(
                    attempt,
                    max_attempts = retry.max_attempts,
                    url = %self.config.base_url,
                    "retrying generation"
                );
            }

            match self.attempt(prompt, sampling).await {
                Ok(text) => {
                    debug!(attempt, chars = text.len(), "generation succeeded");
                    return Ok(text);
                }
                Err(err) if err.is_fatal() => {
                    error!(
                        url = %self.config.base_url,
                        "DNS resolution failed; check the backend hostname"
                    );
                    return Err(err);
                }
                Err(err) => {
                    warn!(
                        attempt,
                        max_attempts = retry.max_attempts,
                        error = %err,
                        "generation attempt failed"
                    );
                    last_error = err.to_string();
                    if attempt < retry.max_attempts {
                        debug!(
                            delay_ms = delay.as_millis() as u64,
                            "backing off before next attempt"
                        );
                        sleep(delay).await;
                        delay = delay.mul_f64(retry.backoff_factor);
                    }
                }
            }
        }

        error!(
            attempts = retry.max_attempts,
            url = %self.config.base_url,
            model = %self.config.model,
            last_error = %last_error,
            "all generation attempts failed"
        );
        Err(GenerationError::RetriesExhausted {
            attempts: retry.max_attempts,
            url: self.config.base_url.clone(),
            model: self.config.model.clone(),
            last_error,
        })
    }

    /// Makes a single request and classifies any failure.
    async fn attempt(
        &self,
        prompt: &str,
        sampling: SamplingOptions,
    ) -> Result<String, GenerationError> {
        let body = GenerateRequest {
            model: &self.config.model,
            prompt,
            stream: false,
            options: sampling,
        };

        let response = self
            .http
            .post(self.generate_url())
            .json(&body)
            .send()
            .await
            .map_err(|err| self.classify_request_error(err))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(GenerationError::ModelNotFound {
                model: self.config.model.clone(),
                url: self.config.base_url.clone(),
            });
        }
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unreadable response body".to_string());
            return Err(GenerationError::Backend {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: GenerateResponse = response
            .json()
            .await
            .map_err(|err| GenerationError::InvalidBody(err.to_string()))?;
        completion_text(parsed)
    }

    /// Maps a reqwest transport error onto the [`GenerationError`] taxonomy.
    fn classify_request_error(&self, err: reqwest::Error) -> GenerationError {
        let url = self.config.base_url.clone();
        if err.is_timeout() {
            return GenerationError::Timeout {
                url,
                timeout: self.config.timeout,
            };
        }
        if err.is_connect() {
            if error_chain_mentions_dns(&err) {
                return GenerationError::DnsFailure { url };
            }
            return GenerationError::ConnectionRefused { url };
        }
        GenerationError::RequestFailed(err.to_string())
    }

    /// Probes the backend, logging its version and whether the configured
    /// model is available. Never fails; returns whether the backend answered.
    pub async fn health_check(&self) -> bool {
        let version_url = format!("{}/api/version", self.config.base_url);
        debug!(url = %version_url, "checking backend health");

        let version = match self
            .http
            .get(&version_url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => resp
                .json::<VersionResponse>()
                .await
                .ok()
                .and_then(|v| v.version),
            Ok(resp) => {
                warn!(
                    status = resp.status().as_u16(),
                    "backend version endpoint returned an error"
                );
                return false;
            }
            Err(err) => {
                error!(
                    error = %err,
                    url = %self.config.base_url,
                    "backend health check failed"
                );
                return false;
            }
        };
        info!(
            version = version.as_deref().unwrap_or("unknown"),
            "backend is running"
        );

        let tags_url = format!("{}/api/tags", self.config.base_url);
        match self
            .http
            .get(&tags_url)
            .timeout(Duration::from_secs(5))
            .send()
            .await
        {
            Ok(resp) if resp.status().is_success() => {
                if let Ok(tags) = resp.json::<TagsResponse>().await {
                    let names: Vec<String> =
                        tags.models.into_iter().map(|m| m.name).collect();
                    if names.iter().any(|n| n.contains(&self.config.model)) {
                        info!(model = %self.config.model, "configured model is available");
                    } else {
                        warn!(
                            model = %self.config.model,
                            available = ?names,
                            "configured model not found on backend"
                        );
                    }
                }
            }
            _ => warn!("could not list backend models"),
        }

        true
    }
}

/// Pulls the completion text out of a parsed response body.
///
/// A missing `response` field or a whitespace-only completion both count as a
/// failed attempt, so the caller retries them like any transient error.
fn completion_text(body: GenerateResponse) -> Result<String, GenerationError> {
    let text = body
        .response
        .ok_or_else(|| GenerationError::InvalidBody("missing 'response' field".to_string()))?;
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return Err(GenerationError::EmptyResponse);
    }
    Ok(trimmed.to_string())
}

/// Checks whether a transport error was caused by DNS resolution.
///
/// reqwest folds resolver failures into generic connect errors; the resolver
/// message is only visible somewhere down the source chain.
fn error_chain_mentions_dns(err: &(dyn std::error::Error + 'static)) -> bool {
    let mut current: Option<&(dyn std::error::Error + 'static)> = Some(err);
    while let Some(cause) = current {
        let text = cause.to_string();
        if text.contains("dns error") || text.contains("failed to lookup address") {
            return true;
        }
        current = cause.source();
    }
    false
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn test_completion_text_trims() {
        let body = GenerateResponse {
            response: Some("  The Rusty Anchor stands by the docks.\n".to_string()),
        };
        let text = completion_text(body).unwrap();
        assert_eq!(text, "The Rusty Anchor stands by the docks.");
    }

    #[test]
    fn test_completion_text_rejects_empty() {
        let body = GenerateResponse {
            response: Some("   \n\t".to_string()),
        };
        assert!(matches!(
            completion_text(body),
            Err(GenerationError::EmptyResponse)
        ));
    }

    #[test]
    fn test_completion_text_rejects_missing_field() {
        let body = GenerateResponse { response: None };
        assert!(matches!(
            completion_text(body),
            Err(GenerationError::InvalidBody(_))
        ));
    }

    #[test]
    fn test_response_body_deserializes_without_response_field() {
        let parsed: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.response.is_none());
    }

    #[test]
    fn test_dns_detection_walks_source_chain() {
        #[derive(Debug)]
        struct Leaf;
        impl std::fmt::Display for Leaf {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "dns error: failed to lookup address information")
            }
        }
        impl std::error::Error for Leaf {}

        #[derive(Debug)]
        struct Wrapper(Leaf);
        impl std::fmt::Display for Wrapper {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "client error (Connect)")
            }
        }
        impl std::error::Error for Wrapper {
            fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
                Some(&self.0)
            }
        }

        assert!(error_chain_mentions_dns(&Wrapper(Leaf)));

        #[derive(Debug)]
        struct Refused;
        impl std::fmt::Display for Refused {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                write!(f, "connection refused")
            }
        }
        impl std::error::Error for Refused {}

        assert!(!error_chain_mentions_dns(&Refused));
    }
}
