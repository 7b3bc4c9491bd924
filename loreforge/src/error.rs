//! Error types for generation and response parsing.

use std::time::Duration;

/// Errors that can occur while talking to the generation backend.
///
/// Most variants describe a single failed attempt and are retried by the
/// client up to its configured limit. [`GenerationError::DnsFailure`] is the
/// exception: a hostname that does not resolve is a configuration error, so
/// the retry loop aborts immediately. [`GenerationError::RetriesExhausted`]
/// is the terminal error raised once every attempt has failed.
#[derive(Debug, thiserror::Error)]
pub enum GenerationError {
    /// The backend refused the TCP connection.
    #[error("connection refused by {url}")]
    ConnectionRefused {
        /// Backend base URL.
        url: String,
    },

    /// The backend hostname could not be resolved. Not retried.
    #[error("DNS resolution failed for {url}")]
    DnsFailure {
        /// Backend base URL.
        url: String,
    },

    /// The request did not complete within the per-attempt timeout.
    #[error("request to {url} timed out after {timeout:?}")]
    Timeout {
        /// Backend base URL.
        url: String,
        /// Configured per-attempt timeout.
        timeout: Duration,
    },

    /// The backend reported HTTP 404 for the configured model.
    #[error("model '{model}' not found at {url}")]
    ModelNotFound {
        /// Model identifier that was requested.
        model: String,
        /// Backend base URL.
        url: String,
    },

    /// The backend returned a non-success status other than 404.
    #[error("backend returned HTTP {status}: {message}")]
    Backend {
        /// HTTP status code.
        status: u16,
        /// Response body, as far as it could be read.
        message: String,
    },

    /// The response body was not the expected JSON shape.
    #[error("invalid response structure from backend: {0}")]
    InvalidBody(String),

    /// The response body parsed but carried a zero-length completion.
    #[error("empty response from backend")]
    EmptyResponse,

    /// Any other transport-level failure.
    #[error("request failed: {0}")]
    RequestFailed(String),

    /// Every attempt failed.
    #[error(
        "generation failed after {attempts} attempts against {url} (model '{model}'): {last_error}"
    )]
    RetriesExhausted {
        /// Number of attempts that were made.
        attempts: u32,
        /// Backend base URL.
        url: String,
        /// Model identifier that was requested.
        model: String,
        /// Message of the last underlying failure.
        last_error: String,
    },
}

impl GenerationError {
    /// Whether this error should abort the retry loop instead of being
    /// retried like a transient failure.
    #[inline]
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::DnsFailure { .. })
    }
}

/// Errors that can occur while extracting and repairing JSON from a raw
/// response.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    /// No JSON-shaped substring was found anywhere in the response text.
    ///
    /// Propagates without any repair attempt; the caller must apply its own
    /// fallback content.
    #[error("no JSON structure found in response for {caller}")]
    NoJsonFound {
        /// Label of the generation task that produced the text.
        caller: String,
    },

    /// Every repair pass failed and emergency extraction produced nothing.
    #[error("all JSON repair passes failed for {caller}; response began: {snippet:?}")]
    RepairsExhausted {
        /// Label of the generation task that produced the text.
        caller: String,
        /// First 200 characters of the raw response, for diagnostics.
        snippet: String,
    },
}

impl ParseError {
    /// Creates a repairs-exhausted error, truncating the raw response to its
    /// first 200 characters.
    pub fn repairs_exhausted(caller: impl Into<String>, raw: &str) -> Self {
        Self::RepairsExhausted {
            caller: caller.into(),
            snippet: raw.chars().take(200).collect(),
        }
    }
}
