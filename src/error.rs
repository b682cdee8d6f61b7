// src/error.rs
//! Failure taxonomy shared by every external call in the pipeline.
//!
//! The variant decides control flow: only `RetryableTransport` is re-attempted
//! by [`crate::retry::RetryPolicy`]; everything else short-circuits.

use std::time::Duration;

use reqwest::header::{HeaderMap, RETRY_AFTER};
use reqwest::StatusCode;

#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    /// Timeouts, connection errors, 5xx and 429.
    #[error("transport error: {message}")]
    RetryableTransport {
        message: String,
        /// Minimum wait requested by the upstream (429 / Retry-After).
        retry_after: Option<Duration>,
    },

    /// 4xx other than 429, authentication failures, malformed requests.
    #[error("request rejected: {0}")]
    FatalRequest(String),

    /// The call succeeded but the body did not match the expected shape.
    #[error("invalid response: {0}")]
    InvalidResponse(String),

    #[error("persistence failure: {0}")]
    Persistence(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Configuration(String),
}

pub type Result<T> = std::result::Result<T, PipelineError>;

impl PipelineError {
    pub fn transport(message: impl Into<String>) -> Self {
        Self::RetryableTransport {
            message: message.into(),
            retry_after: None,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::RetryableTransport { .. })
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RetryableTransport { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    /// Short stable label, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::RetryableTransport { .. } => "retryable_transport",
            Self::FatalRequest(_) => "fatal_request",
            Self::InvalidResponse(_) => "invalid_response",
            Self::Persistence(_) => "persistence",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Classify a non-success HTTP status. `body` is only used for the message.
    pub fn from_status(status: StatusCode, retry_after: Option<Duration>, body: &str) -> Self {
        let snippet: String = body.chars().take(200).collect();
        let message = format!("HTTP {status}: {snippet}");
        match status.as_u16() {
            408 | 429 => Self::RetryableTransport {
                message,
                retry_after,
            },
            s if s >= 500 => Self::RetryableTransport {
                message,
                retry_after,
            },
            401 | 403 => Self::FatalRequest(format!("authentication failed ({message})")),
            _ => Self::FatalRequest(message),
        }
    }
}

impl From<reqwest::Error> for PipelineError {
    fn from(e: reqwest::Error) -> Self {
        if let Some(status) = e.status() {
            return Self::from_status(status, None, &e.to_string());
        }
        if e.is_decode() {
            Self::InvalidResponse(e.to_string())
        } else if e.is_builder() {
            Self::FatalRequest(e.to_string())
        } else {
            // timeout, connect, request, body, redirect
            Self::transport(e.to_string())
        }
    }
}

/// Parse `Retry-After` given in seconds. HTTP-date values are ignored.
pub fn retry_after_from_headers(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}
