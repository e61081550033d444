//! Narrow boundary to the text-generation provider.
//!
//! The HTTP client itself lives outside this crate. It reports each finished
//! call as a [`Generation`] or an [`UpstreamError`], and
//! [`UpstreamError::classify`] turns the error into the retry tag the
//! executor branches on.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::resilience::Failure;

/// Result of one completed upstream call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Generation<V> {
    pub value: V,
    /// Generation units the provider billed for the call.
    pub units: u64,
}

impl<V> Generation<V> {
    pub fn new(value: V, units: u64) -> Self {
        Self { value, units }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpstreamErrorKind {
    Timeout,
    Network,
    Status,
    MalformedResponse,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("upstream {kind:?} error{}: {message}", status.map(|s| format!(" (HTTP {s})")).unwrap_or_default())]
pub struct UpstreamError {
    pub kind: UpstreamErrorKind,
    pub status: Option<u16>,
    pub message: String,
}

impl UpstreamError {
    pub fn timeout(message: impl Into<String>) -> Self {
        Self {
            kind: UpstreamErrorKind::Timeout,
            status: None,
            message: message.into(),
        }
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self {
            kind: UpstreamErrorKind::Network,
            status: None,
            message: message.into(),
        }
    }

    pub fn status(status: u16, message: impl Into<String>) -> Self {
        Self {
            kind: UpstreamErrorKind::Status,
            status: Some(status),
            message: message.into(),
        }
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self {
            kind: UpstreamErrorKind::MalformedResponse,
            status: None,
            message: message.into(),
        }
    }

    /// Timeouts, connection failures, 429 and 5xx may succeed on a later
    /// attempt. Other statuses and malformed bodies will not.
    pub fn is_retryable(&self) -> bool {
        match self.kind {
            UpstreamErrorKind::Timeout | UpstreamErrorKind::Network => true,
            UpstreamErrorKind::Status => matches!(self.status, Some(429 | 500..=599)),
            UpstreamErrorKind::MalformedResponse => false,
        }
    }

    pub fn classify(self) -> Failure<Self> {
        if self.is_retryable() {
            Failure::Retryable(self)
        } else {
            Failure::Fatal(self)
        }
    }
}

impl From<UpstreamError> for Failure<UpstreamError> {
    fn from(error: UpstreamError) -> Self {
        error.classify()
    }
}
