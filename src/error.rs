//! Error types for mfnav
//!
//! Only the network boundary and configuration loading can fail. Malformed
//! NAV rows and empty time windows are not errors; they degrade to unknown
//! values and empty views respectively.

use thiserror::Error;

/// Errors raised while fetching JSON from the upstream NAV API.
///
/// Each variant knows whether another attempt could succeed, see
/// [`FetchError::is_retryable`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// Upstream answered with a non-success HTTP status.
    #[error("HTTP error! status: {status}")]
    Status { status: u16 },

    /// Connection could not be established or was dropped.
    #[error("Network error: {0}")]
    Network(String),

    /// The attempt did not complete within the per-request timeout.
    #[error("Request timed out: {url}")]
    Timeout { url: String },

    /// The body was not the JSON shape we expected.
    #[error("Failed to decode response: {0}")]
    Decode(String),

    /// The HTTP client could not be set up, e.g. no usable TLS backend.
    #[error("Failed to build HTTP client: {0}")]
    Client(String),

    /// Every allowed attempt failed; `last` is the final attempt's error.
    #[error("Giving up after {attempts} attempt(s): {last}")]
    Exhausted {
        attempts: u32,
        last: Box<FetchError>,
    },
}

impl FetchError {
    /// Network failures, timeouts, rate limiting and server errors are worth
    /// another attempt. Client errors and undecodable bodies are not.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Network(_) | Self::Timeout { .. } => true,
            Self::Status { status } => *status == 429 || *status >= 500,
            Self::Client(_) | Self::Decode(_) | Self::Exhausted { .. } => false,
        }
    }
}

impl From<reqwest::Error> for FetchError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            FetchError::Timeout {
                url: e.url().map(|u| u.to_string()).unwrap_or_default(),
            }
        } else if e.is_decode() {
            FetchError::Decode(e.to_string())
        } else if let Some(status) = e.status() {
            FetchError::Status {
                status: status.as_u16(),
            }
        } else {
            FetchError::Network(e.to_string())
        }
    }
}

/// Errors for invalid user-supplied settings.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown time window: '{0}' (expected one of 1M, 3M, 6M, 1Y, 2Y, 5Y, MAX)")]
    UnknownWindow(String),

    #[error("Unknown chart style: '{0}' (expected line or bar)")]
    UnknownChartStyle(String),

    #[error("Invalid scheme code: '{0}'")]
    InvalidSchemeCode(String),
}
