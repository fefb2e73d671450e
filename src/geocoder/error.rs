//! Error taxonomy for the geocoder pipeline.
//!
//! "Not found" is not an error: it is `Ok(None)`. Everything here is a
//! genuine failure that a caller may want to retry, back off from, or report.

use std::fmt::{Display, Formatter};
use std::time::Duration;

use thiserror::Error;

/// Classification of a provider failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderErrorKind {
    /// Connection, DNS or TLS failure.
    Transport,
    /// Non-success HTTP status other than the rate-limit statuses.
    Status(u16),
    /// The response body could not be decoded.
    Parse,
    /// The provider refused the request (HTTP 403/429).
    RateLimited,
}

impl Display for ProviderErrorKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Transport => f.write_str("transport"),
            Self::Status(code) => write!(f, "status {code}"),
            Self::Parse => f.write_str("parse"),
            Self::RateLimited => f.write_str("rate limited"),
        }
    }
}

/// Failure reported by a provider adapter.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("provider '{provider}' failed ({kind}): {message}")]
pub struct ProviderError {
    pub provider: String,
    pub kind: ProviderErrorKind,
    pub message: String,
}

impl ProviderError {
    pub fn new(
        provider: impl Into<String>,
        kind: ProviderErrorKind,
        message: impl Into<String>,
    ) -> Self {
        Self {
            provider: provider.into(),
            kind,
            message: message.into(),
        }
    }

    /// Map an HTTP status onto the matching kind. 403 and 429 both mean the
    /// provider is refusing us, not that the place does not exist.
    pub fn from_status(provider: impl Into<String>, status: u16) -> Self {
        let kind = match status {
            403 | 429 => ProviderErrorKind::RateLimited,
            other => ProviderErrorKind::Status(other),
        };
        Self::new(provider, kind, format!("unexpected HTTP status {status}"))
    }

    pub fn is_rate_limited(&self) -> bool {
        self.kind == ProviderErrorKind::RateLimited
    }
}

/// Errors surfaced by [`Geocoder::search`](super::Geocoder::search).
///
/// `Clone` so that one deduplicated outcome can be delivered to every waiter.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeocodeError {
    #[error("request cancelled")]
    Cancelled,

    #[error(transparent)]
    Provider(#[from] ProviderError),

    #[error("queue for provider '{provider}' is full ({load}/{max})")]
    QueueFull {
        provider: String,
        load: usize,
        max: usize,
    },

    #[error("provider '{provider}' timed out after {after:?}")]
    Timeout { provider: String, after: Duration },

    #[error("at least one provider is required")]
    NoProviders,

    #[error("internal error: {0}")]
    Internal(String),
}

impl GeocodeError {
    /// Short stable label for metrics and logs.
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Cancelled => "cancelled",
            Self::Provider(_) => "provider_error",
            Self::QueueFull { .. } => "queue_full",
            Self::Timeout { .. } => "timeout",
            Self::NoProviders => "no_providers",
            Self::Internal(_) => "internal",
        }
    }
}

/// Failure of a cache tier. Logged and counted, never returned to callers.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
