//! Geocoder capability shared by every provider and decorator.
//!
//! # Data Flow
//! ```text
//! caller
//!     → search(query, SearchOptions { cancellation })
//!     → decorator chain (cache → load balancer → fallback → throttler)
//!     → provider adapter (HTTP call)
//!     ← Ok(Some(Address)) | Ok(None) | Err(GeocodeError)
//! ```
//!
//! # Design Decisions
//! - One operation, uniform across providers and decorators, so any
//!   decorator can wrap any other
//! - `Ok(None)` is "not found" and never an error
//! - Decorators hold `Arc<dyn Geocoder>` and compose by wrapping

pub mod address;
pub mod cancel;
pub mod error;

use std::future::Future;
use std::sync::Arc;

use futures_util::future::BoxFuture;

pub use address::{Address, PlaceType};
pub use cancel::{CancellationToken, DropGuard};
pub use error::{GeocodeError, ProviderError, ProviderErrorKind, StorageError};

/// Result of a single search: `Ok(None)` means the query resolved to nothing.
pub type SearchResult = Result<Option<Address>, GeocodeError>;

/// Boxed future returned by [`Geocoder::search`].
pub type SearchFuture<'a> = BoxFuture<'a, SearchResult>;

/// Per-call options.
#[derive(Debug, Clone, Default)]
pub struct SearchOptions {
    /// Fires when the caller no longer wants the result.
    pub cancellation: Option<CancellationToken>,
}

impl SearchOptions {
    pub fn with_cancellation(token: CancellationToken) -> Self {
        Self {
            cancellation: Some(token),
        }
    }

    /// True once the caller's token (if any) has fired.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(CancellationToken::is_cancelled)
    }

    /// Fail fast with [`GeocodeError::Cancelled`] if the token has fired.
    pub fn ensure_active(&self) -> Result<(), GeocodeError> {
        if self.is_cancelled() {
            Err(GeocodeError::Cancelled)
        } else {
            Ok(())
        }
    }

    /// Drive `fut` to completion unless the caller's token fires first.
    pub async fn race<F: Future>(&self, fut: F) -> Result<F::Output, GeocodeError> {
        match &self.cancellation {
            Some(token) => tokio::select! {
                biased;
                _ = token.cancelled() => Err(GeocodeError::Cancelled),
                output = fut => Ok(output),
            },
            None => Ok(fut.await),
        }
    }
}

/// Resolves free-form text into a standardized address.
pub trait Geocoder: Send + Sync + 'static {
    /// Identifier used in logs, metrics and error reports.
    fn name(&self) -> &str;

    /// Resolve `query`, honouring the cancellation in `opts`.
    fn search<'a>(&'a self, query: &'a str, opts: &'a SearchOptions) -> SearchFuture<'a>;
}

impl<G: Geocoder + ?Sized> Geocoder for Arc<G> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn search<'a>(&'a self, query: &'a str, opts: &'a SearchOptions) -> SearchFuture<'a> {
        (**self).search(query, opts)
    }
}
