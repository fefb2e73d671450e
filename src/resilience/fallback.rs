//! Fallback decorator: try a primary geocoder, then a secondary one.

use std::sync::Arc;

use futures_util::FutureExt;

use crate::geocoder::{GeocodeError, Geocoder, SearchFuture, SearchOptions};
use crate::observability::metrics;

/// Chains exactly two geocoders so the secondary covers the primary's gaps.
///
/// The secondary runs when the primary finds nothing or fails. A primary
/// failure is logged and swallowed; the caller only sees an error if the
/// secondary fails too. Cancellation is never treated as a failure to
/// cover for.
pub struct Fallback {
    name: String,
    primary: Arc<dyn Geocoder>,
    secondary: Arc<dyn Geocoder>,
}

impl Fallback {
    pub fn new(primary: Arc<dyn Geocoder>, secondary: Arc<dyn Geocoder>) -> Self {
        let name = format!("{}>{}", primary.name(), secondary.name());
        Self {
            name,
            primary,
            secondary,
        }
    }
}

impl Geocoder for Fallback {
    fn name(&self) -> &str {
        &self.name
    }

    fn search<'a>(&'a self, query: &'a str, opts: &'a SearchOptions) -> SearchFuture<'a> {
        async move {
            match self.primary.search(query, opts).await {
                Ok(Some(address)) => return Ok(Some(address)),
                Ok(None) => {
                    tracing::debug!(
                        primary = %self.primary.name(),
                        secondary = %self.secondary.name(),
                        query = %query,
                        "Primary found nothing, trying secondary"
                    );
                }
                Err(GeocodeError::Cancelled) => return Err(GeocodeError::Cancelled),
                Err(e) => {
                    tracing::warn!(
                        primary = %self.primary.name(),
                        secondary = %self.secondary.name(),
                        error = %e,
                        "Primary failed, trying secondary"
                    );
                }
            }

            metrics::record_fallback(self.primary.name());
            opts.ensure_active()?;
            self.secondary.search(query, opts).await
        }
        .boxed()
    }
}
