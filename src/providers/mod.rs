//! HTTP adapters for upstream geocoding services.
//!
//! # Data Flow
//! ```text
//! search(query)
//!     → cancelled already? → RequestCancelled
//!     → GET provider endpoint (shared reqwest::Client)
//!     → status check: 403/429 → RateLimited, other non-2xx → Status
//!     → decode JSON → first result → Address
//!     ← Ok(Some) | Ok(None) for an empty result list
//! ```
//!
//! # Design Decisions
//! - One `reqwest::Client` shared by every adapter (connection pooling)
//! - Once the request is sent it runs to completion; cancellation is only
//!   checked before sending
//! - Mapping from wire types to `Address` is a pure function per provider

pub mod nominatim;
pub mod opencage;

use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;

use crate::config::{ProviderConfig, ProviderKind};
use crate::geocoder::{GeocodeError, Geocoder, ProviderError, ProviderErrorKind, SearchOptions};

pub use nominatim::NominatimGeocoder;
pub use opencage::OpenCageGeocoder;

/// Shared HTTP client for provider adapters.
pub fn http_client(timeout: Duration) -> Result<Client, reqwest::Error> {
    Client::builder().timeout(timeout).build()
}

/// Build the adapter described by `config`.
pub fn build_provider(config: &ProviderConfig, client: Client) -> Arc<dyn Geocoder> {
    match config.kind {
        ProviderKind::Nominatim => Arc::new(NominatimGeocoder::new(
            &config.name,
            &config.base_url,
            &config.user_agent,
            client,
        )),
        ProviderKind::Opencage => Arc::new(OpenCageGeocoder::new(
            &config.name,
            &config.base_url,
            config.api_key.clone().unwrap_or_default(),
            client,
        )),
    }
}

/// Send `request` and decode a JSON body, classifying every failure.
pub(crate) async fn fetch_json<T: DeserializeOwned>(
    provider: &str,
    request: RequestBuilder,
    opts: &SearchOptions,
) -> Result<T, GeocodeError> {
    opts.ensure_active()?;

    let response = request
        .send()
        .await
        .map_err(|e| ProviderError::new(provider, ProviderErrorKind::Transport, e.to_string()))?;

    let status = response.status();
    if !status.is_success() {
        tracing::warn!(provider = %provider, status = status.as_u16(), "Provider returned error status");
        return Err(ProviderError::from_status(provider, status.as_u16()).into());
    }

    let body = response
        .bytes()
        .await
        .map_err(|e| ProviderError::new(provider, ProviderErrorKind::Transport, e.to_string()))?;

    serde_json::from_slice(&body).map_err(|e| {
        ProviderError::new(
            provider,
            ProviderErrorKind::Parse,
            format!("failed to decode response: {e}"),
        )
        .into()
    })
}

pub(crate) fn endpoint(base_url: &str, path: &str) -> String {
    format!("{}/{}", base_url.trim_end_matches('/'), path.trim_start_matches('/'))
}
