//! OpenCage Data adapter.

use futures_util::FutureExt;
use reqwest::Client;
use serde::Deserialize;

use crate::geocoder::{Address, Geocoder, PlaceType, SearchFuture, SearchOptions};
use crate::providers::{endpoint, fetch_json};

#[derive(Debug, Deserialize)]
pub(crate) struct Response {
    #[serde(default)]
    results: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    formatted: String,
    /// 0 (unknown or very large area) to 10 (building).
    #[serde(default)]
    confidence: Option<f64>,
    #[serde(default)]
    components: Components,
}

#[derive(Debug, Default, Deserialize)]
struct Components {
    #[serde(rename = "_type", default)]
    kind: Option<String>,
    country: Option<String>,
    #[serde(rename = "ISO_3166-1_alpha-2")]
    iso_code: Option<String>,
    country_code: Option<String>,
    state: Option<String>,
    city: Option<String>,
    town: Option<String>,
}

pub struct OpenCageGeocoder {
    name: String,
    search_url: String,
    api_key: String,
    client: Client,
}

impl OpenCageGeocoder {
    pub fn new(name: &str, base_url: &str, api_key: String, client: Client) -> Self {
        Self {
            name: name.to_string(),
            search_url: endpoint(base_url, "geocode/v1/json"),
            api_key,
            client,
        }
    }
}

impl Geocoder for OpenCageGeocoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn search<'a>(&'a self, query: &'a str, opts: &'a SearchOptions) -> SearchFuture<'a> {
        async move {
            let request = self.client.get(&self.search_url).query(&[
                ("q", query),
                ("key", self.api_key.as_str()),
                ("limit", "1"),
                ("no_annotations", "1"),
            ]);

            let response: Response = fetch_json(&self.name, request, opts).await?;
            let address = to_address(query, response);
            tracing::debug!(provider = %self.name, query = %query, found = address.is_some(), "OpenCage search finished");
            Ok(address)
        }
        .boxed()
    }
}

pub(crate) fn to_address(query: &str, response: Response) -> Option<Address> {
    let result = response.results.into_iter().next()?;
    let components = result.components;
    let confidence = result.confidence.unwrap_or(0.0).clamp(0.0, 10.0) / 10.0;

    let mut address = Address::new(
        query,
        result.formatted,
        PlaceType::from_label(components.kind.as_deref().unwrap_or("")),
        confidence,
    );
    if let (Some(country), Some(code)) = (
        components.country,
        components.country_code.or(components.iso_code),
    ) {
        address = address.with_country(country, code);
    }
    if let Some(state) = components.state {
        address = address.with_state(state);
    }
    if let Some(city) = components.city.or(components.town) {
        address = address.with_city(city);
    }
    Some(address)
}
