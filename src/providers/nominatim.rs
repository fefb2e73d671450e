//! OpenStreetMap Nominatim adapter.

use futures_util::FutureExt;
use reqwest::header::USER_AGENT;
use reqwest::Client;
use serde::Deserialize;

use crate::geocoder::{Address, Geocoder, PlaceType, SearchFuture, SearchOptions};
use crate::providers::{endpoint, fetch_json};

#[derive(Debug, Deserialize)]
pub(crate) struct Place {
    #[serde(default)]
    name: Option<String>,
    display_name: String,
    #[serde(default)]
    addresstype: Option<String>,
    #[serde(default, rename = "type")]
    kind: Option<String>,
    #[serde(default)]
    importance: Option<f64>,
    #[serde(default)]
    address: Option<PlaceAddress>,
}

#[derive(Debug, Default, Deserialize)]
struct PlaceAddress {
    country: Option<String>,
    country_code: Option<String>,
    state: Option<String>,
    city: Option<String>,
    town: Option<String>,
    village: Option<String>,
}

pub struct NominatimGeocoder {
    name: String,
    search_url: String,
    user_agent: String,
    client: Client,
}

impl NominatimGeocoder {
    pub fn new(name: &str, base_url: &str, user_agent: &str, client: Client) -> Self {
        Self {
            name: name.to_string(),
            search_url: endpoint(base_url, "search"),
            user_agent: user_agent.to_string(),
            client,
        }
    }
}

impl Geocoder for NominatimGeocoder {
    fn name(&self) -> &str {
        &self.name
    }

    fn search<'a>(&'a self, query: &'a str, opts: &'a SearchOptions) -> SearchFuture<'a> {
        async move {
            let request = self
                .client
                .get(&self.search_url)
                .header(USER_AGENT, &self.user_agent)
                .query(&[
                    ("q", query),
                    ("format", "jsonv2"),
                    ("addressdetails", "1"),
                    ("limit", "1"),
                ]);

            let places: Vec<Place> = fetch_json(&self.name, request, opts).await?;
            let address = places.into_iter().next().map(|place| to_address(query, place));
            tracing::debug!(provider = %self.name, query = %query, found = address.is_some(), "Nominatim search finished");
            Ok(address)
        }
        .boxed()
    }
}

pub(crate) fn to_address(query: &str, place: Place) -> Address {
    let label = place.addresstype.as_deref().or(place.kind.as_deref()).unwrap_or("");
    let name = place.display_name;
    let mut address = Address::new(
        query,
        name,
        PlaceType::from_label(label),
        place.importance.unwrap_or(0.0),
    );

    let details = place.address.unwrap_or_default();
    if let (Some(country), Some(code)) = (details.country, details.country_code) {
        address = address.with_country(country, code);
    }
    if let Some(state) = details.state {
        address = address.with_state(state);
    }
    if let Some(city) = details.city.or(details.town).or(details.village) {
        address = address.with_city(city);
    } else if address.kind == PlaceType::City {
        if let Some(name) = place.name {
            address = address.with_city(name);
        }
    }
    address
}
