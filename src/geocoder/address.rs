//! Canonical address produced by provider adapters.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};

/// Category of a resolved place.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlaceType {
    Continent,
    Country,
    State,
    County,
    City,
    Suburb,
    Street,
    Address,
    Poi,
    #[serde(other)]
    Other,
}

impl PlaceType {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Continent => "continent",
            Self::Country => "country",
            Self::State => "state",
            Self::County => "county",
            Self::City => "city",
            Self::Suburb => "suburb",
            Self::Street => "street",
            Self::Address => "address",
            Self::Poi => "poi",
            Self::Other => "other",
        }
    }

    /// Map a provider's free-form category label onto a place type.
    pub fn from_label(label: &str) -> Self {
        match label.to_ascii_lowercase().as_str() {
            "continent" => Self::Continent,
            "country" => Self::Country,
            "state" | "province" | "region" => Self::State,
            "county" | "state_district" => Self::County,
            "city" | "town" | "village" | "hamlet" | "municipality" => Self::City,
            "suburb" | "neighbourhood" | "quarter" | "city_district" => Self::Suburb,
            "road" | "street" => Self::Street,
            "building" | "house" | "address" => Self::Address,
            "poi" | "amenity" | "attraction" => Self::Poi,
            _ => Self::Other,
        }
    }
}

impl Display for PlaceType {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A standardized address. Passed through every decorator unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Address {
    /// The query this address was resolved from.
    pub source: String,
    /// Human-readable formatted address.
    pub name: String,
    #[serde(rename = "type")]
    pub kind: PlaceType,
    /// Provider-defined score, typically within 0..=1.
    pub confidence: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

impl Address {
    pub fn new(
        source: impl Into<String>,
        name: impl Into<String>,
        kind: PlaceType,
        confidence: f64,
    ) -> Self {
        Self {
            source: source.into(),
            name: name.into(),
            kind,
            confidence: if confidence.is_finite() { confidence } else { 0.0 },
            country: None,
            country_code: None,
            state: None,
            city: None,
        }
    }

    pub fn with_country(mut self, country: impl Into<String>, code: impl Into<String>) -> Self {
        self.country = Some(country.into());
        self.country_code = Some(code.into().to_ascii_uppercase());
        self
    }

    pub fn with_state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn with_city(mut self, city: impl Into<String>) -> Self {
        self.city = Some(city.into());
        self
    }
}
