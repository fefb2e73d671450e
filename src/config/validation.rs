//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (capacities > 0, throttle windows complete)
//! - Check provider identity (present, unique names, credentials where required)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: GeocodeConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::collections::HashSet;

use thiserror::Error;
use url::Url;

use crate::config::schema::{GeocodeConfig, ProviderKind};

/// A single semantic problem, tagged with the offending field.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

pub fn validate_config(config: &GeocodeConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.cache.capacity == 0 {
        errors.push(ValidationError::new("cache.capacity", "must be greater than 0"));
    }
    if config.balancer.max_queue_size == 0 {
        errors.push(ValidationError::new(
            "balancer.max_queue_size",
            "must be greater than 0",
        ));
    }
    if config.balancer.concurrency == Some(0) {
        errors.push(ValidationError::new(
            "balancer.concurrency",
            "must be greater than 0 when set",
        ));
    }

    if config.providers.is_empty() {
        errors.push(ValidationError::new(
            "providers",
            "at least one provider is required",
        ));
    }

    let mut seen = HashSet::new();
    for (i, provider) in config.providers.iter().enumerate() {
        let field = |name: &str| format!("providers[{i}].{name}");

        if provider.name.trim().is_empty() {
            errors.push(ValidationError::new(field("name"), "must not be empty"));
        } else if !seen.insert(provider.name.as_str()) {
            errors.push(ValidationError::new(
                field("name"),
                format!("duplicate provider name '{}'", provider.name),
            ));
        }

        if let Err(e) = Url::parse(&provider.base_url) {
            errors.push(ValidationError::new(
                field("base_url"),
                format!("invalid URL '{}': {e}", provider.base_url),
            ));
        }

        if provider.kind == ProviderKind::Opencage
            && provider.api_key.as_deref().map_or(true, |key| key.trim().is_empty())
        {
            errors.push(ValidationError::new(
                field("api_key"),
                "required for opencage providers",
            ));
        }

        let throttle = &provider.throttle;
        if throttle.concurrency == Some(0) {
            errors.push(ValidationError::new(
                field("throttle.concurrency"),
                "must be greater than 0 when set",
            ));
        }
        match (throttle.interval_cap, throttle.interval_ms) {
            (None, None) => {}
            (Some(cap), Some(ms)) if cap > 0 && ms > 0 => {}
            _ => errors.push(ValidationError::new(
                field("throttle"),
                "interval_cap and interval_ms must both be set and greater than 0",
            )),
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
