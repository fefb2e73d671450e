//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → GeocodeConfig (validated, immutable)
//!     → pipeline::build / HttpServer / observability
//! ```
//!
//! # Design Decisions
//! - Config is immutable once loaded; changes require a restart
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{
    BalancerConfig, CacheConfig, GeocodeConfig, ObservabilityConfig, ProviderConfig,
    ProviderKind, ServerConfig, ThrottleConfig,
};
pub use validation::{validate_config, ValidationError};
