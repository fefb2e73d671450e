//! Geocoder decorator pipeline.
//!
//! Resolves free-form text into standardized addresses through a stack of
//! composable decorators over HTTP geocoding providers.
//!
//! # Architecture Overview
//!
//! ```text
//!     GET /search?q=…
//!  ───────────────────▶ http ──▶ Pipeline
//!                                  │
//!                                  ▼
//!                           ┌─────────────┐   memory LRU ─▶ durable file
//!                           │    cache    │   pending registry (dedup)
//!                           └──────┬──────┘
//!                                  ▼
//!                           ┌─────────────┐   least load, admission control
//!                           │load_balancer│
//!                           └──────┬──────┘
//!                                  ▼
//!                   provider[i] ─▶ Fallback ─▶ peers in index order
//!                                  │
//!                                  ▼
//!                           ┌─────────────┐   concurrency, rate, timeout
//!                           │  Throttler  │
//!                           └──────┬──────┘
//!                                  ▼
//!                           providers (Nominatim, OpenCage)
//!
//!   Cross-cutting: config, observability, lifecycle
//! ```

// Core capability
pub mod geocoder;

// Decorators
pub mod cache;
pub mod load_balancer;
pub mod resilience;

// Upstreams and assembly
pub mod pipeline;
pub mod providers;

// Front door and cross-cutting concerns
pub mod config;
pub mod http;
pub mod lifecycle;
pub mod observability;

pub use cache::CachedGeocoder;
pub use config::GeocodeConfig;
pub use geocoder::{Address, CancellationToken, GeocodeError, Geocoder, SearchOptions};
pub use http::HttpServer;
pub use lifecycle::Shutdown;
pub use load_balancer::LoadBalancer;
pub use pipeline::Pipeline;
