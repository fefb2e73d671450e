//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Decorators and adapters produce:
//!     → logging.rs (structured tracing events)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (plain or JSON lines)
//!     → Prometheus scrape endpoint
//! ```
//!
//! # Design Decisions
//! - Counters are updated inline at state transitions, no event emitters
//! - Metric updates are no-ops until a recorder is installed, so library
//!   users and tests pay nothing
//! - `RUST_LOG` overrides the configured log level

pub mod logging;
pub mod metrics;
