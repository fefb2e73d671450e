//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a provider:
//!     → throttler.rs (admit into the provider's queue)
//!     → queue.rs (wait for concurrency permit and rate budget, enforce timeout)
//!     → provider adapter
//!
//! Provider failed or found nothing:
//!     → fallback.rs (hand the same query to the next geocoder)
//! ```
//!
//! # Design Decisions
//! - Timeouts are distinct errors, never folded into provider failures
//! - Cancellation is checked before admission and again on dequeue
//! - Fallback never covers for cancellation
//! - All decorators implement `Geocoder`, so they nest freely

pub mod fallback;
pub mod queue;
pub mod throttler;

pub use fallback::Fallback;
pub use queue::{Admission, QueueSettings, RateCap, WorkQueue};
pub use throttler::Throttler;
