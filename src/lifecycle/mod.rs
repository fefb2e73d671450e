//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! SIGTERM/SIGINT (wait_for_signal)
//!     → Shutdown::trigger
//!     → every subscriber (HTTP server) stops accepting and drains
//! ```
//!
//! # Design Decisions
//! - One broadcast channel; any number of tasks can subscribe
//! - In-flight searches are not cancelled by shutdown; the server drains them

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
pub use signals::wait_for_signal;
