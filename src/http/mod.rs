//! HTTP front door.
//!
//! # Data Flow
//! ```text
//! TCP connection
//!     → server.rs (Axum router, trace span with request ID, timeout)
//!     → handlers.rs (validate query, attach cancellation)
//!     → Pipeline::search
//!     → handlers.rs (map outcome onto status + JSON body)
//!     → Send to client
//! ```
//!
//! # Design Decisions
//! - A client disconnect drops the handler future, which cancels the search
//!   for that client only
//! - "Not found" (404) and upstream failure (5xx) stay distinguishable

pub mod handlers;
pub mod server;

pub use server::{AppState, HttpServer};
