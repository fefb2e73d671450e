//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the service.
//! All types derive Serde traits for deserialization from config files.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::cache::CacheSettings;
use crate::load_balancer::{BalancerSettings, DEFAULT_MAX_QUEUE_SIZE};
use crate::resilience::{QueueSettings, RateCap};

/// Root configuration for the geocoding service.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct GeocodeConfig {
    /// HTTP front door.
    pub server: ServerConfig,

    /// Memory and durable cache tiers.
    pub cache: CacheConfig,

    /// Load balancer admission and per-provider queue.
    pub balancer: BalancerConfig,

    /// Upstream providers, in fallback order.
    pub providers: Vec<ProviderConfig>,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,

    /// Whole-request timeout in seconds.
    pub request_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
            request_timeout_secs: 30,
        }
    }
}

/// Cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Maximum entries held in memory.
    pub capacity: usize,

    /// Entry lifetime. Omit to keep entries until evicted.
    pub ttl_secs: Option<u64>,

    /// Optional JSON file for the durable tier.
    pub file_path: Option<String>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            capacity: 10_000,
            ttl_secs: None,
            file_path: None,
        }
    }
}

impl CacheConfig {
    pub fn settings(&self) -> CacheSettings {
        CacheSettings {
            capacity: self.capacity,
            ttl: self.ttl_secs.map(Duration::from_secs),
        }
    }
}

/// Load balancer configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BalancerConfig {
    /// Reject a request once the chosen provider has this many queued + in flight.
    pub max_queue_size: usize,

    /// Simultaneous calls per provider slot.
    pub concurrency: Option<usize>,

    /// Per-call timeout in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl Default for BalancerConfig {
    fn default() -> Self {
        Self {
            max_queue_size: DEFAULT_MAX_QUEUE_SIZE,
            concurrency: None,
            timeout_ms: None,
        }
    }
}

impl BalancerConfig {
    pub fn settings(&self) -> BalancerSettings {
        BalancerSettings {
            max_queue_size: self.max_queue_size,
            queue: QueueSettings {
                concurrency: self.concurrency,
                rate: None,
                timeout: self.timeout_ms.map(Duration::from_millis),
            },
        }
    }
}

/// Supported upstream services.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ProviderKind {
    Nominatim,
    Opencage,
}

/// One upstream provider.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProviderConfig {
    /// Unique identifier used in logs, metrics and errors.
    pub name: String,

    pub kind: ProviderKind,

    /// Service root, e.g. "https://nominatim.openstreetmap.org".
    pub base_url: String,

    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Required by OpenCage.
    #[serde(default)]
    pub api_key: Option<String>,

    /// Throttling applied directly in front of this provider.
    #[serde(default)]
    pub throttle: ThrottleConfig,
}

fn default_user_agent() -> String {
    concat!("geocode-pipeline/", env!("CARGO_PKG_VERSION")).to_string()
}

/// Per-provider throttle. Everything unset means unthrottled.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct ThrottleConfig {
    /// Simultaneous in-flight calls.
    pub concurrency: Option<usize>,

    /// Calls allowed per `interval_ms`.
    pub interval_cap: Option<u32>,

    pub interval_ms: Option<u64>,

    /// Per-call timeout in milliseconds.
    pub timeout_ms: Option<u64>,
}

impl ThrottleConfig {
    pub fn settings(&self) -> QueueSettings {
        let rate = match (self.interval_cap, self.interval_ms) {
            (Some(cap), Some(ms)) => Some(RateCap {
                cap,
                interval: Duration::from_millis(ms),
            }),
            _ => None,
        };
        QueueSettings {
            concurrency: self.concurrency,
            rate,
            timeout: self.timeout_ms.map(Duration::from_millis),
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Emit logs as JSON lines.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
