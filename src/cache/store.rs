//! Storage contract for cache tiers.

use std::time::Duration;

use futures_util::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::geocoder::{Address, StorageError};

/// What the cache remembers for a query.
///
/// `NotFound` is the negative sentinel: the query was resolved and nothing
/// exists. It is distinct from the key being absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "address", rename_all = "snake_case")]
pub enum CachedResult {
    Found(Address),
    NotFound,
}

impl CachedResult {
    pub fn into_option(self) -> Option<Address> {
        match self {
            Self::Found(address) => Some(address),
            Self::NotFound => None,
        }
    }

    pub fn is_negative(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

impl From<Option<Address>> for CachedResult {
    fn from(value: Option<Address>) -> Self {
        match value {
            Some(address) => Self::Found(address),
            None => Self::NotFound,
        }
    }
}

/// A durable key-value tier behind the in-memory cache.
pub trait CacheStore: Send + Sync + 'static {
    /// `Ok(None)` means the key is absent (or expired).
    fn get<'a>(&'a self, key: &'a str)
        -> BoxFuture<'a, Result<Option<CachedResult>, StorageError>>;

    /// Store `value`; `ttl = None` keeps it forever.
    fn set<'a>(
        &'a self,
        key: &'a str,
        value: CachedResult,
        ttl: Option<Duration>,
    ) -> BoxFuture<'a, Result<(), StorageError>>;
}
