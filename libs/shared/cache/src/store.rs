use std::time::Duration;

use async_trait::async_trait;
use serde::{de::DeserializeOwned, Serialize};

use crate::error::CacheError;

/// Key-value store with per-key expiry. Used for OTP state and short-lived
/// response caching; never as a lock.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, CacheError>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<(), CacheError>;

    /// Atomically set `key` only when it does not exist. Returns whether it was set.
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> Result<bool, CacheError>;

    async fn delete(&self, key: &str) -> Result<(), CacheError>;

    /// Increment a counter. A counter created by this call expires after `ttl`;
    /// an existing counter keeps its original expiry.
    async fn incr(&self, key: &str, ttl: Duration) -> Result<i64, CacheError>;

    /// Remaining lifetime, `None` when the key is missing or never expires.
    async fn ttl(&self, key: &str) -> Result<Option<Duration>, CacheError>;
}

#[async_trait]
pub trait CacheStoreExt: CacheStore {
    async fn get_json<V>(&self, key: &str) -> Result<Option<V>, CacheError>
    where
        V: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
            None => Ok(None),
        }
    }

    async fn set_json<V>(&self, key: &str, value: &V, ttl: Duration) -> Result<(), CacheError>
    where
        V: Serialize + Sync,
    {
        let raw = serde_json::to_string(value)?;
        self.set(key, &raw, ttl).await
    }
}

impl<S: CacheStore + ?Sized> CacheStoreExt for S {}
