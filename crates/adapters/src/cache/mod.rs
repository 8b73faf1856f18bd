// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Cache adapter: the hot-path key-value store backing the active-worker
//! set, progress snapshots, and claim leases (§4.1, §6).

mod redis_cache;

pub use redis_cache::RedisCache;

#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{CacheCall, FakeCache};

use async_trait::async_trait;
use cp_core::AdapterError;
use std::time::Duration;

/// Adapter for the hot cache. Every write that needs bounded lifetime
/// takes an explicit TTL; the adapter never infers one.
#[async_trait]
pub trait Cache: Clone + Send + Sync + 'static {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AdapterError>;

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), AdapterError>;

    async fn delete(&self, key: &str) -> Result<(), AdapterError>;

    /// Set `key` to `value` only if it does not already exist, returning
    /// whether this call won the race. Used for claim leases (§8 scenario
    /// 6: broadcast task claiming via `setNX`).
    async fn set_nx(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<bool, AdapterError>;

    async fn sadd(&self, set_key: &str, member: &str) -> Result<(), AdapterError>;
    async fn srem(&self, set_key: &str, member: &str) -> Result<(), AdapterError>;
    async fn smembers(&self, set_key: &str) -> Result<Vec<String>, AdapterError>;

    async fn hset(&self, hash_key: &str, field: &str, value: Vec<u8>) -> Result<(), AdapterError>;
    async fn hdel(&self, hash_key: &str, field: &str) -> Result<(), AdapterError>;
    async fn hget(&self, hash_key: &str, field: &str) -> Result<Option<Vec<u8>>, AdapterError>;
    async fn hgetall(&self, hash_key: &str) -> Result<Vec<(String, Vec<u8>)>, AdapterError>;

    async fn rpush(&self, list_key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), AdapterError>;
    async fn lrange(&self, list_key: &str, start: isize, stop: isize) -> Result<Vec<Vec<u8>>, AdapterError>;
}

#[cfg(test)]
#[path = "mod_tests.rs"]
mod tests;
