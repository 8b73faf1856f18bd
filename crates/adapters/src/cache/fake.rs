// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake Cache for deterministic testing. TTLs are recorded but never
//! expired automatically — tests that need expiry assert on it directly
//! via `ttl_of`.

use super::Cache;
use async_trait::async_trait;
use cp_core::AdapterError;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone)]
pub enum CacheCall {
    Get { key: String },
    Set { key: String },
    Delete { key: String },
    SetNx { key: String, won: bool },
}

#[derive(Clone)]
pub struct FakeCache {
    inner: Arc<Mutex<FakeCacheState>>,
}

#[derive(Default)]
struct FakeCacheState {
    strings: HashMap<String, Vec<u8>>,
    sets: HashMap<String, Vec<String>>,
    hashes: HashMap<String, Vec<(String, Vec<u8>)>>,
    lists: HashMap<String, Vec<Vec<u8>>>,
    ttls: HashMap<String, Duration>,
    calls: Vec<CacheCall>,
}

impl Default for FakeCache {
    fn default() -> Self {
        Self::new()
    }
}

impl FakeCache {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(FakeCacheState::default())),
        }
    }

    pub fn calls(&self) -> Vec<CacheCall> {
        self.inner.lock().calls.clone()
    }

    pub fn ttl_of(&self, key: &str) -> Option<Duration> {
        self.inner.lock().ttls.get(key).copied()
    }
}

#[async_trait]
impl Cache for FakeCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AdapterError> {
        let mut inner = self.inner.lock();
        inner.calls.push(CacheCall::Get { key: key.to_string() });
        Ok(inner.strings.get(key).cloned())
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), AdapterError> {
        let mut inner = self.inner.lock();
        inner.calls.push(CacheCall::Set { key: key.to_string() });
        inner.strings.insert(key.to_string(), value);
        if let Some(ttl) = ttl {
            inner.ttls.insert(key.to_string(), ttl);
        }
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), AdapterError> {
        let mut inner = self.inner.lock();
        inner.calls.push(CacheCall::Delete { key: key.to_string() });
        inner.strings.remove(key);
        inner.ttls.remove(key);
        Ok(())
    }

    async fn set_nx(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<bool, AdapterError> {
        let mut inner = self.inner.lock();
        let won = !inner.strings.contains_key(key);
        if won {
            inner.strings.insert(key.to_string(), value);
            inner.ttls.insert(key.to_string(), ttl);
        }
        inner.calls.push(CacheCall::SetNx { key: key.to_string(), won });
        Ok(won)
    }

    async fn sadd(&self, set_key: &str, member: &str) -> Result<(), AdapterError> {
        let mut inner = self.inner.lock();
        let members = inner.sets.entry(set_key.to_string()).or_default();
        if !members.iter().any(|m| m == member) {
            members.push(member.to_string());
        }
        Ok(())
    }

    async fn srem(&self, set_key: &str, member: &str) -> Result<(), AdapterError> {
        let mut inner = self.inner.lock();
        if let Some(members) = inner.sets.get_mut(set_key) {
            members.retain(|m| m != member);
        }
        Ok(())
    }

    async fn smembers(&self, set_key: &str) -> Result<Vec<String>, AdapterError> {
        let inner = self.inner.lock();
        Ok(inner.sets.get(set_key).cloned().unwrap_or_default())
    }

    async fn hset(&self, hash_key: &str, field: &str, value: Vec<u8>) -> Result<(), AdapterError> {
        let mut inner = self.inner.lock();
        let fields = inner.hashes.entry(hash_key.to_string()).or_default();
        if let Some(entry) = fields.iter_mut().find(|(f, _)| f == field) {
            entry.1 = value;
        } else {
            fields.push((field.to_string(), value));
        }
        Ok(())
    }

    async fn hdel(&self, hash_key: &str, field: &str) -> Result<(), AdapterError> {
        let mut inner = self.inner.lock();
        if let Some(fields) = inner.hashes.get_mut(hash_key) {
            fields.retain(|(f, _)| f != field);
        }
        Ok(())
    }

    async fn hget(&self, hash_key: &str, field: &str) -> Result<Option<Vec<u8>>, AdapterError> {
        let inner = self.inner.lock();
        Ok(inner
            .hashes
            .get(hash_key)
            .and_then(|fields| fields.iter().find(|(f, _)| f == field).map(|(_, v)| v.clone())))
    }

    async fn hgetall(&self, hash_key: &str) -> Result<Vec<(String, Vec<u8>)>, AdapterError> {
        let inner = self.inner.lock();
        Ok(inner.hashes.get(hash_key).cloned().unwrap_or_default())
    }

    async fn rpush(&self, list_key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), AdapterError> {
        let mut inner = self.inner.lock();
        inner.lists.entry(list_key.to_string()).or_default().push(value);
        if let Some(ttl) = ttl {
            inner.ttls.insert(list_key.to_string(), ttl);
        }
        Ok(())
    }

    async fn lrange(&self, list_key: &str, start: isize, stop: isize) -> Result<Vec<Vec<u8>>, AdapterError> {
        let inner = self.inner.lock();
        let list = inner.lists.get(list_key).cloned().unwrap_or_default();
        let len = list.len() as isize;
        let norm = |i: isize| -> isize {
            if i < 0 {
                (len + i).max(0)
            } else {
                i.min(len)
            }
        };
        let (s, e) = (norm(start), norm(stop));
        if s > e || s >= len {
            return Ok(Vec::new());
        }
        Ok(list[s as usize..=(e.min(len - 1)) as usize].to_vec())
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
