// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Redis-backed Cache adapter.

use super::Cache;
use async_trait::async_trait;
use cp_core::AdapterError;
use redis::aio::ConnectionManager;
use redis::AsyncCommands;
use std::time::Duration;

#[derive(Clone)]
pub struct RedisCache {
    conn: ConnectionManager,
}

impl RedisCache {
    pub async fn connect(url: &str) -> Result<Self, AdapterError> {
        let client = redis::Client::open(url)
            .map_err(|e| AdapterError::invalid(format!("invalid redis url {url}: {e}")))?;
        let conn = client
            .get_connection_manager()
            .await
            .map_err(|e| AdapterError::unavailable(format!("redis connect to {url}: {e}")))?;
        Ok(Self { conn })
    }

    fn map_err(context: &str, e: redis::RedisError) -> AdapterError {
        if e.is_timeout() {
            AdapterError::timeout(format!("{context}: {e}"))
        } else if e.is_connection_dropped() || e.is_io_error() {
            AdapterError::unavailable(format!("{context}: {e}"))
        } else {
            AdapterError::invalid(format!("{context}: {e}"))
        }
    }
}

#[async_trait]
impl Cache for RedisCache {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, AdapterError> {
        let mut conn = self.conn.clone();
        conn.get(key).await.map_err(|e| Self::map_err("get", e))
    }

    async fn set(&self, key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), AdapterError> {
        let mut conn = self.conn.clone();
        match ttl {
            Some(ttl) => conn
                .set_ex::<_, _, ()>(key, value, ttl.as_secs().max(1))
                .await
                .map_err(|e| Self::map_err("set_ex", e)),
            None => conn.set::<_, _, ()>(key, value).await.map_err(|e| Self::map_err("set", e)),
        }
    }

    async fn delete(&self, key: &str) -> Result<(), AdapterError> {
        let mut conn = self.conn.clone();
        conn.del::<_, ()>(key).await.map_err(|e| Self::map_err("del", e))
    }

    async fn set_nx(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<bool, AdapterError> {
        let mut conn = self.conn.clone();
        let opts = redis::SetOptions::default()
            .conditional_set(redis::ExistenceCheck::NX)
            .with_expiration(redis::SetExpiry::EX(ttl.as_secs().max(1) as usize));
        let result: Option<String> = conn
            .set_options(key, value, opts)
            .await
            .map_err(|e| Self::map_err("set_nx", e))?;
        Ok(result.is_some())
    }

    async fn sadd(&self, set_key: &str, member: &str) -> Result<(), AdapterError> {
        let mut conn = self.conn.clone();
        conn.sadd::<_, _, ()>(set_key, member).await.map_err(|e| Self::map_err("sadd", e))
    }

    async fn srem(&self, set_key: &str, member: &str) -> Result<(), AdapterError> {
        let mut conn = self.conn.clone();
        conn.srem::<_, _, ()>(set_key, member).await.map_err(|e| Self::map_err("srem", e))
    }

    async fn smembers(&self, set_key: &str) -> Result<Vec<String>, AdapterError> {
        let mut conn = self.conn.clone();
        conn.smembers(set_key).await.map_err(|e| Self::map_err("smembers", e))
    }

    async fn hset(&self, hash_key: &str, field: &str, value: Vec<u8>) -> Result<(), AdapterError> {
        let mut conn = self.conn.clone();
        conn.hset::<_, _, _, ()>(hash_key, field, value).await.map_err(|e| Self::map_err("hset", e))
    }

    async fn hdel(&self, hash_key: &str, field: &str) -> Result<(), AdapterError> {
        let mut conn = self.conn.clone();
        conn.hdel::<_, _, ()>(hash_key, field).await.map_err(|e| Self::map_err("hdel", e))
    }

    async fn hget(&self, hash_key: &str, field: &str) -> Result<Option<Vec<u8>>, AdapterError> {
        let mut conn = self.conn.clone();
        conn.hget(hash_key, field).await.map_err(|e| Self::map_err("hget", e))
    }

    async fn hgetall(&self, hash_key: &str) -> Result<Vec<(String, Vec<u8>)>, AdapterError> {
        let mut conn = self.conn.clone();
        conn.hgetall(hash_key).await.map_err(|e| Self::map_err("hgetall", e))
    }

    async fn rpush(&self, list_key: &str, value: Vec<u8>, ttl: Option<Duration>) -> Result<(), AdapterError> {
        let mut conn = self.conn.clone();
        conn.rpush::<_, _, ()>(list_key, value).await.map_err(|e| Self::map_err("rpush", e))?;
        if let Some(ttl) = ttl {
            conn.expire::<_, ()>(list_key, ttl.as_secs() as i64)
                .await
                .map_err(|e| Self::map_err("expire", e))?;
        }
        Ok(())
    }

    async fn lrange(&self, list_key: &str, start: isize, stop: isize) -> Result<Vec<Vec<u8>>, AdapterError> {
        let mut conn = self.conn.clone();
        conn.lrange(list_key, start, stop)
            .await
            .map_err(|e| Self::map_err("lrange", e))
    }
}
