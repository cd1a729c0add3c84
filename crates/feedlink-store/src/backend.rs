//! Redis command surface used by the store.
//!
//! Each trait method maps to exactly one Redis command. Redis executes
//! commands one at a time, so every method call is atomic with respect
//! to concurrent writers in any process; the ownership protocol is
//! built entirely on that guarantee and needs no distributed lock.

use crate::error::StoreResult;
use redis::AsyncCommands;
use std::collections::{HashMap, HashSet};
use std::future::Future;

/// Single-command Redis operations.
pub trait RedisOps: Send + Sync {
    /// HGET.
    fn hash_get(
        &self,
        key: &str,
        field: &str,
    ) -> impl Future<Output = StoreResult<Option<String>>> + Send;

    /// HMGET.
    fn hash_get_many(
        &self,
        key: &str,
        fields: &[&str],
    ) -> impl Future<Output = StoreResult<Vec<Option<String>>>> + Send;

    /// HSET with multiple field/value pairs.
    fn hash_set(
        &self,
        key: &str,
        entries: &[(String, String)],
    ) -> impl Future<Output = StoreResult<()>> + Send;

    /// HSETNX; returns true if the field was absent and is now set.
    fn hash_set_if_absent(
        &self,
        key: &str,
        field: &str,
        value: &str,
    ) -> impl Future<Output = StoreResult<bool>> + Send;

    /// HDEL; returns the number of fields removed.
    fn hash_delete(
        &self,
        key: &str,
        fields: &[&str],
    ) -> impl Future<Output = StoreResult<u64>> + Send;

    /// HINCRBY; returns the new value.
    fn hash_increment(
        &self,
        key: &str,
        field: &str,
        by: i64,
    ) -> impl Future<Output = StoreResult<i64>> + Send;

    /// HGETALL.
    fn hash_get_all(
        &self,
        key: &str,
    ) -> impl Future<Output = StoreResult<HashMap<String, String>>> + Send;

    /// SADD; returns true if the member was newly added.
    fn set_add(&self, key: &str, member: &str) -> impl Future<Output = StoreResult<bool>> + Send;

    /// SREM; returns true if the member was present.
    fn set_remove(&self, key: &str, member: &str)
        -> impl Future<Output = StoreResult<bool>> + Send;

    /// SMEMBERS.
    fn set_members(&self, key: &str) -> impl Future<Output = StoreResult<HashSet<String>>> + Send;

    /// PUBLISH.
    fn publish(&self, channel: &str, payload: &str)
        -> impl Future<Output = StoreResult<()>> + Send;

    /// MULTI/EXEC over the given writes, preserving their order.
    fn run_atomic(&self, writes: &[HashWrite]) -> impl Future<Output = StoreResult<()>> + Send;
}

/// One hash write inside an atomic batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashWrite {
    Set {
        key: String,
        entries: Vec<(String, String)>,
    },
    Delete {
        key: String,
        fields: Vec<String>,
    },
}

/// Production backend over a multiplexed, auto-reconnecting connection.
///
/// Cheap to clone; the pool is shared across every arbiter, registry,
/// and status store in the process.
#[derive(Clone)]
pub struct RedisBackend {
    conn: redis::aio::ConnectionManager,
}

impl RedisBackend {
    /// Connect to Redis at the given URL.
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = client.get_connection_manager().await?;
        Ok(Self { conn })
    }

    /// Round-trip PING; used as the health probe for the Redis link.
    pub async fn ping(&self) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        redis::cmd("PING").query_async::<()>(&mut conn).await?;
        Ok(())
    }
}

impl RedisOps for RedisBackend {
    async fn hash_get(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.hget(key, field).await?)
    }

    async fn hash_get_many(&self, key: &str, fields: &[&str]) -> StoreResult<Vec<Option<String>>> {
        let mut conn = self.conn.clone();
        Ok(conn.hget(key, fields.to_vec()).await?)
    }

    async fn hash_set(&self, key: &str, entries: &[(String, String)]) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        conn.hset_multiple::<_, _, _, ()>(key, entries).await?;
        Ok(())
    }

    async fn hash_set_if_absent(&self, key: &str, field: &str, value: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        Ok(conn.hset_nx(key, field, value).await?)
    }

    async fn hash_delete(&self, key: &str, fields: &[&str]) -> StoreResult<u64> {
        let mut conn = self.conn.clone();
        Ok(conn.hdel(key, fields.to_vec()).await?)
    }

    async fn hash_increment(&self, key: &str, field: &str, by: i64) -> StoreResult<i64> {
        let mut conn = self.conn.clone();
        Ok(conn.hincr(key, field, by).await?)
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        let mut conn = self.conn.clone();
        Ok(conn.hgetall(key).await?)
    }

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let added: i64 = conn.sadd(key, member).await?;
        Ok(added > 0)
    }

    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut conn = self.conn.clone();
        let removed: i64 = conn.srem(key, member).await?;
        Ok(removed > 0)
    }

    async fn set_members(&self, key: &str) -> StoreResult<HashSet<String>> {
        let mut conn = self.conn.clone();
        Ok(conn.smembers(key).await?)
    }

    async fn publish(&self, channel: &str, payload: &str) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        conn.publish::<_, _, ()>(channel, payload).await?;
        Ok(())
    }

    async fn run_atomic(&self, writes: &[HashWrite]) -> StoreResult<()> {
        let mut conn = self.conn.clone();
        let mut pipe = redis::pipe();
        pipe.atomic();
        for write in writes {
            match write {
                HashWrite::Set { key, entries } => {
                    pipe.hset_multiple(key, entries).ignore();
                }
                HashWrite::Delete { key, fields } => {
                    pipe.hdel(key, fields).ignore();
                }
            }
        }
        pipe.query_async::<()>(&mut conn).await?;
        Ok(())
    }
}
