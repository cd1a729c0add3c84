//! In-memory backend for unit tests.
//!
//! Mirrors the per-command atomicity of the real backend: every
//! `RedisOps` call takes the single store lock once, so interleavings
//! between concurrent tasks happen only at command boundaries, exactly
//! as with Redis.

use crate::backend::{HashWrite, RedisOps};
use crate::error::StoreResult;
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

#[derive(Debug, Default)]
struct Inner {
    hashes: HashMap<String, HashMap<String, String>>,
    sets: HashMap<String, HashSet<String>>,
    published: Vec<(String, String)>,
    batched: Vec<HashWrite>,
}

/// Shared in-memory store.
#[derive(Clone, Debug, Default)]
pub struct MemoryBackend {
    inner: Arc<Mutex<Inner>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages published so far, as (channel, payload).
    pub fn published(&self) -> Vec<(String, String)> {
        self.inner.lock().published.clone()
    }

    /// Direct hash read for assertions.
    pub fn hash_field(&self, key: &str, field: &str) -> Option<String> {
        self.inner
            .lock()
            .hashes
            .get(key)
            .and_then(|h| h.get(field).cloned())
    }

    /// All writes applied through `run_atomic`, in application order.
    pub fn batched_writes(&self) -> Vec<HashWrite> {
        self.inner.lock().batched.clone()
    }

    /// Seed a hash field directly, bypassing the command surface.
    pub fn seed_hash_field(&self, key: &str, field: &str, value: &str) {
        self.inner
            .lock()
            .hashes
            .entry(key.to_string())
            .or_default()
            .insert(field.to_string(), value.to_string());
    }
}

impl RedisOps for MemoryBackend {
    async fn hash_get(&self, key: &str, field: &str) -> StoreResult<Option<String>> {
        Ok(self.hash_field(key, field))
    }

    async fn hash_get_many(&self, key: &str, fields: &[&str]) -> StoreResult<Vec<Option<String>>> {
        let inner = self.inner.lock();
        let hash = inner.hashes.get(key);
        Ok(fields
            .iter()
            .map(|f| hash.and_then(|h| h.get(*f).cloned()))
            .collect())
    }

    async fn hash_set(&self, key: &str, entries: &[(String, String)]) -> StoreResult<()> {
        let mut inner = self.inner.lock();
        let hash = inner.hashes.entry(key.to_string()).or_default();
        for (field, value) in entries {
            hash.insert(field.clone(), value.clone());
        }
        Ok(())
    }

    async fn hash_set_if_absent(&self, key: &str, field: &str, value: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock();
        let hash = inner.hashes.entry(key.to_string()).or_default();
        if hash.contains_key(field) {
            Ok(false)
        } else {
            hash.insert(field.to_string(), value.to_string());
            Ok(true)
        }
    }

    async fn hash_delete(&self, key: &str, fields: &[&str]) -> StoreResult<u64> {
        let mut inner = self.inner.lock();
        let Some(hash) = inner.hashes.get_mut(key) else {
            return Ok(0);
        };
        let mut removed = 0;
        for field in fields {
            if hash.remove(*field).is_some() {
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn hash_increment(&self, key: &str, field: &str, by: i64) -> StoreResult<i64> {
        let mut inner = self.inner.lock();
        let hash = inner.hashes.entry(key.to_string()).or_default();
        let current: i64 = hash.get(field).and_then(|v| v.parse().ok()).unwrap_or(0);
        let next = current + by;
        hash.insert(field.to_string(), next.to_string());
        Ok(next)
    }

    async fn hash_get_all(&self, key: &str) -> StoreResult<HashMap<String, String>> {
        Ok(self.inner.lock().hashes.get(key).cloned().unwrap_or_default())
    }

    async fn set_add(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock();
        Ok(inner
            .sets
            .entry(key.to_string())
            .or_default()
            .insert(member.to_string()))
    }

    async fn set_remove(&self, key: &str, member: &str) -> StoreResult<bool> {
        let mut inner = self.inner.lock();
        Ok(inner
            .sets
            .get_mut(key)
            .is_some_and(|set| set.remove(member)))
    }

    async fn set_members(&self, key: &str) -> StoreResult<HashSet<String>> {
        Ok(self.inner.lock().sets.get(key).cloned().unwrap_or_default())
    }

    async fn publish(&self, channel: &str, payload: &str) -> StoreResult<()> {
        self.inner
            .lock()
            .published
            .push((channel.to_string(), payload.to_string()));
        Ok(())
    }

    async fn run_atomic(&self, writes: &[HashWrite]) -> StoreResult<()> {
        // One lock over the whole batch mirrors MULTI/EXEC.
        let mut inner = self.inner.lock();
        for write in writes {
            match write {
                HashWrite::Set { key, entries } => {
                    let hash = inner.hashes.entry(key.clone()).or_default();
                    for (field, value) in entries {
                        hash.insert(field.clone(), value.clone());
                    }
                }
                HashWrite::Delete { key, fields } => {
                    if let Some(hash) = inner.hashes.get_mut(key) {
                        for field in fields {
                            hash.remove(field);
                        }
                    }
                }
            }
            inner.batched.push(write.clone());
        }
        Ok(())
    }
}
