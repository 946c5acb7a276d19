//! TTL cache and in-flight read table.
//!
//! Both maps live in one [`CacheState`] behind a single lock so that the
//! hit check, the join check and the registration of a new read happen
//! atomically for a key.

use std::collections::HashMap;
use std::time::Duration;

use futures_util::future::{BoxFuture, Shared};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use warden_core::{elapsed_between, CoordinatorError, Timestamp};

/// A read that every caller for the same key awaits.
pub(crate) type SharedRead = Shared<BoxFuture<'static, Result<Value, CoordinatorError>>>;

/// A successful read, stored wholesale and never mutated.
#[derive(Debug, Clone)]
pub(crate) struct CacheEntry {
    pub value: Value,
    pub stored_at: Timestamp,
}

impl CacheEntry {
    /// Entries expire once their age reaches the TTL.
    pub fn is_fresh(&self, now: Timestamp, ttl: Duration) -> bool {
        elapsed_between(self.stored_at, now) < ttl
    }
}

/// Cache statistics for monitoring.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct CacheStats {
    /// Lookups served from a fresh entry.
    pub hits: u64,
    /// Lookups that started a new remote read.
    pub misses: u64,
    /// Lookups that joined a read already in flight.
    pub joined: u64,
    /// Entries currently stored, expired ones included.
    pub entry_count: u64,
    /// Reads currently in flight.
    pub pending_count: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0) over all lookups.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses + self.joined;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

/// Outcome of looking up a key under the lock.
pub(crate) enum Lookup {
    Hit(Value),
    Join(SharedRead),
    Miss,
}

#[derive(Default)]
pub(crate) struct CacheState {
    entries: HashMap<String, CacheEntry>,
    pending: HashMap<String, SharedRead>,
    hits: u64,
    misses: u64,
    joined: u64,
}

impl CacheState {
    /// Check for a fresh entry, then for a read in flight. Counts the outcome.
    pub fn lookup(&mut self, key: &str, now: Timestamp, ttl: Duration) -> Lookup {
        if let Some(entry) = self.entries.get(key) {
            if entry.is_fresh(now, ttl) {
                self.hits += 1;
                return Lookup::Hit(entry.value.clone());
            }
        }
        if let Some(read) = self.pending.get(key) {
            self.joined += 1;
            return Lookup::Join(read.clone());
        }
        self.misses += 1;
        Lookup::Miss
    }

    pub fn register(&mut self, key: String, read: SharedRead) {
        self.pending.insert(key, read);
    }

    /// Clear the in-flight entry and, on success, store the value.
    pub fn settle(&mut self, key: &str, result: &Result<Value, CoordinatorError>, now: Timestamp) {
        self.pending.remove(key);
        if let Ok(value) = result {
            self.entries.insert(
                key.to_string(),
                CacheEntry {
                    value: value.clone(),
                    stored_at: now,
                },
            );
        }
    }

    /// Drop an in-flight entry without storing anything.
    pub fn abandon(&mut self, key: &str) {
        self.pending.remove(key);
    }

    /// Remove entries whose key contains `pattern`, or every entry when
    /// `pattern` is `None`. In-flight reads are left alone.
    pub fn invalidate(&mut self, pattern: Option<&str>) -> usize {
        let before = self.entries.len();
        match pattern {
            None => self.entries.clear(),
            Some(pattern) => self.entries.retain(|key, _| !key.contains(pattern)),
        }
        before - self.entries.len()
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            joined: self.joined,
            entry_count: self.entries.len() as u64,
            pending_count: self.pending.len() as u64,
        }
    }
}
