//! External key-value cache with per-key expiry.
//!
//! The catalog only needs `get`, `set` with a TTL and `delete`. The
//! in-memory implementation is used when no shared store is configured
//! and in tests.

use crate::error::RegistryResult;
use dashmap::DashMap;
use std::time::{Duration, Instant};
use tickerhub_core::BoxFuture;

/// Key-value store with expiring entries.
pub trait TtlCache: Send + Sync {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, RegistryResult<Option<String>>>;

    fn set<'a>(
        &'a self,
        key: &'a str,
        value: String,
        ttl: Duration,
    ) -> BoxFuture<'a, RegistryResult<()>>;

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, RegistryResult<()>>;
}

#[derive(Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// Process-local `TtlCache`. Expired entries are dropped lazily on read.
#[derive(Debug, Default)]
pub struct InMemoryTtlCache {
    entries: DashMap<String, Entry>,
}

impl InMemoryTtlCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, including expired ones not yet read.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn get_sync(&self, key: &str) -> Option<String> {
        let now = Instant::now();
        let value = self
            .entries
            .get(key)
            .filter(|e| e.expires_at > now)
            .map(|e| e.value.clone());
        if value.is_none() {
            self.entries.remove_if(key, |_, e| e.expires_at <= now);
        }
        value
    }
}

impl TtlCache for InMemoryTtlCache {
    fn get<'a>(&'a self, key: &'a str) -> BoxFuture<'a, RegistryResult<Option<String>>> {
        Box::pin(async move { Ok(self.get_sync(key)) })
    }

    fn set<'a>(
        &'a self,
        key: &'a str,
        value: String,
        ttl: Duration,
    ) -> BoxFuture<'a, RegistryResult<()>> {
        Box::pin(async move {
            self.entries.insert(
                key.to_string(),
                Entry {
                    value,
                    expires_at: Instant::now() + ttl,
                },
            );
            Ok(())
        })
    }

    fn delete<'a>(&'a self, key: &'a str) -> BoxFuture<'a, RegistryResult<()>> {
        Box::pin(async move {
            self.entries.remove(key);
            Ok(())
        })
    }
}
