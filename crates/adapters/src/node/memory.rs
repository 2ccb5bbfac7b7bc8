// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! In-process lock node

use super::{LockNode, NodeError};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};
use uniq_core::{Clock, OwnerToken, SystemClock};

#[derive(Debug, Clone)]
struct Entry {
    token: OwnerToken,
    expires_at: Instant,
}

/// Lock node backed by a map in this process
///
/// Clones share the same map. Expiry is evaluated lazily against the clock, so
/// an entry past its TTL behaves exactly like a missing key.
#[derive(Clone)]
pub struct MemoryNode<C: Clock = SystemClock> {
    name: String,
    clock: C,
    entries: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryNode<SystemClock> {
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_clock(name, SystemClock)
    }
}

impl<C: Clock> MemoryNode<C> {
    pub fn with_clock(name: impl Into<String>, clock: C) -> Self {
        Self {
            name: name.into(),
            clock,
            entries: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Current holder of `key`, if the lock has not expired
    pub fn holder(&self, key: &str) -> Option<OwnerToken> {
        let now = self.clock.now();
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .get(key)
            .filter(|entry| entry.expires_at > now)
            .map(|entry| entry.token.clone())
    }

    /// Live keys, sorted
    pub fn keys(&self) -> Vec<String> {
        let now = self.clock.now();
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| entry.expires_at > now)
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        keys
    }

    pub(crate) fn try_set(&self, key: &str, token: &OwnerToken, ttl: Duration) -> bool {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        if entries.get(key).is_some_and(|entry| entry.expires_at > now) {
            return false;
        }
        entries.insert(
            key.to_string(),
            Entry {
                token: token.clone(),
                expires_at: now + ttl,
            },
        );
        true
    }

    pub(crate) fn try_delete(&self, key: &str, token: &OwnerToken) -> bool {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get(key) {
            Some(entry) if entry.token == *token && entry.expires_at > now => {
                entries.remove(key);
                true
            }
            _ => false,
        }
    }

    pub(crate) fn try_extend(&self, key: &str, token: &OwnerToken, ttl: Duration) -> bool {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        match entries.get_mut(key) {
            Some(entry) if entry.token == *token && entry.expires_at > now => {
                entry.expires_at = now + ttl;
                true
            }
            _ => false,
        }
    }

    pub(crate) fn remove(&self, key: &str) -> bool {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries
            .remove(key)
            .is_some_and(|entry| entry.expires_at > now)
    }

    pub(crate) fn remove_prefix(&self, prefix: &str) -> u64 {
        let now = self.clock.now();
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        let before = entries.len();
        let mut live_removed = 0;
        entries.retain(|key, entry| {
            if !key.starts_with(prefix) {
                return true;
            }
            if entry.expires_at > now {
                live_removed += 1;
            }
            false
        });
        tracing::trace!(prefix, scanned = before, removed = live_removed, "prefix sweep");
        live_removed
    }
}

#[async_trait]
impl<C: Clock> LockNode for MemoryNode<C> {
    fn name(&self) -> &str {
        &self.name
    }

    async fn set_if_absent(
        &self,
        key: &str,
        token: &OwnerToken,
        ttl: Duration,
    ) -> Result<bool, NodeError> {
        Ok(self.try_set(key, token, ttl))
    }

    async fn delete_if_owner(&self, key: &str, token: &OwnerToken) -> Result<bool, NodeError> {
        Ok(self.try_delete(key, token))
    }

    async fn extend_if_owner(
        &self,
        key: &str,
        token: &OwnerToken,
        ttl: Duration,
    ) -> Result<bool, NodeError> {
        Ok(self.try_extend(key, token, ttl))
    }

    async fn force_delete(&self, key: &str) -> Result<bool, NodeError> {
        Ok(self.remove(key))
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, NodeError> {
        Ok(self.remove_prefix(prefix))
    }
}

#[cfg(test)]
#[path = "memory_tests.rs"]
mod tests;
