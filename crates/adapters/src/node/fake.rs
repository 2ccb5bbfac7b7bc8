// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Fake lock node for testing
#![cfg_attr(coverage_nightly, coverage(off))]

use super::{LockNode, MemoryNode, NodeError};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use uniq_core::{FakeClock, OwnerToken};

/// Recorded node call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeCall {
    SetIfAbsent {
        key: String,
        token: OwnerToken,
        ttl: Duration,
    },
    DeleteIfOwner {
        key: String,
        token: OwnerToken,
    },
    ExtendIfOwner {
        key: String,
        token: OwnerToken,
        ttl: Duration,
    },
    ForceDelete {
        key: String,
    },
    DeletePrefix {
        prefix: String,
    },
}

/// Fake lock node for testing
///
/// Real lock semantics from a [`MemoryNode`] on a [`FakeClock`], plus call
/// recording, simulated outages and added latency.
#[derive(Clone)]
pub struct FakeLockNode {
    inner: MemoryNode<FakeClock>,
    calls: Arc<Mutex<Vec<NodeCall>>>,
    unreachable: Arc<AtomicBool>,
    latency: Arc<Mutex<Duration>>,
}

impl FakeLockNode {
    pub fn new(name: impl Into<String>, clock: FakeClock) -> Self {
        Self {
            inner: MemoryNode::with_clock(name, clock),
            calls: Arc::new(Mutex::new(Vec::new())),
            unreachable: Arc::new(AtomicBool::new(false)),
            latency: Arc::new(Mutex::new(Duration::ZERO)),
        }
    }

    /// `count` nodes named `node-1..` sharing one clock
    pub fn cluster(count: usize, clock: &FakeClock) -> Vec<Self> {
        (1..=count)
            .map(|i| Self::new(format!("node-{i}"), clock.clone()))
            .collect()
    }

    /// Get all recorded calls
    pub fn calls(&self) -> Vec<NodeCall> {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }

    /// Make every call fail with `NodeError::Unreachable` until reset
    pub fn set_unreachable(&self, unreachable: bool) {
        self.unreachable.store(unreachable, Ordering::SeqCst);
    }

    /// Delay every answer by `latency` (real tokio time)
    pub fn set_latency(&self, latency: Duration) {
        *self.latency.lock().unwrap_or_else(|e| e.into_inner()) = latency;
    }

    pub fn holder(&self, key: &str) -> Option<OwnerToken> {
        self.inner.holder(key)
    }

    pub fn keys(&self) -> Vec<String> {
        self.inner.keys()
    }

    /// Plant a lock held by someone else, bypassing call recording
    pub fn hold(&self, key: &str, token: &OwnerToken, ttl: Duration) -> bool {
        self.inner.try_set(key, token, ttl)
    }

    async fn answer(&self, call: NodeCall) -> Result<(), NodeError> {
        self.calls
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(call);

        let latency = *self.latency.lock().unwrap_or_else(|e| e.into_inner());
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if self.unreachable.load(Ordering::SeqCst) {
            return Err(NodeError::Unreachable(self.inner.name().to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl LockNode for FakeLockNode {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn set_if_absent(
        &self,
        key: &str,
        token: &OwnerToken,
        ttl: Duration,
    ) -> Result<bool, NodeError> {
        self.answer(NodeCall::SetIfAbsent {
            key: key.to_string(),
            token: token.clone(),
            ttl,
        })
        .await?;
        Ok(self.inner.try_set(key, token, ttl))
    }

    async fn delete_if_owner(&self, key: &str, token: &OwnerToken) -> Result<bool, NodeError> {
        self.answer(NodeCall::DeleteIfOwner {
            key: key.to_string(),
            token: token.clone(),
        })
        .await?;
        Ok(self.inner.try_delete(key, token))
    }

    async fn extend_if_owner(
        &self,
        key: &str,
        token: &OwnerToken,
        ttl: Duration,
    ) -> Result<bool, NodeError> {
        self.answer(NodeCall::ExtendIfOwner {
            key: key.to_string(),
            token: token.clone(),
            ttl,
        })
        .await?;
        Ok(self.inner.try_extend(key, token, ttl))
    }

    async fn force_delete(&self, key: &str) -> Result<bool, NodeError> {
        self.answer(NodeCall::ForceDelete {
            key: key.to_string(),
        })
        .await?;
        Ok(self.inner.remove(key))
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, NodeError> {
        self.answer(NodeCall::DeletePrefix {
            prefix: prefix.to_string(),
        })
        .await?;
        Ok(self.inner.remove_prefix(prefix))
    }
}

#[cfg(test)]
#[path = "fake_tests.rs"]
mod tests;
