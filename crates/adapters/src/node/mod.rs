// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock node adapters
//!
//! A lock node is one independent key/value backend offering atomic
//! set-if-absent, compare-and-delete and compare-and-extend. The quorum client
//! talks to several of them and never assumes they share state.

mod memory;

pub use memory::MemoryNode;

// Test support - only compiled for tests or when explicitly requested
#[cfg(any(test, feature = "test-support"))]
mod fake;
#[cfg(any(test, feature = "test-support"))]
pub use fake::{FakeLockNode, NodeCall};

use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;
use uniq_core::OwnerToken;

/// Errors from lock node operations
#[derive(Debug, Error)]
pub enum NodeError {
    #[error("node unreachable: {0}")]
    Unreachable(String),
    #[error("node did not answer within {}ms", .0.as_millis())]
    Timeout(Duration),
    #[error("backend error: {0}")]
    Backend(String),
}

/// One lock backend
///
/// Every method is a single atomic operation at the node. `Ok(false)` means the
/// node answered but the condition did not hold.
#[async_trait]
pub trait LockNode: Clone + Send + Sync + 'static {
    /// Address or label used in logs
    fn name(&self) -> &str;

    /// Store `token` under `key` with `ttl` unless the key already exists
    async fn set_if_absent(
        &self,
        key: &str,
        token: &OwnerToken,
        ttl: Duration,
    ) -> Result<bool, NodeError>;

    /// Delete `key` only if it currently holds `token`
    async fn delete_if_owner(&self, key: &str, token: &OwnerToken) -> Result<bool, NodeError>;

    /// Reset the TTL of `key` only if it currently holds `token`
    async fn extend_if_owner(
        &self,
        key: &str,
        token: &OwnerToken,
        ttl: Duration,
    ) -> Result<bool, NodeError>;

    /// Delete `key` whoever holds it
    async fn force_delete(&self, key: &str) -> Result<bool, NodeError>;

    /// Delete every key starting with `prefix`; returns how many were removed
    async fn delete_prefix(&self, prefix: &str) -> Result<u64, NodeError>;
}
