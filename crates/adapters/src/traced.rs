// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Traced adapter wrappers for consistent observability

use crate::node::{LockNode, NodeError};
use async_trait::async_trait;
use std::time::Duration;
use tracing::Instrument;
use uniq_core::OwnerToken;

/// Wrapper that adds tracing to any LockNode
#[derive(Clone)]
pub struct TracedLockNode<N> {
    inner: N,
}

impl<N> TracedLockNode<N> {
    pub fn new(inner: N) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &N {
        &self.inner
    }
}

#[async_trait]
impl<N: LockNode> LockNode for TracedLockNode<N> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn set_if_absent(
        &self,
        key: &str,
        token: &OwnerToken,
        ttl: Duration,
    ) -> Result<bool, NodeError> {
        let span = tracing::info_span!("node.set_if_absent", node = self.name(), key);

        async {
            tracing::debug!(%token, ttl_ms = ttl.as_millis() as u64, "requesting");

            let start = std::time::Instant::now();
            let result = self.inner.set_if_absent(key, token, ttl).await;
            let elapsed = start.elapsed();

            match &result {
                Ok(granted) => tracing::debug!(
                    granted,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "answered"
                ),
                Err(e) => tracing::warn!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "set failed"
                ),
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn delete_if_owner(&self, key: &str, token: &OwnerToken) -> Result<bool, NodeError> {
        let span = tracing::info_span!("node.delete_if_owner", node = self.name(), key);

        async {
            let result = self.inner.delete_if_owner(key, token).await;
            // false is normal when the lock already expired or changed hands
            match &result {
                Ok(deleted) => tracing::debug!(deleted, %token, "answered"),
                Err(e) => tracing::warn!(error = %e, "delete failed"),
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn extend_if_owner(
        &self,
        key: &str,
        token: &OwnerToken,
        ttl: Duration,
    ) -> Result<bool, NodeError> {
        let span = tracing::info_span!("node.extend_if_owner", node = self.name(), key);

        async {
            let result = self.inner.extend_if_owner(key, token, ttl).await;
            match &result {
                Ok(true) => tracing::trace!(ttl_ms = ttl.as_millis() as u64, "extended"),
                Ok(false) => tracing::info!(%token, "token no longer held"),
                Err(e) => tracing::warn!(error = %e, "extend failed"),
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn force_delete(&self, key: &str) -> Result<bool, NodeError> {
        let span = tracing::info_span!("node.force_delete", node = self.name(), key);

        async {
            let result = self.inner.force_delete(key).await;
            match &result {
                Ok(deleted) => tracing::info!(deleted, "forced delete"),
                Err(e) => tracing::error!(error = %e, "forced delete failed"),
            }

            result
        }
        .instrument(span)
        .await
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<u64, NodeError> {
        let span = tracing::info_span!("node.delete_prefix", node = self.name(), prefix);

        async {
            let start = std::time::Instant::now();
            let result = self.inner.delete_prefix(prefix).await;
            let elapsed = start.elapsed();

            match &result {
                Ok(removed) => tracing::info!(
                    removed,
                    elapsed_ms = elapsed.as_millis() as u64,
                    "prefix deleted"
                ),
                Err(e) => tracing::error!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %e,
                    "prefix delete failed"
                ),
            }

            result
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "traced_tests.rs"]
mod tests;
