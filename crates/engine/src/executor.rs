// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock effect executor

use crate::error::QuorumError;
use crate::quorum::QuorumClient;
use std::sync::Arc;
use std::time::Duration;
use tracing::Instrument;
use uniq_adapters::{EventSink, LockNode};
use uniq_core::{Clock, JobPolicy, LockEffect, LockHandle, LockScope, TokenGen, TracedEffect};

/// What executing one effect produced
#[derive(Debug)]
pub enum Executed {
    Done,
    Acquired(LockHandle),
    AcquireFailed {
        key: String,
        scope: LockScope,
        error: QuorumError,
    },
}

/// Executes lock effects against the quorum client and event sink
pub struct Executor<N, G, C, S> {
    client: Arc<QuorumClient<N, G, C>>,
    sink: S,
}

impl<N, G, C, S> Executor<N, G, C, S>
where
    N: LockNode,
    G: TokenGen,
    C: Clock,
    S: EventSink,
{
    pub fn new(client: Arc<QuorumClient<N, G, C>>, sink: S) -> Self {
        Self { client, sink }
    }

    /// Execute a single effect with tracing
    pub async fn execute(&self, effect: LockEffect, policy: &JobPolicy) -> Executed {
        let span = tracing::info_span!("effect", effect = effect.name());
        async {
            tracing::debug!(fields = ?effect.fields(), "executing");

            let start = std::time::Instant::now();
            let executed = self.execute_inner(effect, policy).await;
            let elapsed = start.elapsed();

            match &executed {
                Executed::AcquireFailed { error, .. } => tracing::info!(
                    elapsed_ms = elapsed.as_millis() as u64,
                    error = %error,
                    "not acquired"
                ),
                _ => tracing::debug!(elapsed_ms = elapsed.as_millis() as u64, "completed"),
            }
            executed
        }
        .instrument(span)
        .await
    }

    async fn execute_inner(&self, effect: LockEffect, policy: &JobPolicy) -> Executed {
        match effect {
            LockEffect::Acquire { key, scope } => self.acquire(key, scope, policy.ttl(scope)).await,

            LockEffect::Release { ticket } => {
                // Best effort: an unreleased lock still expires with its TTL
                if let Err(e) = self.client.release(&ticket).await {
                    tracing::warn!(key = ticket.key, error = %e, "release failed, lock will expire");
                }
                Executed::Done
            }

            LockEffect::Emit(event) => {
                self.sink.emit(&event).await;
                Executed::Done
            }
        }
    }

    /// Acquire outside the effect flow, for retries decided by a conflict handler
    pub async fn acquire(&self, key: String, scope: LockScope, ttl: Duration) -> Executed {
        match self.client.acquire(&key, scope, ttl).await {
            Ok(handle) => Executed::Acquired(handle),
            Err(error) => Executed::AcquireFailed { key, scope, error },
        }
    }
}

#[cfg(test)]
#[path = "executor_tests.rs"]
mod tests;
