// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Quorum lock client
//!
//! Every operation fans out to all nodes in parallel, each call bounded by the
//! node timeout, and succeeds only when a quorum of nodes agrees. A lock is
//! usable for its *validity*: the TTL minus the time spent acquiring it minus
//! an allowance for clock drift between nodes.

use crate::error::QuorumError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::task::JoinSet;
use tracing::Instrument;
use uniq_adapters::{LockNode, NodeError};
use uniq_core::{Clock, LockHandle, LockScope, LockTicket, OwnerToken, QuorumOptions, TokenGen};

/// Fixed part of the drift allowance, covering node-side timer granularity
const DRIFT_FLOOR: Duration = Duration::from_millis(2);

/// How the nodes answered one fan-out
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Tally {
    /// Condition held (granted, extended, deleted)
    yes: usize,
    /// Node answered but the condition did not hold
    no: usize,
    /// Node errored or timed out
    failed: usize,
}

impl Tally {
    fn answered(&self) -> usize {
        self.yes + self.no
    }
}

fn tally(results: &[Result<bool, NodeError>]) -> (Tally, Option<String>) {
    let mut tally = Tally::default();
    let mut first_error = None;
    for result in results {
        match result {
            Ok(true) => tally.yes += 1,
            Ok(false) => tally.no += 1,
            Err(e) => {
                tally.failed += 1;
                first_error.get_or_insert_with(|| e.to_string());
            }
        }
    }
    (tally, first_error)
}

/// Coordinates locks across independent lock nodes
pub struct QuorumClient<N, G, C> {
    nodes: Vec<N>,
    options: QuorumOptions,
    quorum: usize,
    tokens: G,
    clock: C,
}

impl<N, G, C> QuorumClient<N, G, C>
where
    N: LockNode,
    G: TokenGen,
    C: Clock,
{
    pub fn new(nodes: Vec<N>, options: QuorumOptions, tokens: G, clock: C) -> Self {
        let quorum = options.quorum_of(nodes.len());
        Self {
            nodes,
            options,
            quorum,
            tokens,
            clock,
        }
    }

    pub fn quorum(&self) -> usize {
        self.quorum
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Remaining validity of a lock of `ttl` after `elapsed`
    fn validity(&self, ttl: Duration, elapsed: Duration) -> Duration {
        let drift = ttl.mul_f64(self.options.drift_factor) + DRIFT_FLOOR;
        ttl.saturating_sub(elapsed).saturating_sub(drift)
    }

    fn retry_pause(&self) -> Duration {
        let jitter = self.options.retry_jitter.as_millis() as u64;
        let extra = if jitter == 0 {
            0
        } else {
            rand::thread_rng().gen_range(0..=jitter)
        };
        self.options.retry_delay + Duration::from_millis(extra)
    }

    /// Run `call` against every node concurrently
    async fn fan_out<T, F, Fut>(&self, call: F) -> Vec<Result<T, NodeError>>
    where
        T: Send + 'static,
        F: Fn(N) -> Fut,
        Fut: Future<Output = Result<T, NodeError>> + Send + 'static,
    {
        let timeout = self.options.node_timeout;
        let mut set = JoinSet::new();
        for node in &self.nodes {
            let pending = call(node.clone());
            set.spawn(
                async move {
                    match tokio::time::timeout(timeout, pending).await {
                        Ok(result) => result,
                        Err(_) => Err(NodeError::Timeout(timeout)),
                    }
                }
                .in_current_span(),
            );
        }

        let mut results = Vec::with_capacity(self.nodes.len());
        while let Some(joined) = set.join_next().await {
            results.push(joined.unwrap_or_else(|e| {
                Err(NodeError::Backend(format!("node task failed: {e}")))
            }));
        }
        results
    }

    /// Acquire `key` on a quorum of nodes, retrying per the configured options
    pub async fn acquire(
        &self,
        key: &str,
        scope: LockScope,
        ttl: Duration,
    ) -> Result<LockHandle, QuorumError> {
        let span = tracing::info_span!("quorum.acquire", key, %scope, quorum = self.quorum);
        async {
            let mut attempt = 0;
            loop {
                match self.try_acquire(key, scope, ttl).await {
                    Ok(handle) => {
                        tracing::info!(
                            token = %handle.token(),
                            validity_ms = handle.validity.as_millis() as u64,
                            attempt,
                            "lock acquired"
                        );
                        return Ok(handle);
                    }
                    Err(e) if attempt < self.options.retry_count => {
                        attempt += 1;
                        let pause = self.retry_pause();
                        tracing::debug!(
                            error = %e,
                            attempt,
                            pause_ms = pause.as_millis() as u64,
                            "retrying acquire"
                        );
                        tokio::time::sleep(pause).await;
                    }
                    Err(e) => {
                        tracing::info!(error = %e, attempt, "acquire failed");
                        return Err(e);
                    }
                }
            }
        }
        .instrument(span)
        .await
    }

    async fn try_acquire(
        &self,
        key: &str,
        scope: LockScope,
        ttl: Duration,
    ) -> Result<LockHandle, QuorumError> {
        let token = self.tokens.next();
        let started = self.clock.now();

        let results = self
            .fan_out(|node| {
                let key = key.to_string();
                let token = token.clone();
                async move { node.set_if_absent(&key, &token, ttl).await }
            })
            .await;
        let (tally, first_error) = tally(&results);
        let validity = self.validity(ttl, self.clock.elapsed_since(started));

        if tally.yes >= self.quorum && !validity.is_zero() {
            return Ok(LockHandle {
                ticket: LockTicket {
                    key: key.to_string(),
                    token,
                    scope,
                },
                acquired_at: started,
                ttl,
                validity,
            });
        }

        // Give back partial grants, including nodes that set the key but answered late
        self.delete_everywhere(key, &token).await;

        let n = self.nodes.len();
        if n - tally.no < self.quorum {
            return Err(QuorumError::Conflict {
                key: key.to_string(),
                granted: tally.yes,
                held: tally.no,
                unreachable: tally.failed,
            });
        }

        let reason = if tally.yes >= self.quorum {
            format!(
                "lock validity expired while acquiring ({}ms ttl)",
                ttl.as_millis()
            )
        } else {
            format!(
                "{}/{} nodes granted, {} unreachable, quorum is {}: {}",
                tally.yes,
                n,
                tally.failed,
                self.quorum,
                first_error.unwrap_or_else(|| "no error reported".to_string())
            )
        };
        Err(QuorumError::ConnectionFailure {
            key: key.to_string(),
            reason,
        })
    }

    /// Reset the TTL of a held lock, keeping its token
    pub async fn extend(
        &self,
        handle: &LockHandle,
        ttl: Duration,
    ) -> Result<LockHandle, QuorumError> {
        let key = handle.key();
        let span = tracing::info_span!("quorum.extend", key, token = %handle.token());
        async {
            let started = self.clock.now();
            let token = handle.token().clone();
            let results = self
                .fan_out(|node| {
                    let key = key.to_string();
                    let token = token.clone();
                    async move { node.extend_if_owner(&key, &token, ttl).await }
                })
                .await;
            let (tally, first_error) = tally(&results);
            let validity = self.validity(ttl, self.clock.elapsed_since(started));

            if tally.yes >= self.quorum && !validity.is_zero() {
                tracing::debug!(
                    extended = tally.yes,
                    validity_ms = validity.as_millis() as u64,
                    "extended"
                );
                return Ok(LockHandle {
                    ticket: handle.ticket.clone(),
                    acquired_at: started,
                    ttl,
                    validity,
                });
            }

            let error = if self.nodes.len() - tally.no < self.quorum {
                QuorumError::Conflict {
                    key: key.to_string(),
                    granted: tally.yes,
                    held: tally.no,
                    unreachable: tally.failed,
                }
            } else {
                QuorumError::ConnectionFailure {
                    key: key.to_string(),
                    reason: format!(
                        "{}/{} nodes extended, {} unreachable: {}",
                        tally.yes,
                        self.nodes.len(),
                        tally.failed,
                        first_error.unwrap_or_else(|| "validity expired".to_string())
                    ),
                }
            };
            tracing::warn!(error = %error, "extend failed");
            Err(error)
        }
        .instrument(span)
        .await
    }

    /// Give a lock back; nodes holding another token are left untouched
    pub async fn release(&self, ticket: &LockTicket) -> Result<(), QuorumError> {
        let span = tracing::info_span!("quorum.release", key = %ticket.key, token = %ticket.token);
        async {
            let results = self.delete_everywhere(&ticket.key, &ticket.token).await;
            let (tally, first_error) = tally(&results);
            tracing::debug!(deleted = tally.yes, not_owner = tally.no, "released");

            if tally.answered() < self.quorum {
                return Err(QuorumError::ConnectionFailure {
                    key: ticket.key.clone(),
                    reason: format!(
                        "{}/{} nodes answered release: {}",
                        tally.answered(),
                        self.nodes.len(),
                        first_error.unwrap_or_default()
                    ),
                });
            }
            Ok(())
        }
        .instrument(span)
        .await
    }

    async fn delete_everywhere(
        &self,
        key: &str,
        token: &OwnerToken,
    ) -> Vec<Result<bool, NodeError>> {
        self.fan_out(|node| {
            let key = key.to_string();
            let token = token.clone();
            async move { node.delete_if_owner(&key, &token).await }
        })
        .await
    }

    /// Delete `key` on every node regardless of owner
    ///
    /// Returns whether any node held it.
    pub async fn force_unlock(&self, key: &str) -> Result<bool, QuorumError> {
        let span = tracing::info_span!("quorum.force_unlock", key);
        async {
            let results = self
                .fan_out(|node| {
                    let key = key.to_string();
                    async move { node.force_delete(&key).await }
                })
                .await;
            let (tally, first_error) = tally(&results);
            if tally.answered() < self.quorum {
                return Err(QuorumError::ConnectionFailure {
                    key: key.to_string(),
                    reason: first_error.unwrap_or_default(),
                });
            }
            Ok(tally.yes > 0)
        }
        .instrument(span)
        .await
    }

    /// Delete every key under `prefix` on every node
    ///
    /// Returns the largest count removed by a single node.
    pub async fn unlock_prefix(&self, prefix: &str) -> Result<u64, QuorumError> {
        let span = tracing::info_span!("quorum.unlock_prefix", prefix);
        async {
            let results = self
                .fan_out(|node| {
                    let prefix = prefix.to_string();
                    async move { node.delete_prefix(&prefix).await }
                })
                .await;

            let mut answered = 0;
            let mut removed = 0;
            let mut first_error = None;
            for result in results {
                match result {
                    Ok(count) => {
                        answered += 1;
                        removed = removed.max(count);
                    }
                    Err(e) => {
                        first_error.get_or_insert_with(|| e.to_string());
                    }
                }
            }
            if answered < self.quorum {
                return Err(QuorumError::ConnectionFailure {
                    key: prefix.to_string(),
                    reason: first_error.unwrap_or_default(),
                });
            }
            Ok(removed)
        }
        .instrument(span)
        .await
    }
}

#[cfg(test)]
#[path = "quorum_tests.rs"]
mod tests;
