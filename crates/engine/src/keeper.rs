// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Periodic extension of locks held during execution

use crate::error::QuorumError;
use crate::quorum::QuorumClient;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use uniq_adapters::{EventSink, LockNode};
use uniq_core::{Clock, Event, LockHandle, TokenGen};

/// Latest known state of a kept lock
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum KeeperStatus {
    Holding { extensions: u32 },
    /// The lock expired or changed hands; exclusivity is gone
    Lost { reason: String },
}

impl KeeperStatus {
    pub fn is_lost(&self) -> bool {
        matches!(self, KeeperStatus::Lost { .. })
    }
}

/// Background task extending one lock until stopped
///
/// The keeper never cancels the work it protects; loss is only reported.
pub struct LockKeeper {
    key: String,
    status: watch::Receiver<KeeperStatus>,
    task: JoinHandle<()>,
}

impl LockKeeper {
    pub fn spawn<N, G, C, S>(
        client: Arc<QuorumClient<N, G, C>>,
        sink: S,
        handle: LockHandle,
        interval: Duration,
    ) -> Self
    where
        N: LockNode,
        G: TokenGen,
        C: Clock,
        S: EventSink,
    {
        let (tx, status) = watch::channel(KeeperStatus::Holding { extensions: 0 });
        let key = handle.key().to_string();
        tracing::debug!(
            key,
            interval_ms = interval.as_millis() as u64,
            "starting lock keeper"
        );
        let task = tokio::spawn(keep(client, sink, handle, interval, tx));
        Self { key, status, task }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn status(&self) -> KeeperStatus {
        self.status.borrow().clone()
    }

    /// Resolves once the lock is reported lost
    pub async fn lost(&mut self) -> KeeperStatus {
        // Err only means the task is gone; the last published status stands
        let _ = self.status.wait_for(KeeperStatus::is_lost).await;
        self.status.borrow().clone()
    }

    /// Stop extending and return the final status
    pub fn stop(self) -> KeeperStatus {
        self.task.abort();
        let status = self.status.borrow().clone();
        tracing::debug!(key = self.key, ?status, "lock keeper stopped");
        status
    }
}

impl Drop for LockKeeper {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn keep<N, G, C, S>(
    client: Arc<QuorumClient<N, G, C>>,
    sink: S,
    mut handle: LockHandle,
    interval: Duration,
    tx: watch::Sender<KeeperStatus>,
) where
    N: LockNode,
    G: TokenGen,
    C: Clock,
    S: EventSink,
{
    let mut ticker = tokio::time::interval_at(tokio::time::Instant::now() + interval, interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut extensions = 0;

    loop {
        ticker.tick().await;
        let ttl = handle.ttl;
        match client.extend(&handle, ttl).await {
            Ok(extended) => {
                handle = extended;
                extensions += 1;
                tx.send_replace(KeeperStatus::Holding { extensions });
                sink.emit(&Event::LockExtended {
                    key: handle.key().to_string(),
                })
                .await;
            }
            Err(e @ QuorumError::Conflict { .. }) => {
                lose(&tx, &handle, e.to_string());
                return;
            }
            Err(e) if handle.is_expired(client.clock()) => {
                lose(&tx, &handle, format!("validity elapsed without extension: {e}"));
                return;
            }
            Err(e) => {
                tracing::warn!(
                    key = handle.key(),
                    error = %e,
                    remaining_ms = handle.remaining(client.clock()).as_millis() as u64,
                    "extend failed, will retry"
                );
            }
        }
    }
}

fn lose(tx: &watch::Sender<KeeperStatus>, handle: &LockHandle, reason: String) {
    tracing::error!(
        key = handle.key(),
        token = %handle.token(),
        reason,
        "lock lost while job is executing"
    );
    tx.send_replace(KeeperStatus::Lost { reason });
}

#[cfg(test)]
#[path = "keeper_tests.rs"]
mod tests;
