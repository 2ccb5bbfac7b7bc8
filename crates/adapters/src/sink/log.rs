// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Event sink writing tracing records

use super::EventSink;
use async_trait::async_trait;
use uniq_core::Event;

/// Writes each event as a tracing record at a level matching its severity
#[derive(Clone, Copy, Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EventSink for LogEventSink {
    async fn emit(&self, event: &Event) {
        let name = event.name();
        match event {
            Event::LockLost { key, class } => {
                tracing::error!(event = name, key, class, "lock lost during execution")
            }
            Event::ConnectionFailed { key, class, cause } => {
                tracing::warn!(event = name, key, class, cause, "lock backend unreachable")
            }
            Event::ProceededWithoutLock { key, class, scope } => {
                tracing::warn!(event = name, key, class, %scope, "running without lock")
            }
            Event::LockConflict { key, class, scope } => {
                tracing::info!(event = name, key, class, %scope, "lock conflict")
            }
            Event::Unlocked { pattern, removed } => {
                tracing::info!(event = name, pattern, removed, "locks removed by operator")
            }
            Event::LockAcquired { key, class, scope } | Event::LockReleased { key, class, scope } => {
                tracing::debug!(event = name, key, class, %scope)
            }
            Event::LockExtended { key } => tracing::trace!(event = name, key),
        }
    }
}
