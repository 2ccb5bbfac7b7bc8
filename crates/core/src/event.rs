// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lock lifecycle events published to an event sink

use crate::strategy::LockScope;
use serde::{Deserialize, Serialize};

/// Something observable happened to a job lock
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    LockAcquired {
        key: String,
        class: String,
        scope: LockScope,
    },
    LockReleased {
        key: String,
        class: String,
        scope: LockScope,
    },
    /// Another instance already holds the lock
    LockConflict {
        key: String,
        class: String,
        scope: LockScope,
    },
    LockExtended {
        key: String,
    },
    /// A held lock expired or was reclaimed while the job kept running
    LockLost {
        key: String,
        class: String,
    },
    /// Quorum could not be reached
    ConnectionFailed {
        key: String,
        class: String,
        cause: String,
    },
    /// The job runs with uniqueness unverified
    ProceededWithoutLock {
        key: String,
        class: String,
        scope: LockScope,
    },
    /// Operator removed locks regardless of owner
    Unlocked {
        pattern: String,
        removed: u64,
    },
}

impl Event {
    /// Event name for logging and sink routing (e.g., "lock:acquired")
    pub fn name(&self) -> &'static str {
        match self {
            Event::LockAcquired { .. } => "lock:acquired",
            Event::LockReleased { .. } => "lock:released",
            Event::LockConflict { .. } => "lock:conflict",
            Event::LockExtended { .. } => "lock:extended",
            Event::LockLost { .. } => "lock:lost",
            Event::ConnectionFailed { .. } => "lock:connection_failed",
            Event::ProceededWithoutLock { .. } => "lock:unprotected",
            Event::Unlocked { .. } => "lock:unlocked",
        }
    }

    /// Node key (or key pattern) the event is about
    pub fn key(&self) -> &str {
        match self {
            Event::LockAcquired { key, .. }
            | Event::LockReleased { key, .. }
            | Event::LockConflict { key, .. }
            | Event::LockExtended { key }
            | Event::LockLost { key, .. }
            | Event::ConnectionFailed { key, .. }
            | Event::ProceededWithoutLock { key, .. } => key,
            Event::Unlocked { pattern, .. } => pattern,
        }
    }
}
