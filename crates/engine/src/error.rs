// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Error types for quorum lock operations

use thiserror::Error;

/// Why a quorum operation did not succeed
///
/// `Conflict` means uniqueness was verified and someone else holds the lock.
/// `ConnectionFailure` means it could not be verified at all.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum QuorumError {
    #[error(
        "lock {key} is held elsewhere ({granted} granted, {held} held by others, {unreachable} unreachable)"
    )]
    Conflict {
        key: String,
        granted: usize,
        held: usize,
        unreachable: usize,
    },
    #[error("could not reach quorum for {key}: {reason}")]
    ConnectionFailure { key: String, reason: String },
}

impl QuorumError {
    pub fn key(&self) -> &str {
        match self {
            QuorumError::Conflict { key, .. } | QuorumError::ConnectionFailure { key, .. } => key,
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, QuorumError::Conflict { .. })
    }

    /// Short cause for events and handler payloads
    pub fn cause(&self) -> String {
        match self {
            QuorumError::Conflict { held, .. } => format!("held by {held} node(s)"),
            QuorumError::ConnectionFailure { reason, .. } => reason.clone(),
        }
    }
}
