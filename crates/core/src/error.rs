// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Errors surfaced to the job framework

use crate::config::ConfigError;
use crate::job::JobIdentity;
use crate::strategy::LockScope;
use std::time::Duration;
use thiserror::Error;

/// The only error type crossing the lifecycle hook API
#[derive(Debug, Error)]
pub enum UniquenessError {
    #[error("invalid uniqueness configuration: {0}")]
    InvalidConfiguration(#[from] ConfigError),
    /// Uniqueness verified: another instance holds the lock
    #[error("{job} is already locked at {key}")]
    Conflict {
        key: String,
        job: JobIdentity,
        scope: LockScope,
    },
    /// Uniqueness could not be verified
    #[error("could not verify uniqueness of {job} at {key}: {cause}")]
    ConnectionFailure {
        key: String,
        job: JobIdentity,
        scope: LockScope,
        cause: String,
    },
    #[error("lock {key} was lost while {job} was executing")]
    LockLost { key: String, job: JobIdentity },
    #[error("{job} exceeded its execution timeout of {}", human(.timeout))]
    ExecutionTimeout { job: JobIdentity, timeout: Duration },
}

fn human(duration: &Duration) -> humantime::FormattedDuration {
    humantime::format_duration(*duration)
}

impl UniquenessError {
    /// Lock key involved, when the error concerns one
    pub fn key(&self) -> Option<&str> {
        match self {
            UniquenessError::Conflict { key, .. }
            | UniquenessError::ConnectionFailure { key, .. }
            | UniquenessError::LockLost { key, .. } => Some(key),
            UniquenessError::InvalidConfiguration(_) | UniquenessError::ExecutionTimeout { .. } => {
                None
            }
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, UniquenessError::Conflict { .. })
    }

    pub fn is_connection_failure(&self) -> bool {
        matches!(self, UniquenessError::ConnectionFailure { .. })
    }
}
