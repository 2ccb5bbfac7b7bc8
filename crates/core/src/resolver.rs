// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Policy dispatch for the two failure axes
//!
//! A **conflict** means uniqueness was verified and another instance holds the
//! lock. A **connection error** means uniqueness could not be verified at all.
//! Each has its own action so the two are never confused.

use crate::config::ConfigError;
use crate::job::JobIdentity;
use crate::strategy::LockScope;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Passed to the conflict action when another holder owns the lock
#[derive(Clone, Debug, PartialEq)]
pub struct ConflictEvent {
    pub key: String,
    pub job: JobIdentity,
    pub scope: LockScope,
    /// 1 on the first conflict, incremented on every retry
    pub attempt: u32,
}

/// Passed to the connection-error action when quorum was unreachable
#[derive(Clone, Debug, PartialEq)]
pub struct ConnectionErrorEvent {
    pub key: String,
    pub job: JobIdentity,
    pub scope: LockScope,
    pub cause: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConflictDecision {
    /// Skip the duplicate quietly
    Drop,
    /// Surface a typed `Conflict` failure to the job framework
    Fail,
    /// Try to acquire again after `delay`
    Retry { delay: Duration },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConnectionDecision {
    /// Run without a lock; uniqueness is not guaranteed
    ProceedWithoutLock,
    /// Surface a typed `ConnectionFailure` to the job framework
    Fail,
}

pub type ConflictHandler = Arc<dyn Fn(&ConflictEvent) -> ConflictDecision + Send + Sync>;
pub type ConnectionErrorHandler =
    Arc<dyn Fn(&ConnectionErrorEvent) -> ConnectionDecision + Send + Sync>;

/// What to do when a lock is already held
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ConflictAction {
    /// Record the conflict and drop the duplicate
    Log,
    #[default]
    Raise,
    Custom(ConflictHandler),
}

impl ConflictAction {
    pub fn custom(f: impl Fn(&ConflictEvent) -> ConflictDecision + Send + Sync + 'static) -> Self {
        ConflictAction::Custom(Arc::new(f))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConflictAction::Log => "log",
            ConflictAction::Raise => "raise",
            ConflictAction::Custom(_) => "custom",
        }
    }

    pub fn resolve(&self, event: &ConflictEvent) -> ConflictDecision {
        match self {
            ConflictAction::Log => {
                tracing::info!(
                    key = %event.key,
                    job = %event.job,
                    scope = %event.scope,
                    "lock already held, skipping duplicate"
                );
                ConflictDecision::Drop
            }
            ConflictAction::Raise => ConflictDecision::Fail,
            ConflictAction::Custom(handler) => handler(event),
        }
    }
}

impl std::fmt::Debug for ConflictAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<String> for ConflictAction {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "log" => Ok(ConflictAction::Log),
            "raise" => Ok(ConflictAction::Raise),
            _ => Err(ConfigError::UnknownAction {
                option: "on_conflict",
                action: value,
            }),
        }
    }
}

impl From<ConflictAction> for String {
    fn from(action: ConflictAction) -> Self {
        action.name().to_string()
    }
}

/// What to do when the lock backend cannot be reached
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum ConnectionErrorAction {
    /// Fail closed
    #[default]
    Raise,
    /// Log loudly and run without a lock
    Log,
    Custom(ConnectionErrorHandler),
}

impl ConnectionErrorAction {
    pub fn custom(
        f: impl Fn(&ConnectionErrorEvent) -> ConnectionDecision + Send + Sync + 'static,
    ) -> Self {
        ConnectionErrorAction::Custom(Arc::new(f))
    }

    pub fn name(&self) -> &'static str {
        match self {
            ConnectionErrorAction::Raise => "raise",
            ConnectionErrorAction::Log => "log",
            ConnectionErrorAction::Custom(_) => "custom",
        }
    }

    pub fn resolve(&self, event: &ConnectionErrorEvent) -> ConnectionDecision {
        let decision = match self {
            ConnectionErrorAction::Raise => ConnectionDecision::Fail,
            ConnectionErrorAction::Log => ConnectionDecision::ProceedWithoutLock,
            ConnectionErrorAction::Custom(handler) => handler(event),
        };
        if decision == ConnectionDecision::ProceedWithoutLock {
            tracing::warn!(
                key = %event.key,
                job = %event.job,
                scope = %event.scope,
                cause = %event.cause,
                "lock backend unreachable, running WITHOUT uniqueness protection"
            );
        }
        decision
    }
}

impl std::fmt::Debug for ConnectionErrorAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<String> for ConnectionErrorAction {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "raise" => Ok(ConnectionErrorAction::Raise),
            "log" => Ok(ConnectionErrorAction::Log),
            _ => Err(ConfigError::UnknownAction {
                option: "on_redis_connection_error",
                action: value,
            }),
        }
    }
}

impl From<ConnectionErrorAction> for String {
    fn from(action: ConnectionErrorAction) -> Self {
        action.name().to_string()
    }
}

#[cfg(test)]
#[path = "resolver_tests.rs"]
mod tests;
