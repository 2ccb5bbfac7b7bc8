// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Uniqueness configuration
//!
//! Built once at startup (from TOML or the `with_*` builders), validated, then
//! shared read-only. Per-class [`JobOptions`] override the global values.
//!
//! ```toml
//! lock_ttl = "3h"
//! on_conflict = "log"
//! redlock_servers = ["redis://a:6379", "redis://b:6379", "redis://c:6379"]
//!
//! [lock_strategies]
//! ReportGenerator = "until_and_while_executing"
//!
//! [jobs.ReportGenerator]
//! runtime_lock_ttl = "10m"
//! on_runtime_conflict = "raise"
//! ```

use crate::digest::{DigestMethod, KeyDigester};
use crate::resolver::{ConflictAction, ConnectionErrorAction};
use crate::strategy::{LockScope, LockStrategy};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_LOCK_TTL: Duration = Duration::from_secs(86_400);
pub const DEFAULT_LOCK_PREFIX: &str = "uniq";
pub const DEFAULT_SERVER: &str = "redis://localhost:6379";

/// Configuration errors; fatal at startup
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("lock_ttl must be greater than zero")]
    ZeroTtl,
    #[error("{option} for {class} must be greater than zero")]
    ZeroJobDuration { class: String, option: &'static str },
    #[error("extend_interval must be greater than zero")]
    ZeroExtendInterval,
    #[error("lock_prefix must not be empty")]
    EmptyPrefix,
    #[error("redlock_servers must list at least one node")]
    NoServers,
    #[error("quorum of {quorum} is out of range for {nodes} node(s)")]
    QuorumOutOfRange { quorum: usize, nodes: usize },
    #[error("drift_factor must be within [0, 1), got {0}")]
    InvalidDriftFactor(f64),
    #[error("unexpected '{action}' action for {option}")]
    UnknownAction { option: &'static str, action: String },
    #[error("unknown digest method: {0}")]
    UnknownDigest(String),
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

/// Tuning for the quorum lock client
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QuorumOptions {
    /// Extra acquisition attempts after the first; 0 leaves retrying to the caller
    pub retry_count: u32,
    #[serde(with = "humantime_serde")]
    pub retry_delay: Duration,
    /// Upper bound of the random delay added to `retry_delay`
    #[serde(with = "humantime_serde")]
    pub retry_jitter: Duration,
    /// Bound on every single node call
    #[serde(with = "humantime_serde")]
    pub node_timeout: Duration,
    /// Share of the TTL reserved for clock drift between nodes
    pub drift_factor: f64,
    /// Nodes that must agree; defaults to a strict majority
    pub quorum: Option<usize>,
}

impl Default for QuorumOptions {
    fn default() -> Self {
        Self {
            retry_count: 0,
            retry_delay: Duration::from_millis(200),
            retry_jitter: Duration::from_millis(50),
            node_timeout: Duration::from_millis(100),
            drift_factor: 0.01,
            quorum: None,
        }
    }
}

impl QuorumOptions {
    pub fn with_retry_count(mut self, count: u32) -> Self {
        self.retry_count = count;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration, jitter: Duration) -> Self {
        self.retry_delay = delay;
        self.retry_jitter = jitter;
        self
    }

    pub fn with_node_timeout(mut self, timeout: Duration) -> Self {
        self.node_timeout = timeout;
        self
    }

    pub fn with_quorum(mut self, quorum: usize) -> Self {
        self.quorum = Some(quorum);
        self
    }

    /// Agreeing nodes required out of `nodes`
    pub fn quorum_of(&self, nodes: usize) -> usize {
        self.quorum.unwrap_or(nodes / 2 + 1)
    }

    /// Check quorum and drift settings against a set of `nodes`
    pub fn validate(&self, nodes: usize) -> Result<(), ConfigError> {
        let quorum = self.quorum_of(nodes);
        if quorum == 0 || quorum > nodes {
            return Err(ConfigError::QuorumOutOfRange { quorum, nodes });
        }
        if !(0.0..1.0).contains(&self.drift_factor) {
            return Err(ConfigError::InvalidDriftFactor(self.drift_factor));
        }
        Ok(())
    }
}

/// Per-job-class overrides
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct JobOptions {
    #[serde(with = "humantime_serde")]
    pub lock_ttl: Option<Duration>,
    /// TTL of the execution-scope lock; falls back to the effective `lock_ttl`
    #[serde(with = "humantime_serde")]
    pub runtime_lock_ttl: Option<Duration>,
    pub on_conflict: Option<ConflictAction>,
    /// Action for conflicts on the execution-scope lock; falls back to `on_conflict`
    pub on_runtime_conflict: Option<ConflictAction>,
    /// Execution deadline after which the job's locks are released
    #[serde(with = "humantime_serde")]
    pub execution_timeout: Option<Duration>,
}

impl JobOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = Some(ttl);
        self
    }

    pub fn with_runtime_lock_ttl(mut self, ttl: Duration) -> Self {
        self.runtime_lock_ttl = Some(ttl);
        self
    }

    pub fn with_on_conflict(mut self, action: ConflictAction) -> Self {
        self.on_conflict = Some(action);
        self
    }

    pub fn with_on_runtime_conflict(mut self, action: ConflictAction) -> Self {
        self.on_runtime_conflict = Some(action);
        self
    }

    pub fn with_execution_timeout(mut self, timeout: Duration) -> Self {
        self.execution_timeout = Some(timeout);
        self
    }
}

/// Effective settings for one job class
#[derive(Clone, Debug)]
pub struct JobPolicy {
    pub strategy: LockStrategy,
    pub lock_ttl: Duration,
    pub runtime_lock_ttl: Duration,
    pub on_conflict: ConflictAction,
    pub on_runtime_conflict: ConflictAction,
    pub on_connection_error: ConnectionErrorAction,
    pub execution_timeout: Option<Duration>,
}

impl JobPolicy {
    pub fn ttl(&self, scope: LockScope) -> Duration {
        match scope {
            LockScope::Enqueue => self.lock_ttl,
            LockScope::Runtime => self.runtime_lock_ttl,
        }
    }

    pub fn conflict_action(&self, scope: LockScope) -> &ConflictAction {
        match scope {
            LockScope::Enqueue => &self.on_conflict,
            LockScope::Runtime => &self.on_runtime_conflict,
        }
    }
}

fn default_servers() -> Vec<String> {
    vec![std::env::var("REDIS_URL").unwrap_or_else(|_| DEFAULT_SERVER.to_string())]
}

/// Process-wide uniqueness settings
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct UniquenessConfig {
    #[serde(with = "humantime_serde")]
    pub lock_ttl: Duration,
    pub lock_prefix: String,
    pub on_conflict: ConflictAction,
    #[serde(alias = "on_connection_error")]
    pub on_redis_connection_error: ConnectionErrorAction,
    pub redlock_servers: Vec<String>,
    pub redlock_options: QuorumOptions,
    pub default_strategy: LockStrategy,
    pub lock_strategies: BTreeMap<String, LockStrategy>,
    pub digest_method: DigestMethod,
    /// Keep execution locks alive with periodic extends
    pub auto_extend: bool,
    /// Extend period; defaults to a third of the lock's TTL
    #[serde(with = "humantime_serde")]
    pub extend_interval: Option<Duration>,
    pub jobs: BTreeMap<String, JobOptions>,
}

impl Default for UniquenessConfig {
    fn default() -> Self {
        Self {
            lock_ttl: DEFAULT_LOCK_TTL,
            lock_prefix: DEFAULT_LOCK_PREFIX.to_string(),
            on_conflict: ConflictAction::default(),
            on_redis_connection_error: ConnectionErrorAction::default(),
            redlock_servers: default_servers(),
            redlock_options: QuorumOptions::default(),
            default_strategy: LockStrategy::default(),
            lock_strategies: BTreeMap::new(),
            digest_method: DigestMethod::default(),
            auto_extend: true,
            extend_interval: None,
            jobs: BTreeMap::new(),
        }
    }
}

impl UniquenessConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: UniquenessConfig = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_toml_str(&source)?;
        tracing::info!(
            path = %path.display(),
            lock_ttl = %humantime::format_duration(config.lock_ttl),
            servers = config.redlock_servers.len(),
            strategies = config.lock_strategies.len(),
            "uniqueness configuration loaded"
        );
        Ok(config)
    }

    pub fn with_lock_ttl(mut self, ttl: Duration) -> Self {
        self.lock_ttl = ttl;
        self
    }

    pub fn with_lock_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.lock_prefix = prefix.into();
        self
    }

    pub fn with_on_conflict(mut self, action: ConflictAction) -> Self {
        self.on_conflict = action;
        self
    }

    pub fn with_on_connection_error(mut self, action: ConnectionErrorAction) -> Self {
        self.on_redis_connection_error = action;
        self
    }

    pub fn with_servers<S: Into<String>>(mut self, servers: impl IntoIterator<Item = S>) -> Self {
        self.redlock_servers = servers.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_quorum_options(mut self, options: QuorumOptions) -> Self {
        self.redlock_options = options;
        self
    }

    pub fn with_default_strategy(mut self, strategy: LockStrategy) -> Self {
        self.default_strategy = strategy;
        self
    }

    pub fn with_strategy(mut self, class: impl Into<String>, strategy: LockStrategy) -> Self {
        self.lock_strategies.insert(class.into(), strategy);
        self
    }

    pub fn with_digest_method(mut self, method: DigestMethod) -> Self {
        self.digest_method = method;
        self
    }

    pub fn with_auto_extend(mut self, enabled: bool) -> Self {
        self.auto_extend = enabled;
        self
    }

    pub fn with_extend_interval(mut self, interval: Duration) -> Self {
        self.extend_interval = Some(interval);
        self
    }

    pub fn with_job(mut self, class: impl Into<String>, options: JobOptions) -> Self {
        self.jobs.insert(class.into(), options);
        self
    }

    /// Check every invariant; called before the configuration is used
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.lock_ttl.is_zero() {
            return Err(ConfigError::ZeroTtl);
        }
        if self.lock_prefix.is_empty() {
            return Err(ConfigError::EmptyPrefix);
        }
        if self.redlock_servers.is_empty() {
            return Err(ConfigError::NoServers);
        }
        if self.extend_interval.is_some_and(|i| i.is_zero()) {
            return Err(ConfigError::ZeroExtendInterval);
        }
        self.redlock_options.validate(self.redlock_servers.len())?;

        for (class, options) in &self.jobs {
            let durations = [
                ("lock_ttl", options.lock_ttl),
                ("runtime_lock_ttl", options.runtime_lock_ttl),
                ("execution_timeout", options.execution_timeout),
            ];
            for (option, value) in durations {
                if value.is_some_and(|d| d.is_zero()) {
                    return Err(ConfigError::ZeroJobDuration {
                        class: class.clone(),
                        option,
                    });
                }
            }
        }
        Ok(())
    }

    pub fn digester(&self) -> KeyDigester {
        KeyDigester::new(self.lock_prefix.clone(), self.digest_method.clone())
    }

    pub fn strategy_for(&self, class: &str) -> LockStrategy {
        self.lock_strategies
            .get(class)
            .copied()
            .unwrap_or(self.default_strategy)
    }

    /// Resolve global settings and per-class overrides for `class`
    pub fn policy_for(&self, class: &str) -> JobPolicy {
        let options = self.jobs.get(class);
        let lock_ttl = options.and_then(|o| o.lock_ttl).unwrap_or(self.lock_ttl);
        let on_conflict = options
            .and_then(|o| o.on_conflict.clone())
            .unwrap_or_else(|| self.on_conflict.clone());

        JobPolicy {
            strategy: self.strategy_for(class),
            lock_ttl,
            runtime_lock_ttl: options.and_then(|o| o.runtime_lock_ttl).unwrap_or(lock_ttl),
            on_runtime_conflict: options
                .and_then(|o| o.on_runtime_conflict.clone())
                .unwrap_or_else(|| on_conflict.clone()),
            on_conflict,
            on_connection_error: self.on_redis_connection_error.clone(),
            execution_timeout: options.and_then(|o| o.execution_timeout),
        }
    }

    /// Period between extends for a lock of `ttl`
    pub fn extend_interval_for(&self, ttl: Duration) -> Duration {
        self.extend_interval.unwrap_or(ttl / 3)
    }
}

#[cfg(test)]
#[path = "config_tests.rs"]
mod tests;
