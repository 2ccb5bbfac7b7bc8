// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! uniq-core: domain model for job uniqueness locks
//!
//! This crate provides:
//! - Lock key derivation from job identities
//! - Uniqueness strategies and the pure per-job lock state machine
//! - Configuration, conflict and connection-error policies
//! - Lock events and the error type surfaced to the job framework

pub mod clock;
pub mod token;

pub mod config;
pub mod digest;
pub mod error;
pub mod event;
pub mod handle;
pub mod job;
pub mod resolver;
pub mod strategy;
pub mod traced;

pub use clock::{Clock, FakeClock, SystemClock};
pub use config::{
    ConfigError, JobOptions, JobPolicy, QuorumOptions, UniquenessConfig, DEFAULT_LOCK_PREFIX,
    DEFAULT_LOCK_TTL, DEFAULT_SERVER,
};
pub use digest::{canonical_arguments, DigestFn, DigestMethod, KeyDigester, LockKey};
pub use error::UniquenessError;
pub use event::Event;
pub use handle::LockHandle;
pub use job::{Job, JobIdentity};
pub use resolver::{
    ConflictAction, ConflictDecision, ConflictEvent, ConflictHandler, ConnectionDecision,
    ConnectionErrorAction, ConnectionErrorEvent, ConnectionErrorHandler,
};
pub use strategy::{
    JobLock, LifecycleEvent, LockContext, LockEffect, LockInput, LockScope, LockState, LockStep,
    LockStrategy, LockTicket,
};
pub use token::{OwnerToken, SequentialTokenGen, TokenGen, UuidTokenGen};
pub use traced::TracedEffect;
