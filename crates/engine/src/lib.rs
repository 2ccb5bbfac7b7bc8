// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! Job uniqueness engine: quorum locking, lock keepers and lifecycle hooks

mod error;
mod executor;
mod keeper;
mod quorum;
mod runtime;

pub use error::QuorumError;
pub use executor::{Executed, Executor};
pub use keeper::{KeeperStatus, LockKeeper};
pub use quorum::QuorumClient;
pub use runtime::{Uniqueness, UniquenessDeps, Verdict};
