// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Shared harness: one set of lock nodes, any number of workers

#![allow(dead_code, unused_imports)]

pub use serde_json::json;
pub use std::sync::Arc;
pub use std::time::Duration;
pub use uniq_adapters::{FakeEventSink, FakeLockNode, MemoryNode};
pub use uniq_core::{
    ConflictAction, ConflictDecision, ConnectionDecision, ConnectionErrorAction, FakeClock, Job,
    LockScope, LockState, LockStrategy, OwnerToken, QuorumOptions, SequentialTokenGen,
    SystemClock, UniquenessConfig, UniquenessError, UuidTokenGen,
};
pub use uniq_engine::{QuorumClient, QuorumError, Uniqueness, UniquenessDeps, Verdict};

use std::sync::atomic::{AtomicUsize, Ordering};

pub type Worker = Uniqueness<FakeLockNode, FakeEventSink, SequentialTokenGen, FakeClock>;

/// Lock servers shared by every worker created from it
pub struct World {
    pub clock: FakeClock,
    pub nodes: Vec<FakeLockNode>,
    workers: AtomicUsize,
}

impl World {
    pub fn new(nodes: usize) -> Self {
        let clock = FakeClock::new();
        Self {
            nodes: FakeLockNode::cluster(nodes, &clock),
            clock,
            workers: AtomicUsize::new(0),
        }
    }

    /// A worker process configured from TOML
    pub fn worker(&self, toml: &str) -> (Worker, FakeEventSink) {
        self.worker_with(UniquenessConfig::from_toml_str(toml).unwrap())
    }

    pub fn worker_with(&self, config: UniquenessConfig) -> (Worker, FakeEventSink) {
        let n = self.workers.fetch_add(1, Ordering::SeqCst) + 1;
        let sink = FakeEventSink::new();
        let worker = Uniqueness::new(
            Arc::new(config),
            UniquenessDeps {
                nodes: self.nodes.clone(),
                sink: sink.clone(),
                tokens: SequentialTokenGen::new(format!("w{n}")),
                clock: self.clock.clone(),
            },
        )
        .unwrap();
        (worker, sink)
    }

    pub fn client(&self, tokens: &str) -> QuorumClient<FakeLockNode, SequentialTokenGen, FakeClock> {
        QuorumClient::new(
            self.nodes.clone(),
            QuorumOptions::default(),
            SequentialTokenGen::new(tokens),
            self.clock.clone(),
        )
    }

    pub fn set_unreachable(&self, unreachable: bool) {
        for node in &self.nodes {
            node.set_unreachable(unreachable);
        }
    }

    pub fn hold_everywhere(&self, key: &str, token: &str) {
        for node in &self.nodes {
            node.hold(key, &OwnerToken::new(token), Duration::from_secs(60));
        }
    }
}
