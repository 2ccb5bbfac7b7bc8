// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use uniq_adapters::{FakeEventSink, FakeLockNode, NodeCall};
use uniq_core::{FakeClock, LockScope, OwnerToken, QuorumOptions, SequentialTokenGen};

const KEY: &str = "uniq:Sync:abc:runtime";
const TTL: Duration = Duration::from_secs(3);
const INTERVAL: Duration = Duration::from_secs(1);

type Client = QuorumClient<FakeLockNode, SequentialTokenGen, FakeClock>;

struct Harness {
    client: Arc<Client>,
    nodes: Vec<FakeLockNode>,
    clock: FakeClock,
    sink: FakeEventSink,
}

fn harness() -> Harness {
    let clock = FakeClock::new();
    let nodes = FakeLockNode::cluster(3, &clock);
    let client = QuorumClient::new(
        nodes.clone(),
        QuorumOptions::default(),
        SequentialTokenGen::new("t"),
        clock.clone(),
    );
    Harness {
        client: Arc::new(client),
        nodes,
        clock,
        sink: FakeEventSink::new(),
    }
}

impl Harness {
    async fn keep(&self) -> LockKeeper {
        let handle = self
            .client
            .acquire(KEY, LockScope::Runtime, TTL)
            .await
            .unwrap();
        LockKeeper::spawn(Arc::clone(&self.client), self.sink.clone(), handle, INTERVAL)
    }

    fn extend_calls(&self) -> usize {
        self.nodes[0]
            .calls()
            .iter()
            .filter(|call| matches!(call, NodeCall::ExtendIfOwner { .. }))
            .count()
    }
}

#[tokio::test(start_paused = true)]
async fn extends_on_every_interval() {
    let h = harness();
    let keeper = h.keep().await;

    tokio::time::sleep(Duration::from_millis(3_500)).await;

    assert_eq!(keeper.status(), KeeperStatus::Holding { extensions: 3 });
    assert_eq!(h.sink.count("lock:extended"), 3);
    assert_eq!(keeper.key(), KEY);
}

#[tokio::test(start_paused = true)]
async fn lock_outlives_its_ttl_while_kept() {
    let h = harness();
    let _keeper = h.keep().await;

    for _ in 0..5 {
        tokio::time::sleep(INTERVAL).await;
        h.clock.advance(INTERVAL);
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    assert_eq!(h.nodes[0].holder(KEY), Some(OwnerToken::new("t-1")));
}

#[tokio::test(start_paused = true)]
async fn takeover_is_reported_as_lost() {
    let h = harness();
    let mut keeper = h.keep().await;

    h.clock.advance(TTL);
    for node in &h.nodes {
        node.hold(KEY, &OwnerToken::new("other"), TTL);
    }

    let status = keeper.lost().await;
    match status {
        KeeperStatus::Lost { reason } => assert!(reason.contains("held elsewhere"), "{reason}"),
        other => panic!("expected loss, got {other:?}"),
    }
}

#[tokio::test(start_paused = true)]
async fn outage_is_tolerated_until_validity_elapses() {
    let h = harness();
    let mut keeper = h.keep().await;
    for node in &h.nodes {
        node.set_unreachable(true);
    }

    tokio::time::sleep(Duration::from_millis(2_500)).await;
    assert_eq!(keeper.status(), KeeperStatus::Holding { extensions: 0 });

    h.clock.advance(TTL);
    let status = keeper.lost().await;
    assert!(
        matches!(&status, KeeperStatus::Lost { reason } if reason.contains("validity elapsed")),
        "{status:?}"
    );
}

#[tokio::test(start_paused = true)]
async fn stop_ends_extension() {
    let h = harness();
    let keeper = h.keep().await;

    tokio::time::sleep(Duration::from_millis(1_500)).await;
    assert_eq!(keeper.stop(), KeeperStatus::Holding { extensions: 1 });

    let calls = h.extend_calls();
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(h.extend_calls(), calls);
}
