// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;

const TTL: Duration = Duration::from_secs(5);

#[tokio::test]
async fn fake_node_records_calls() {
    let node = FakeLockNode::new("node-1", FakeClock::new());
    let token = OwnerToken::new("t-1");

    node.set_if_absent("k", &token, TTL).await.unwrap();
    node.delete_if_owner("k", &token).await.unwrap();

    assert_eq!(
        node.calls(),
        vec![
            NodeCall::SetIfAbsent {
                key: "k".to_string(),
                token: token.clone(),
                ttl: TTL,
            },
            NodeCall::DeleteIfOwner {
                key: "k".to_string(),
                token,
            },
        ]
    );
}

#[tokio::test]
async fn unreachable_node_fails_but_still_records() {
    let node = FakeLockNode::new("node-1", FakeClock::new());
    node.set_unreachable(true);

    let err = node
        .set_if_absent("k", &OwnerToken::new("t-1"), TTL)
        .await
        .unwrap_err();
    assert!(matches!(err, NodeError::Unreachable(name) if name == "node-1"));
    assert_eq!(node.calls().len(), 1);
    assert_eq!(node.holder("k"), None);

    node.set_unreachable(false);
    assert!(node
        .set_if_absent("k", &OwnerToken::new("t-1"), TTL)
        .await
        .unwrap());
}

#[tokio::test]
async fn planted_lock_blocks_acquire() {
    let node = FakeLockNode::new("node-1", FakeClock::new());
    assert!(node.hold("k", &OwnerToken::new("other"), TTL));
    assert!(node.calls().is_empty());

    assert!(!node
        .set_if_absent("k", &OwnerToken::new("mine"), TTL)
        .await
        .unwrap());
}

#[test]
fn cluster_shares_clock_but_not_state() {
    let clock = FakeClock::new();
    let nodes = FakeLockNode::cluster(3, &clock);
    assert_eq!(nodes[2].name(), "node-3");

    nodes[0].hold("k", &OwnerToken::new("a"), TTL);
    assert_eq!(nodes[1].holder("k"), None);

    clock.advance(TTL);
    assert_eq!(nodes[0].holder("k"), None);
}
