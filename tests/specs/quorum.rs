// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Quorum lock guarantees: exclusivity, fencing, expiry

use crate::prelude::*;

const KEY: &str = "uniq:Sync:abc";

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn fifty_racing_acquirers_one_winner() {
    let client = Arc::new(QuorumClient::new(
        vec![MemoryNode::new("redis://localhost:6379")],
        QuorumOptions::default(),
        UuidTokenGen,
        SystemClock,
    ));

    let mut tasks = tokio::task::JoinSet::new();
    for _ in 0..50 {
        let client = Arc::clone(&client);
        tasks.spawn(async move {
            client
                .acquire(KEY, LockScope::Enqueue, Duration::from_secs(30))
                .await
        });
    }

    let mut won = 0;
    let mut conflicts = 0;
    while let Some(result) = tasks.join_next().await {
        match result.unwrap() {
            Ok(_) => won += 1,
            Err(e) if e.is_conflict() => conflicts += 1,
            Err(e) => panic!("unexpected failure: {e}"),
        }
    }
    assert_eq!((won, conflicts), (1, 49));
}

#[tokio::test]
async fn stale_token_cannot_touch_new_holder() {
    let world = World::new(3);
    let client = world.client("t");
    let ttl = Duration::from_secs(1);

    let a = client.acquire(KEY, LockScope::Enqueue, ttl).await.unwrap();
    world.clock.advance(Duration::from_millis(1_500));
    let b = client.acquire(KEY, LockScope::Enqueue, ttl).await.unwrap();

    let _ = client.release(&a.ticket).await;
    assert!(client.extend(&a, ttl).await.is_err());

    for node in &world.nodes {
        assert_eq!(node.holder(KEY).as_ref(), Some(b.token()));
    }
}

#[tokio::test]
async fn lock_expires_without_extension() {
    let world = World::new(3);
    let client = world.client("t");

    client
        .acquire(KEY, LockScope::Enqueue, Duration::from_secs(1))
        .await
        .unwrap();
    assert!(client
        .acquire(KEY, LockScope::Enqueue, Duration::from_secs(1))
        .await
        .unwrap_err()
        .is_conflict());

    world.clock.advance(Duration::from_millis(1_500));
    let handle = client
        .acquire(KEY, LockScope::Enqueue, Duration::from_secs(1))
        .await
        .unwrap();
    assert_eq!(handle.token(), &OwnerToken::new("t-3"));
}

#[tokio::test]
async fn minority_outage_is_tolerated() {
    let world = World::new(5);
    world.nodes[0].set_unreachable(true);
    world.nodes[4].set_unreachable(true);
    let client = world.client("t");

    let handle = client
        .acquire(KEY, LockScope::Enqueue, Duration::from_secs(10))
        .await
        .unwrap();
    client.release(&handle.ticket).await.unwrap();

    assert_eq!(world.nodes[2].holder(KEY), None);
}
