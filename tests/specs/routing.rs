// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Conflicts and connection failures reach different handlers

use crate::prelude::*;
use std::sync::atomic::{AtomicU32, Ordering};

#[derive(Default)]
struct Calls {
    conflict: AtomicU32,
    connection: AtomicU32,
}

fn counting_config(calls: &Arc<Calls>) -> UniquenessConfig {
    let on_conflict = {
        let calls = Arc::clone(calls);
        ConflictAction::custom(move |_| {
            calls.conflict.fetch_add(1, Ordering::SeqCst);
            ConflictDecision::Drop
        })
    };
    let on_connection_error = {
        let calls = Arc::clone(calls);
        ConnectionErrorAction::custom(move |_| {
            calls.connection.fetch_add(1, Ordering::SeqCst);
            ConnectionDecision::Fail
        })
    };
    UniquenessConfig::new()
        .with_on_conflict(on_conflict)
        .with_on_connection_error(on_connection_error)
}

#[tokio::test]
async fn unreachable_nodes_go_to_connection_handler() {
    let world = World::new(3);
    let calls = Arc::new(Calls::default());
    let (worker, _) = world.worker_with(counting_config(&calls));
    world.set_unreachable(true);

    let err = worker
        .on_enqueue(&mut Job::new("Sync", vec![json!(1)]))
        .await
        .unwrap_err();

    assert!(err.is_connection_failure(), "{err}");
    assert_eq!(calls.connection.load(Ordering::SeqCst), 1);
    assert_eq!(calls.conflict.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn held_lock_goes_to_conflict_resolver() {
    let world = World::new(3);
    let calls = Arc::new(Calls::default());
    let (worker, _) = world.worker_with(counting_config(&calls));
    let mut job = Job::new("Sync", vec![json!(1)]);
    world.hold_everywhere(&worker.lock_key(&job.identity).to_string(), "someone-else");

    assert_eq!(worker.on_enqueue(&mut job).await.unwrap(), Verdict::Deny);
    assert_eq!(calls.conflict.load(Ordering::SeqCst), 1);
    assert_eq!(calls.connection.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn proceeding_without_lock_is_recorded() {
    let world = World::new(3);
    let (worker, sink) = world.worker(r#"on_redis_connection_error = "log""#);
    world.set_unreachable(true);

    let mut job = Job::new("Sync", vec![json!(1)]);
    assert_eq!(worker.on_enqueue(&mut job).await.unwrap(), Verdict::Allow);
    assert_eq!(sink.count("lock:unprotected"), 1);
}
