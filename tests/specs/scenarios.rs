// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! End-to-end duplicate suppression
//!
//! Verify the hooks allow one instance of a job and turn duplicates away.

use crate::prelude::*;

fn report() -> Job {
    Job::new("ReportGenerator", vec![json!(42)])
}

#[tokio::test]
async fn duplicate_enqueue_raises_conflict_by_default() {
    let world = World::new(3);
    let (worker, sink) = world.worker(r#"default_strategy = "until_executed""#);

    let mut first = report();
    assert_eq!(worker.on_enqueue(&mut first).await.unwrap(), Verdict::Allow);

    let mut second = report();
    let err = worker.on_enqueue(&mut second).await.unwrap_err();
    match err {
        UniquenessError::Conflict { job, scope, .. } => {
            assert_eq!(job, second.identity);
            assert_eq!(scope, LockScope::Enqueue);
        }
        other => panic!("expected conflict, got {other}"),
    }
    assert_eq!(sink.names(), vec!["lock:acquired", "lock:conflict"]);
}

#[tokio::test]
async fn duplicate_enqueue_is_dropped_when_logging() {
    let world = World::new(3);
    let (worker, sink) = world.worker(
        r#"
default_strategy = "until_executed"
on_conflict = "log"
"#,
    );

    worker.on_enqueue(&mut report()).await.unwrap();
    let mut second = report();

    assert_eq!(worker.on_enqueue(&mut second).await.unwrap(), Verdict::Deny);
    assert_eq!(sink.count("lock:conflict"), 1);
    assert!(matches!(second.lock.state, LockState::Conflicted { .. }));
}

#[tokio::test]
async fn duplicate_from_another_worker_is_detected() {
    let world = World::new(3);
    let (producer_a, _) = world.worker("");
    let (producer_b, _) = world.worker("");

    producer_a.on_enqueue(&mut report()).await.unwrap();
    assert!(producer_b.on_enqueue(&mut report()).await.unwrap_err().is_conflict());
}

#[tokio::test]
async fn while_executing_runs_one_instance_at_a_time() {
    let world = World::new(3);
    let toml = r#"
default_strategy = "while_executing"
on_conflict = "log"
"#;
    let (worker_a, _) = world.worker(toml);
    let (worker_b, _) = world.worker(toml);

    let mut first = report();
    let mut second = report();
    assert_eq!(worker_a.on_enqueue(&mut first).await.unwrap(), Verdict::Allow);
    assert_eq!(worker_b.on_enqueue(&mut second).await.unwrap(), Verdict::Allow);

    let (a, b) = tokio::join!(
        worker_a.on_execution_start(&mut first),
        worker_b.on_execution_start(&mut second)
    );
    let mut verdicts = vec![a.unwrap(), b.unwrap()];
    verdicts.sort_by_key(|v| v.is_allowed());
    assert_eq!(verdicts, vec![Verdict::Deny, Verdict::Allow]);
}

#[tokio::test]
async fn finished_job_can_run_again() {
    let world = World::new(3);
    let (worker, _) = world.worker(r#"default_strategy = "until_and_while_executing""#);

    for _ in 0..3 {
        let mut job = report();
        assert_eq!(worker.on_enqueue(&mut job).await.unwrap(), Verdict::Allow);
        let output = worker.perform(&mut job, || async { "done" }).await.unwrap();
        assert_eq!(output, Some("done"));
        assert_eq!(job.lock.state, LockState::Released);
    }
    assert!(world.nodes.iter().all(|node| node.keys().is_empty()));
}

#[tokio::test]
async fn enqueue_lock_is_released_by_the_executing_worker() {
    let world = World::new(3);
    let (producer, _) = world.worker("");
    let (consumer, _) = world.worker("");

    let mut job = report();
    producer.on_enqueue(&mut job).await.unwrap();
    let mut delivered: Job = serde_json::from_value(serde_json::to_value(&job).unwrap()).unwrap();

    consumer.perform(&mut delivered, || async {}).await.unwrap();

    assert_eq!(producer.on_enqueue(&mut report()).await.unwrap(), Verdict::Allow);
}
