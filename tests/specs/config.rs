// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Configuration loading specs

use crate::prelude::*;

#[tokio::test]
async fn config_file_drives_per_class_strategy() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("uniqueness.toml");
    std::fs::write(
        &path,
        r#"
lock_prefix = "billing"
default_strategy = "until_executed"

[lock_strategies]
Heartbeat = "while_executing"
"#,
    )
    .unwrap();
    let config = UniquenessConfig::load(&path).unwrap();

    let world = World::new(3);
    let (worker, _) = world.worker_with(config);

    let job = Job::new("Invoice", vec![json!(7)]);
    assert!(worker.lock_key(&job.identity).to_string().starts_with("billing:Invoice:"));

    worker.on_enqueue(&mut Job::new("Heartbeat", vec![])).await.unwrap();
    assert_eq!(
        worker.on_enqueue(&mut Job::new("Heartbeat", vec![])).await.unwrap(),
        Verdict::Allow
    );
}

#[test]
fn unknown_action_fails_at_startup() {
    let err = UniquenessConfig::from_toml_str(r#"on_conflict = "explode""#).unwrap_err();
    assert!(err.to_string().contains("explode"), "{err}");
}

#[test]
fn quorum_larger_than_cluster_is_rejected() {
    let world = World::new(3);
    let config = UniquenessConfig::new().with_quorum_options(QuorumOptions::default().with_quorum(4));
    let result = Uniqueness::new(
        Arc::new(config),
        UniquenessDeps {
            nodes: world.nodes.clone(),
            sink: FakeEventSink::new(),
            tokens: SequentialTokenGen::default(),
            clock: world.clock.clone(),
        },
    );
    assert!(matches!(
        result,
        Err(UniquenessError::InvalidConfiguration(_))
    ));
}
