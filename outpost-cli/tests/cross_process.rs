// SPDX-License-Identifier: Apache-2.0
// Copyright 2026 The Outpost Authors

//! Cross-process tests exercising the real worker binary.
//!
//! Each test spawns `outpost-worker` and talks to it over the private
//! rendezvous channel, covering attach, invocation, faults, teardown,
//! and orphan detection with actual process boundaries in between.

use std::time::Duration;

use serde_json::json;
use tempfile::TempDir;

use outpost_core::transport::RendezvousPoint;
use outpost_core::{
    supervisor, Domain, DomainName, DomainOptions, MethodRegistry, OutpostError, ProcessToken,
    RendezvousName, WorkerPath,
};

fn worker_path() -> WorkerPath {
    WorkerPath::new(env!("CARGO_BIN_EXE_outpost-worker")).unwrap()
}

fn name(text: &str) -> DomainName {
    DomainName::new(text).unwrap()
}

fn test_options(dir: &TempDir) -> DomainOptions {
    DomainOptions {
        runtime_dir: dir.path().to_path_buf(),
        attach_timeout: Duration::from_secs(10),
        call_timeout: Some(Duration::from_secs(10)),
        parent_poll_interval: Duration::from_millis(50),
        ..DomainOptions::default()
    }
}

/// Poll until the pid is gone, or fail after five seconds.
async fn wait_until_dead(pid: u32) {
    for _ in 0..100 {
        if !supervisor::process_alive(pid) {
            return;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    panic!("process {pid} still alive after 5s");
}

#[tokio::test]
async fn test_invoke_in_spawned_worker() {
    let dir = TempDir::new().unwrap();
    let registry = MethodRegistry::new_shared();
    outpost_cli::demo::install(&registry).unwrap();

    let domain = Domain::create(name("calc"), &worker_path(), registry, test_options(&dir))
        .await
        .unwrap();

    let sum = domain
        .execute("calc::add", vec![json!(2), json!(3)])
        .await
        .unwrap();
    assert_eq!(sum, json!(5));

    // The call really ran in the other process.
    let worker_pid = domain
        .execute("env::worker_pid", vec![])
        .await
        .unwrap()
        .as_u64()
        .unwrap() as u32;
    assert_ne!(worker_pid, std::process::id());
    assert_eq!(Some(worker_pid), domain.child_pid());

    domain.shutdown();
    wait_until_dead(worker_pid).await;
}

#[tokio::test]
async fn test_fault_crosses_the_process_boundary() {
    let dir = TempDir::new().unwrap();
    let registry = MethodRegistry::new_shared();
    outpost_cli::demo::install(&registry).unwrap();

    let domain = Domain::create(name("faults"), &worker_path(), registry, test_options(&dir))
        .await
        .unwrap();

    let err = domain
        .execute("calc::div", vec![json!(1), json!(0)])
        .await
        .unwrap_err();
    match err {
        OutpostError::Remote(fault) => {
            assert_eq!(fault.kind, "InvalidOperationError");
            assert_eq!(fault.message, "division by zero");
        }
        other => panic!("expected remote fault, got {other:?}"),
    }

    // The fault did not poison the channel.
    let sum = domain
        .execute("calc::add", vec![json!(4), json!(4)])
        .await
        .unwrap();
    assert_eq!(sum, json!(8));

    domain.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_slow_worker_call_does_not_block_fast_one() {
    let dir = TempDir::new().unwrap();
    let registry = MethodRegistry::new_shared();
    outpost_cli::demo::install(&registry).unwrap();

    let domain = Domain::create(name("timer"), &worker_path(), registry, test_options(&dir))
        .await
        .unwrap();

    let slow = {
        let domain = std::sync::Arc::clone(&domain);
        tokio::spawn(async move { domain.execute("clock::sleep_ms", vec![json!(800)]).await })
    };
    // Give the slow request a head start onto the wire.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let fast = domain
        .execute("calc::add", vec![json!(20), json!(22)])
        .await
        .unwrap();
    assert_eq!(fast, json!(42));
    assert!(!slow.is_finished(), "slow call should still be running");

    let slept = slow.await.unwrap().unwrap();
    assert_eq!(slept, json!(800));

    domain.shutdown();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_two_workers_with_distinct_names() {
    let dir = TempDir::new().unwrap();
    let registry = MethodRegistry::new_shared();
    outpost_cli::demo::install(&registry).unwrap();

    let alpha = Domain::create(
        name("alpha"),
        &worker_path(),
        std::sync::Arc::clone(&registry),
        test_options(&dir),
    )
    .await
    .unwrap();
    let beta = Domain::create(name("beta"), &worker_path(), registry, test_options(&dir))
        .await
        .unwrap();

    let alpha_pid = alpha.execute("env::worker_pid", vec![]).await.unwrap();
    let beta_pid = beta.execute("env::worker_pid", vec![]).await.unwrap();
    assert_ne!(alpha_pid, beta_pid);

    alpha.shutdown();
    beta.shutdown();
}

#[tokio::test]
async fn test_worker_exits_when_watched_process_dies() {
    let dir = TempDir::new().unwrap();
    let options = test_options(&dir);

    // Stand-in for a creator that dies without saying goodbye: the
    // rendezvous token carries the sleeper's pid, so the worker
    // watches the sleeper, not this test process.
    let mut sleeper = tokio::process::Command::new("sleep")
        .arg("60")
        .kill_on_drop(true)
        .spawn()
        .unwrap();
    let sleeper_pid = sleeper.id().unwrap();

    let rendezvous = RendezvousName::new(
        ProcessToken::new(sleeper_pid).unwrap(),
        name("guard"),
    );
    let point = RendezvousPoint::create(&rendezvous, &options).unwrap();
    let spawned = supervisor::spawn_worker(&worker_path(), &rendezvous, &options).unwrap();
    let _channel = point.accept(&options).await.unwrap();

    sleeper.start_kill().unwrap();
    let _ = sleeper.wait().await;

    let mut worker = spawned.into_child();
    let status = tokio::time::timeout(Duration::from_secs(5), worker.wait())
        .await
        .expect("worker did not exit after its watched process died")
        .unwrap();
    assert!(status.success());
}

#[tokio::test]
async fn test_worker_without_rendezvous_exits_cleanly() {
    let status = tokio::process::Command::new(env!("CARGO_BIN_EXE_outpost-worker"))
        .status()
        .await
        .unwrap();
    assert!(status.success());
}
