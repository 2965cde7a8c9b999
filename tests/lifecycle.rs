//! Boot, inheritance, crash-loop, and shutdown behavior of the supervisor.
//!
//! These tests spawn real `/bin/sh` children on ephemeral ports and observe
//! the supervisor through its status file and published events.

#[path = "common.rs"]
mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{read_status, sh_config, wait_for, Recorder};
use genvisor::events::EventKind;
use genvisor::{inherit, Supervisor, SupervisorError};
use tokio_util::sync::CancellationToken;

#[tokio::test]
async fn healthy_boot_writes_status_and_exports_inheritance() {
    let dir = tempfile::tempdir().unwrap();
    let status = dir.path().join("status");
    let seen_env = dir.path().join("env");

    let mut cfg = sh_config(&format!(
        "echo \"$SERVER_STARTER_PORT|$SERVER_STARTER_GENERATION\" > {}; exec sleep 60",
        seen_env.display()
    ));
    cfg.ports = vec!["0".into()];
    cfg.interval = Duration::from_millis(100);
    cfg.status_file = Some(status.clone());

    let supervisor = Arc::new(Supervisor::new(cfg, vec![]));
    let runner = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.run().await })
    };

    assert!(
        wait_for(Duration::from_secs(5), || {
            read_status(&status).len() == 1 && seen_env.exists()
        })
        .await,
        "first generation never became healthy"
    );

    let entries = read_status(&status);
    assert_eq!(entries[0].0, 1, "first generation must be 1");

    // the child observed exactly the mappings the supervisor bound
    let addr = supervisor.listener_addrs().remove(0);
    assert!(addr.starts_with("0.0.0.0:"));
    let contents = std::fs::read_to_string(&seen_env).unwrap();
    let (ports, generation) = contents.trim_end().split_once('|').unwrap();
    let mappings = inherit::parse_port_mappings(ports).unwrap();
    assert_eq!(mappings.len(), 1);
    assert_eq!(mappings[0].addr, addr);
    assert_eq!(mappings[0].fd, 3);
    assert_eq!(generation, "1");

    supervisor.shutdown(&CancellationToken::new()).await.unwrap();
    runner.await.unwrap().unwrap();
    assert!(read_status(&status).is_empty(), "status must drain on shutdown");
}

#[tokio::test]
async fn pid_file_collision_blocks_startup() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("app.pid");
    std::fs::write(&pid_file, "99999\n").unwrap();

    let mut cfg = sh_config("exec sleep 60");
    cfg.ports = vec!["0".into()];
    cfg.pid_file = Some(pid_file.clone());

    let supervisor = Supervisor::new(cfg, vec![]);
    match supervisor.run().await {
        Err(SupervisorError::PidFile { source, .. }) => {
            assert_eq!(source.kind(), std::io::ErrorKind::AlreadyExists);
        }
        other => panic!("expected pid file error, got {other:?}"),
    }
    // the stale file is left alone for its owner
    assert_eq!(std::fs::read_to_string(&pid_file).unwrap(), "99999\n");
}

#[tokio::test]
async fn pid_file_is_written_and_removed() {
    let dir = tempfile::tempdir().unwrap();
    let pid_file = dir.path().join("app.pid");
    let status = dir.path().join("status");

    let mut cfg = sh_config("exec sleep 60");
    cfg.ports = vec!["0".into()];
    cfg.interval = Duration::from_millis(100);
    cfg.pid_file = Some(pid_file.clone());
    cfg.status_file = Some(status.clone());

    let supervisor = Arc::new(Supervisor::new(cfg, vec![]));
    let runner = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.run().await })
    };

    assert!(wait_for(Duration::from_secs(5), || !read_status(&status).is_empty()).await);
    let contents = std::fs::read_to_string(&pid_file).unwrap();
    assert_eq!(contents, format!("{}\n", std::process::id()));

    supervisor.shutdown(&CancellationToken::new()).await.unwrap();
    runner.await.unwrap().unwrap();
    assert!(!pid_file.exists(), "pid file must be removed at shutdown");
}

#[tokio::test]
async fn crash_loop_retries_until_terminated() {
    let recorder = Recorder::new();

    let mut cfg = sh_config("exit 1");
    cfg.ports = vec!["0".into()];
    cfg.interval = Duration::from_millis(50);

    let supervisor = Arc::new(Supervisor::new(cfg, vec![recorder.clone()]));
    let runner = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.run().await })
    };

    // a perpetually failing command retries forever instead of returning
    assert!(
        wait_for(Duration::from_secs(5), || {
            recorder.count(EventKind::WorkerBootFailed) >= 3
        })
        .await,
        "boot watchdog retries were not observed"
    );
    assert!(!runner.is_finished(), "run must not return while retrying");

    supervisor.shutdown(&CancellationToken::new()).await.unwrap();
    runner.await.unwrap().unwrap();

    let failures = recorder.of_kind(EventKind::WorkerBootFailed);
    assert!(failures
        .iter()
        .all(|e| e.status.as_deref() == Some("exit status: 1")));
}

#[tokio::test]
async fn concurrent_shutdowns_converge() {
    let dir = tempfile::tempdir().unwrap();
    let status = dir.path().join("status");
    let pid_file = dir.path().join("app.pid");

    let mut cfg = sh_config("exec sleep 60");
    cfg.ports = vec!["0".into()];
    cfg.interval = Duration::from_millis(100);
    cfg.status_file = Some(status.clone());
    cfg.pid_file = Some(pid_file.clone());

    let supervisor = Arc::new(Supervisor::new(cfg, vec![]));
    let runner = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.run().await })
    };
    assert!(wait_for(Duration::from_secs(5), || !read_status(&status).is_empty()).await);

    // both shutdown paths may race; teardown still runs exactly once
    let first = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.shutdown(&CancellationToken::new()).await })
    };
    let second = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.shutdown(&CancellationToken::new()).await })
    };
    first.await.unwrap().unwrap();
    second.await.unwrap().unwrap();
    runner.await.unwrap().unwrap();

    assert!(!pid_file.exists());
    assert!(read_status(&status).is_empty());
}

#[tokio::test]
async fn worker_runs_in_the_configured_directory() {
    let dir = tempfile::tempdir().unwrap();
    let workdir = dir.path().join("wd");
    std::fs::create_dir(&workdir).unwrap();
    let seen_pwd = dir.path().join("pwd");

    let mut cfg = sh_config(&format!("pwd > {}; exec sleep 60", seen_pwd.display()));
    cfg.ports = vec!["0".into()];
    cfg.interval = Duration::from_millis(100);
    cfg.dir = Some(workdir.clone());

    let supervisor = Arc::new(Supervisor::new(cfg, vec![]));
    let runner = {
        let supervisor = Arc::clone(&supervisor);
        tokio::spawn(async move { supervisor.run().await })
    };

    assert!(wait_for(Duration::from_secs(5), || seen_pwd.exists()).await);
    // tolerate symlinked temp dirs by resolving both sides
    let reported = std::fs::canonicalize(
        std::fs::read_to_string(&seen_pwd).unwrap().trim_end(),
    )
    .unwrap();
    assert_eq!(reported, std::fs::canonicalize(&workdir).unwrap());

    supervisor.shutdown(&CancellationToken::new()).await.unwrap();
    runner.await.unwrap().unwrap();
}

#[tokio::test]
async fn missing_command_is_rejected() {
    let supervisor = Supervisor::new(genvisor::Config::default(), vec![]);
    match supervisor.run().await {
        Err(SupervisorError::CommandRequired) => {}
        other => panic!("expected CommandRequired, got {other:?}"),
    }
}
