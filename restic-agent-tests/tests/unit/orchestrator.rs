//! Orchestrator behavior: run exclusion, fan-out, counters and bootstrap

use restic_agent::error::BackupError;
use std::sync::Arc;
use std::time::{Duration, Instant};
use test_utils::*;

#[tokio::test]
async fn test_single_volume_without_exclude_file() {
    let ctx = TestContext::with_executor(
        MockExecutor::new().expect("restic", MockResponse::success_with_stdout(&backup_output(4))),
    );
    let mut set = ctx.backup_set();
    set.add_step(ctx.volume_step("/data"));

    assert!(set.run_synchronously().await);

    let backups = ctx.executor().calls_for("restic", "backup");
    assert_eq!(backups.len(), 1);
    assert!(!backups[0].args.iter().any(|a| a.starts_with("--exclude-file")));
    assert_eq!(
        backups[0].args,
        vec!["backup", "--json", "--host", "test-host", "/data"]
    );

    let metrics = ctx.metrics();
    assert_eq!(metrics.attempted(), 1);
    assert_eq!(metrics.succeeded(), 1);
    assert_eq!(metrics.failed(), 0);
    assert_eq!(metrics.files_new.get(), 4);
}

#[tokio::test]
async fn test_repository_check_precedes_steps() {
    let ctx = TestContext::new();
    let mut set = ctx.backup_set();
    set.add_step(ctx.volume_step("/a"));
    set.add_step(ctx.volume_step("/b"));

    set.run_synchronously().await;

    let calls = ctx.executor().get_calls();
    assert_eq!(calls[0].subcommand(), Some("snapshots"));
    assert!(calls[1..].iter().all(|c| c.subcommand() == Some("backup")));
}

#[tokio::test]
async fn test_counters_match_step_count() {
    for step_count in [0usize, 1, 5] {
        let ctx = TestContext::with_executor(
            MockExecutor::new()
                .expect("restic", MockResponse::success())
                .expect_arg("restic", "/vol-0", MockResponse::failure(1, "read error")),
        );
        let mut set = ctx.backup_set();
        for i in 0..step_count {
            set.add_step(ctx.volume_step(&format!("/vol-{}", i)));
        }

        set.run_synchronously().await;

        let metrics = ctx.metrics();
        assert_eq!(metrics.attempted(), step_count as u64);
        assert_eq!(metrics.succeeded() + metrics.failed(), metrics.attempted());
    }
}

#[tokio::test]
async fn test_concurrent_triggers_run_once() {
    let ctx = TestContext::with_executor(MockExecutor::new().expect(
        "restic",
        MockResponse::success().with_delay(Duration::from_millis(100)),
    ));
    let mut set = ctx.backup_set();
    set.add_step(ctx.volume_step("/data"));
    let set = Arc::new(set);

    let handle = set.run_asynchronously().unwrap();
    let (first, second) = tokio::join!(set.run_synchronously(), set.run_synchronously());
    let third = set.run_asynchronously();
    handle.await.unwrap();

    assert!(!first);
    assert!(!second);
    assert!(matches!(third, Err(BackupError::AlreadyRunning)));
    assert_eq!(ctx.executor().calls_for("restic", "backup").len(), 1);
    assert_eq!(ctx.metrics().attempted(), 1);
    assert!(!set.is_running());
}

#[tokio::test]
async fn test_guard_released_after_every_run() {
    let ctx = TestContext::with_executor(
        MockExecutor::new().expect("restic", MockResponse::failure(1, "boom")),
    );
    let mut set = ctx.backup_set();
    set.add_step(ctx.volume_step("/data"));

    // Bootstrap fails: the check and the init both return 1
    assert!(set.run_synchronously().await);
    assert!(!set.is_running());
    // The guard is free again for the next run
    assert!(set.run_synchronously().await);
}

#[tokio::test]
async fn test_bootstrap_failure_executes_no_step() {
    let ctx = TestContext::with_executor(
        MockExecutor::new()
            .expect_arg("restic", "snapshots", MockResponse::failure(1, missing_repository_stderr()))
            .expect_arg("restic", "init", MockResponse::failure(1, "permission denied")),
    );
    let mut set = ctx.backup_set();
    set.add_step(ctx.volume_step("/data"));
    set.add_step(ctx.mariadb_step("db", "wiki"));

    set.run_synchronously().await;

    assert!(ctx.executor().calls_for("restic", "backup").is_empty());
    assert!(!ctx.executor().was_called("mariadb-dump"));
    let metrics = ctx.metrics();
    assert_eq!((metrics.attempted(), metrics.succeeded(), metrics.failed()), (0, 0, 0));
}

#[tokio::test]
async fn test_missing_repository_is_bootstrapped_before_steps() {
    let ctx = TestContext::with_executor(
        MockExecutor::new()
            .expect("restic", MockResponse::success())
            .expect_arg("restic", "snapshots", MockResponse::failure(1, missing_repository_stderr())),
    );
    let mut set = ctx.backup_set();
    set.add_step(ctx.volume_step("/data"));

    set.run_synchronously().await;

    let subcommands: Vec<_> = ctx
        .executor()
        .get_calls()
        .iter()
        .map(|c| c.subcommand().unwrap_or_default().to_string())
        .collect();
    assert_eq!(subcommands, vec!["snapshots", "init", "backup"]);
    assert_eq!(ctx.metrics().succeeded(), 1);
}

#[tokio::test]
async fn test_missing_metrics_aborts_before_bootstrap() {
    let ctx = TestContext::new();
    let mut set = ctx.backup_set_without_metrics();
    set.add_step(ctx.volume_step("/data"));

    assert!(set.run_synchronously().await);
    assert!(ctx.executor().get_calls().is_empty());
}

#[tokio::test]
async fn test_failing_step_does_not_block_sibling() {
    let ctx = TestContext::with_executor(
        MockExecutor::new()
            .expect_arg("restic", "/fast", MockResponse::success())
            .expect_arg(
                "restic",
                "/slow",
                MockResponse::failure(1, "disk error").with_delay(Duration::from_millis(300)),
            ),
    );
    let mut set = ctx.backup_set();
    set.add_step(ctx.volume_step("/slow"));
    set.add_step(ctx.volume_step("/fast"));
    let set = Arc::new(set);

    let started = Instant::now();
    let handle = set.run_asynchronously().unwrap();

    // The fast step reports long before the slow one fails
    while ctx.metrics().succeeded() == 0 {
        assert!(started.elapsed() < Duration::from_millis(250), "fast step was blocked");
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(ctx.metrics().failed(), 0);

    handle.await.unwrap();
    let metrics = ctx.metrics();
    assert_eq!(metrics.attempted(), 2);
    assert_eq!(metrics.succeeded(), 1);
    assert_eq!(metrics.failed(), 1);
}

#[tokio::test]
async fn test_steps_run_in_parallel() {
    let ctx = TestContext::with_executor(MockExecutor::new().expect(
        "restic",
        MockResponse::success().with_delay(Duration::from_millis(200)),
    ));
    let mut set = ctx.backup_set_without_metrics();
    set.set_metrics(Arc::clone(ctx.metrics()));
    for i in 0..4 {
        set.add_step(ctx.volume_step(&format!("/vol-{}", i)));
    }

    let started = Instant::now();
    set.run_synchronously().await;

    // One check plus four parallel backups, not five sequential calls
    assert!(started.elapsed() < Duration::from_millis(800));
    assert_eq!(ctx.metrics().succeeded(), 4);
}

#[tokio::test]
async fn test_destination_configured_late_is_not_seen_by_steps() {
    let ctx = TestContext::new();
    let mut set = ctx.backup_set();
    set.add_step(ctx.volume_step("/data"));
    set.set_hostname("late-host");

    set.run_synchronously().await;

    let backup = &ctx.executor().calls_for("restic", "backup")[0];
    assert!(backup.has_arg("test-host"));
    assert!(!backup.has_arg("late-host"));
}
