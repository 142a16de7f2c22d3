//! Step behavior: guards, invocation shapes and the dump pipe

use restic_agent::error::BackupError;
use restic_agent::steps::BackupStep;
use test_utils::*;

#[tokio::test]
async fn test_held_step_guard_launches_nothing() {
    let ctx = TestContext::new();
    let toolchain = ctx.toolchain();

    let steps = [
        BackupStep::from(ctx.volume_step("/data")),
        BackupStep::from(ctx.postgres_step("db", "shop")),
        BackupStep::from(ctx.mariadb_step("db", "wiki")),
    ];
    for step in &steps {
        assert!(step.run_guard().acquire());
        let err = step.run(&toolchain, ctx.metrics()).await.unwrap_err();
        assert!(err.is_already_running(), "{} ran while held", step.kind());
        step.run_guard().release();
    }

    assert!(ctx.executor().get_calls().is_empty());
}

#[tokio::test]
async fn test_postgres_dump_failure_wins() {
    let ctx = TestContext::with_executor(
        MockExecutor::new()
            .expect("pg_dump", MockResponse::failure(1, "pg_dump: error: connection to server failed"))
            .expect_arg("restic", "--stdin", MockResponse::failure(1, "Fatal: unexpected EOF")),
    );
    let step = BackupStep::from(ctx.postgres_step("db", "shop"));

    let err = step.run(&ctx.toolchain(), ctx.metrics()).await.unwrap_err();
    match err {
        BackupError::ExternalProcess { program, code, stderr } => {
            assert_eq!(program, "pg_dump");
            assert_eq!(code, Some(1));
            assert!(stderr.contains("connection to server failed"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_postgres_dump_failure_counts_as_failed_step() {
    let ctx = TestContext::with_executor(
        MockExecutor::new()
            .expect("restic", MockResponse::success())
            .expect("pg_dump", MockResponse::failure(1, "no such database")),
    );
    let mut set = ctx.backup_set();
    set.add_step(ctx.postgres_step("db", "shop"));

    set.run_synchronously().await;

    let metrics = ctx.metrics();
    assert_eq!(metrics.attempted(), 1);
    assert_eq!(metrics.failed(), 1);
    assert!(!set.steps()[0].is_running());
}

#[tokio::test]
async fn test_postgres_pipe_shapes() {
    let ctx = TestContext::new();
    let mut set = ctx.backup_set();
    set.add_step(ctx.postgres_step("db", "shop"));

    set.run_synchronously().await;

    let calls = ctx.executor().get_calls();
    let dump = calls.iter().find(|c| c.program == "pg_dump").assert_some();
    assert_eq!(dump.args, vec!["-h", "db", "-U", "backup", "-w", "-d", "shop"]);
    assert!(dump.env_value("PGPASSFILE").assert_some().ends_with("pgpass"));

    let backup = &ctx.executor().calls_for("restic", "backup")[0];
    assert_eq!(
        backup.args,
        vec![
            "backup",
            "--json",
            "--host",
            "test-host",
            "--stdin",
            "--stdin-filename",
            "/psql-db-shop.dmp"
        ]
    );
    assert_eq!(backup.env_value("RESTIC_PASSWORD"), Some("test-password-123"));
}

#[tokio::test]
async fn test_mariadb_pipe_shapes() {
    let ctx = TestContext::new();
    let mut set = ctx.backup_set();
    set.add_step(ctx.mariadb_step("maria:3307", "wiki"));

    set.run_synchronously().await;

    let calls = ctx.executor().get_calls();
    let dump = calls.iter().find(|c| c.program == "mariadb-dump").assert_some();
    assert_eq!(
        dump.args,
        vec!["-h", "maria", "-u", "root", "-pmaria-secret", "-P", "3307", "wiki"]
    );
    let backup = &ctx.executor().calls_for("restic", "backup")[0];
    assert!(backup.has_arg("/mysql-maria-wiki.dmp"));
    assert_eq!(ctx.metrics().succeeded(), 1);
}

#[tokio::test]
async fn test_consumer_failure_reported_when_dump_succeeds() {
    let ctx = TestContext::with_executor(
        MockExecutor::new()
            .expect_arg("restic", "--stdin", MockResponse::failure(11, "Fatal: unable to create lock")),
    );
    let step = BackupStep::from(ctx.mariadb_step("db", "wiki"));

    let err = step.run(&ctx.toolchain(), ctx.metrics()).await.unwrap_err();
    assert_eq!(err.exit_code(), Some(11));
    assert!(err.to_string().contains("restic"));
}

#[tokio::test]
async fn test_exclude_file_is_passed() {
    let ctx = TestContext::new();
    let volume = ctx.create_subdir("volume");
    ctx.create_file("volume/.resticexclude", "*.tmp\n");
    let volume = volume.display().to_string();

    let mut set = ctx.backup_set();
    set.add_step(ctx.volume_step(&volume));
    set.run_synchronously().await;

    let backup = &ctx.executor().calls_for("restic", "backup")[0];
    assert!(backup.has_arg(&format!("--exclude-file={}/.resticexclude", volume)));
    assert_eq!(backup.args.last(), Some(&volume));
}

#[test]
fn test_repeated_postgres_steps_keep_one_credential_line() {
    let ctx = TestContext::new();
    let _first = ctx.postgres_step("db", "shop");
    let _second = ctx.postgres_step("db", "shop");
    let _other = ctx.postgres_step("db:5433", "shop");

    let contents = ctx.read_file("pgpass").unwrap();
    assert_eq!(contents.lines().count(), 2);
    assert!(contents.contains("db:5433:shop:backup:pg-secret"));
}
