//! PostgreSQL dump streamed into a local repository
//!
//! Requires Docker and restic. `pg_dump` runs inside the container through a
//! wrapper script so no client tools are needed on the host.

use super::common::*;
use serial_test::serial;
use test_utils::*;

const CONTAINER: &str = "restic-agent-test-postgres";

fn start_postgres() -> anyhow::Result<ContainerGuard> {
    start_container(
        CONTAINER,
        "postgres:15-alpine",
        &["POSTGRES_PASSWORD=testpass", "POSTGRES_DB=testdb"],
    )?;
    let guard = ContainerGuard::new(CONTAINER);
    wait_until_ready(CONTAINER, &["pg_isready", "-U", "postgres", "-d", "testdb"])?;
    Ok(guard)
}

fn exec_sql(sql: &str) -> anyhow::Result<String> {
    docker_exec(CONTAINER, &["psql", "-U", "postgres", "-d", "testdb", "-t", "-c", sql])
}

#[tokio::test]
#[ignore] // Requires Docker and restic
#[serial]
async fn test_postgres_dump_lands_in_snapshot() -> TestResult {
    if !is_docker_available() || !is_restic_available() {
        println!("Docker or restic not available, skipping test");
        return Ok(());
    }

    let _container = start_postgres()?;
    exec_sql("CREATE TABLE orders (id SERIAL PRIMARY KEY, item TEXT)")?;
    exec_sql("INSERT INTO orders (item) VALUES ('first-order'), ('second-order')")?;

    let builder = ConfigBuilder::minimal().with_postgres("localhost", "postgres", "testpass", "testdb");
    let (mut config, dir) = builder.persist();
    let wrapper = container_tool(dir.path(), CONTAINER, "pg_dump", &["PGPASSWORD=testpass"])?;
    config.binaries.pg_dump = wrapper.display().to_string();

    let (set, metrics) = real_backup_set(&config)?;
    assert!(set.run_synchronously().await);
    assert_eq!(metrics.succeeded(), 1, "dump step failed");

    let dump = restic_dump_latest(&config, "/psql-localhost-testdb.dmp")?;
    assert!(dump.contains("CREATE TABLE public.orders"));
    assert!(dump.contains("second-order"));

    let credentials = std::fs::read_to_string(dir.path().join("pgpass"))?;
    assert_eq!(credentials.trim(), "localhost:5432:testdb:postgres:testpass");
    Ok(())
}

#[tokio::test]
#[ignore] // Requires Docker and restic
#[serial]
async fn test_missing_database_fails_step() -> TestResult {
    if !is_docker_available() || !is_restic_available() {
        println!("Docker or restic not available, skipping test");
        return Ok(());
    }

    let _container = start_postgres()?;

    let builder = ConfigBuilder::minimal()
        .with_postgres("localhost", "postgres", "testpass", "no_such_db")
        .with_volume("/etc/hostname");
    let (mut config, dir) = builder.persist();
    let wrapper = container_tool(dir.path(), CONTAINER, "pg_dump", &["PGPASSWORD=testpass"])?;
    config.binaries.pg_dump = wrapper.display().to_string();

    let (set, metrics) = real_backup_set(&config)?;
    assert!(set.run_synchronously().await);

    assert_eq!(metrics.attempted(), 2);
    assert_eq!(metrics.failed(), 1);
    assert_eq!(metrics.succeeded(), 1);
    Ok(())
}
