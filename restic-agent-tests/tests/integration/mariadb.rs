//! MariaDB dump streamed into a local repository
//!
//! Requires Docker and restic.

use super::common::*;
use test_utils::*;

const CONTAINER: &str = "restic-agent-test-mariadb";

#[tokio::test]
#[ignore] // Requires Docker and restic
async fn test_mariadb_dump_lands_in_snapshot() -> TestResult {
    if !is_docker_available() || !is_restic_available() {
        println!("Docker or restic not available, skipping test");
        return Ok(());
    }

    start_container(
        CONTAINER,
        "mariadb:11",
        &["MARIADB_ROOT_PASSWORD=testpass", "MARIADB_DATABASE=testdb"],
    )?;
    let _container = ContainerGuard::new(CONTAINER);
    wait_until_ready(CONTAINER, &["mariadb", "-uroot", "-ptestpass", "-e", "SELECT 1"])?;
    docker_exec(
        CONTAINER,
        &[
            "mariadb",
            "-uroot",
            "-ptestpass",
            "testdb",
            "-e",
            "CREATE TABLE pages (id INT PRIMARY KEY, title TEXT); INSERT INTO pages VALUES (1, 'front-page');",
        ],
    )?;

    let builder = ConfigBuilder::minimal().with_mariadb("localhost", "root", "testpass", "testdb");
    let (mut config, dir) = builder.persist();
    let wrapper = container_tool(dir.path(), CONTAINER, "mariadb-dump", &[])?;
    config.binaries.mariadb_dump = wrapper.display().to_string();

    let (set, metrics) = real_backup_set(&config)?;
    assert!(set.run_synchronously().await);
    assert_eq!(metrics.succeeded(), 1, "dump step failed");

    let dump = restic_dump_latest(&config, "/mysql-localhost-testdb.dmp")?;
    assert!(dump.contains("CREATE TABLE `pages`"));
    assert!(dump.contains("front-page"));
    Ok(())
}
