//! Volume backups against a local repository
//!
//! Requires the restic binary on PATH.

use super::common::*;
use test_utils::*;

#[tokio::test]
#[ignore] // Requires restic
async fn test_volume_backup_bootstraps_repository() -> TestResult {
    if !is_restic_available() {
        println!("restic not available, skipping test");
        return Ok(());
    }

    let ctx = TestContext::new();
    let volume = ctx.create_subdir("volume");
    ctx.create_file("volume/keep.txt", "important data\n");
    ctx.create_file("volume/scratch.tmp", "throwaway\n");
    ctx.create_file("volume/.resticexclude", "*.tmp\n");
    let volume = volume.display().to_string();

    let (config, _dir) = ConfigBuilder::minimal().with_volume(&volume).persist();
    let (set, metrics) = real_backup_set(&config)?;

    assert!(set.run_synchronously().await);
    assert_eq!(metrics.succeeded(), 1);
    assert_eq!(metrics.failed(), 0);
    assert!(metrics.encode()?.contains("backup_restic_files_new 2"));

    let kept = restic_dump_latest(&config, &format!("{}/keep.txt", volume))?;
    assert_eq!(kept, "important data\n");
    assert!(restic_dump_latest(&config, &format!("{}/scratch.tmp", volume)).is_err());

    // Second run finds the existing repository
    assert!(set.run_synchronously().await);
    assert_eq!(metrics.succeeded(), 2);
    assert_eq!(restic_snapshot_count(&config)?, 2);
    Ok(())
}

#[tokio::test]
#[ignore] // Requires restic
async fn test_wrong_password_fails_without_steps() -> TestResult {
    if !is_restic_available() {
        println!("restic not available, skipping test");
        return Ok(());
    }

    let (mut config, _dir) = ConfigBuilder::minimal().with_volume("/etc").persist();
    let (set, _) = real_backup_set(&config)?;
    assert!(set.run_synchronously().await);

    config.repository.password = "not-the-password".to_string();
    let (set, metrics) = real_backup_set(&config)?;
    assert!(set.run_synchronously().await);

    assert_eq!(metrics.attempted(), 0);
    assert!(restic_snapshot_count(&config).is_err());
    Ok(())
}
