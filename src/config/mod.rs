//! Configuration module for restic-agent
//!
//! Settings are applied in this order (later overrides earlier):
//! 1. Built-in defaults
//! 2. TOML file (optional)
//! 3. Environment variables (`RESTIC_REPOSITORY`, `POSTGRES_HOST`, ...)
//! 4. Command-line flags
//!
//! ## Example Usage
//!
//! ```no_run
//! use restic_agent::config::{self, Overrides};
//! use restic_agent::utils::RealExecutor;
//! use std::path::Path;
//! use std::sync::Arc;
//!
//! let config = config::load_config(
//!     Some(Path::new("agent.toml")),
//!     |key| std::env::var(key).ok(),
//!     &Overrides::default(),
//! )?;
//! let backup_set = config::build_backup_set(&config, Arc::new(RealExecutor::new()))?;
//! println!("{} steps", backup_set.steps().len());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

mod loader;
mod types;

pub use loader::{load_config, parse_config_file, validate_config, ConfigError, Overrides, Result};
pub use types::*;

use crate::error::BackupError;
use crate::managers::backup::BackupSet;
use crate::steps::{MariaDbStep, PostgresStep, Toolchain, VolumeStep};
use crate::utils::executor::CommandExecutor;
use crate::utils::pgpass::PgPassFile;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Turn a validated configuration into a backup set.
///
/// The destination is set before any step is added. Metrics are not
/// attached.
pub fn build_backup_set(
    config: &Config,
    executor: Arc<dyn CommandExecutor>,
) -> crate::error::Result<BackupSet> {
    let mut set = BackupSet::new(Toolchain::new(executor, config.binaries.clone()));
    set.set_repository(&config.repository.url, &config.repository.password);
    set.set_hostname(&config.agent.hostname);

    for volume in &config.volumes {
        set.add_step(VolumeStep::new(volume.clone()));
    }

    if !config.postgres.is_empty() {
        let credentials = credentials_file(config)?;
        for database in &config.postgres {
            let mut step = PostgresStep::new(
                &database.host,
                &database.user,
                &database.password,
                &database.database,
                credentials.clone(),
            )?;
            if let Some(name) = &database.name {
                step.set_name(name.clone());
            }
            set.add_step(step);
        }
    }

    for database in &config.mariadb {
        let mut step = MariaDbStep::new(
            &database.host,
            &database.user,
            &database.password,
            &database.database,
        );
        if let Some(name) = &database.name {
            step.set_name(name.clone());
        }
        set.add_step(step);
    }

    Ok(set)
}

fn credentials_file(config: &Config) -> crate::error::Result<PgPassFile> {
    match &config.agent.credentials_file {
        Some(path) => Ok(PgPassFile::new(expand_tilde(path))),
        None => PgPassFile::user_default().ok_or_else(|| BackupError::Credentials {
            path: "~/.pgpass".to_string(),
            source: std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "home directory not found",
            ),
        }),
    }
}

/// Expand tilde (~) in path
pub fn expand_tilde(path: &Path) -> PathBuf {
    if let Ok(stripped) = path.strip_prefix("~") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    path.to_path_buf()
}
