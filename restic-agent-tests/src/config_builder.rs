//! Fluent API for building test configurations
//!
//! Provides a builder pattern for creating test configurations with sensible defaults.

use restic_agent::config::{Config, DatabaseConfig};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;

/// Builder for creating test configurations
pub struct ConfigBuilder {
    temp_dir: TempDir,
    config: Config,
}

impl ConfigBuilder {
    /// Defaults, with the HTTP server disabled and the Postgres credentials
    /// file inside the temp directory
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");

        let mut config = Config::default();
        config.agent.listen_port = 0;
        config.agent.credentials_file = Some(temp_dir.path().join("pgpass"));

        Self { temp_dir, config }
    }

    /// A local repository and a host label
    pub fn minimal() -> Self {
        let mut builder = Self::new();

        let repository = builder.temp_dir.path().join("repository");
        fs::create_dir_all(&repository).expect("Failed to create repository dir");

        builder.config.repository.url = repository.display().to_string();
        builder.config.repository.password = "test-password-123".to_string();
        builder.config.agent.hostname = "test-host".to_string();
        builder
    }

    pub fn with_hostname(mut self, hostname: &str) -> Self {
        self.config.agent.hostname = hostname.to_string();
        self
    }

    pub fn with_volume(mut self, path: &str) -> Self {
        self.config.volumes.push(path.to_string());
        self
    }

    pub fn with_postgres(mut self, host: &str, user: &str, password: &str, database: &str) -> Self {
        self.config.postgres.push(database_config(host, user, password, database));
        self
    }

    pub fn with_mariadb(mut self, host: &str, user: &str, password: &str, database: &str) -> Self {
        self.config.mariadb.push(database_config(host, user, password, database));
        self
    }

    pub fn with_schedule(mut self, schedule: &str) -> Self {
        self.config.agent.schedule = Some(schedule.to_string());
        self
    }

    pub fn with_listen_port(mut self, port: u16) -> Self {
        self.config.agent.listen_port = port;
        self
    }

    pub fn with_restic_binary(mut self, program: &str) -> Self {
        self.config.binaries.restic = program.to_string();
        self
    }

    /// Path of the credentials file the built config points at
    pub fn credentials_path(&self) -> PathBuf {
        self.temp_dir.path().join("pgpass")
    }

    /// Build the config; the temp directory is removed when the builder drops
    pub fn build(self) -> Config {
        self.config
    }

    /// Write the config as `agent.toml` and keep the temp directory alive
    pub fn persist(self) -> (Config, TempDir) {
        let path = self.temp_dir.path().join("agent.toml");
        let contents = toml::to_string_pretty(&self.config).expect("Failed to serialize config");
        fs::write(&path, contents).expect("Failed to write config file");
        (self.config, self.temp_dir)
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn database_config(host: &str, user: &str, password: &str, database: &str) -> DatabaseConfig {
    DatabaseConfig {
        host: host.to_string(),
        user: user.to_string(),
        password: password.to_string(),
        database: database.to_string(),
        name: None,
    }
}
