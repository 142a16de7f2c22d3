use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    /// Directory trees to back up, one step each
    pub volumes: Vec<String>,

    pub agent: AgentConfig,
    pub repository: RepositoryConfig,
    pub binaries: Binaries,
    pub logging: LogSettings,

    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub postgres: Vec<DatabaseConfig>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub mariadb: Vec<DatabaseConfig>,
}

/// Agent runtime settings
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Passed to the engine as `--host`
    pub hostname: String,

    /// Run one backup immediately at startup
    pub run_on_startup: bool,

    /// Six-field cron expression (seconds first)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schedule: Option<String>,

    pub listen_address: String,

    /// 0 disables the HTTP server
    pub listen_port: u16,

    pub prometheus_endpoint: String,

    /// Postgres credentials file, `~/.pgpass` when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub credentials_file: Option<PathBuf>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            hostname: String::new(),
            run_on_startup: false,
            schedule: None,
            listen_address: default_listen_address(),
            listen_port: default_listen_port(),
            prometheus_endpoint: default_prometheus_endpoint(),
            credentials_file: None,
        }
    }
}

/// Repository locator and credential for the backup engine
#[derive(Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct RepositoryConfig {
    pub url: String,
    pub password: String,
}

impl fmt::Debug for RepositoryConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RepositoryConfig")
            .field("url", &self.url)
            .field("password", &mask(&self.password))
            .finish()
    }
}

/// Program names of the backup engine and the dump tools
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Binaries {
    pub restic: String,
    pub pg_dump: String,
    pub mariadb_dump: String,
}

impl Default for Binaries {
    fn default() -> Self {
        Self {
            restic: "restic".to_string(),
            pg_dump: "pg_dump".to_string(),
            mariadb_dump: "mariadb-dump".to_string(),
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LogSettings {
    /// Log file directory; console only when unset
    #[serde(skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,
    pub level: String,
    pub max_files: u32,
    pub format: LogFormat,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            directory: None,
            level: default_log_level(),
            max_files: default_log_max_files(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

/// One database to dump
#[derive(Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct DatabaseConfig {
    /// Host name, optionally with a `:port` suffix
    pub host: String,
    #[serde(default)]
    pub user: String,
    #[serde(default)]
    pub password: String,
    pub database: String,

    /// Overrides the derived snapshot file name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("host", &self.host)
            .field("user", &self.user)
            .field("password", &mask(&self.password))
            .field("database", &self.database)
            .field("name", &self.name)
            .finish()
    }
}

impl Config {
    /// Copy with all secrets replaced, for display
    pub fn masked(&self) -> Self {
        let mut copy = self.clone();
        copy.repository.password = mask(&copy.repository.password).to_string();
        for db in copy.postgres.iter_mut().chain(copy.mariadb.iter_mut()) {
            db.password = mask(&db.password).to_string();
        }
        copy
    }
}

fn mask(secret: &str) -> &'static str {
    if secret.is_empty() {
        ""
    } else {
        "***"
    }
}

// Default value functions

fn default_listen_address() -> String { "0.0.0.0".to_string() }
fn default_listen_port() -> u16 { 80 }
fn default_prometheus_endpoint() -> String { "/metrics".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_log_max_files() -> u32 { 10 }
