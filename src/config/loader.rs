use super::types::*;
use crate::utils::cron::parse_schedule;
use std::fs;
use std::path::Path;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Invalid value for {key}: '{value}'")]
    InvalidValue { key: String, value: String },

    #[error("Invalid schedule '{expression}': {reason}")]
    InvalidSchedule { expression: String, reason: String },

    #[error("Validation error: {0}")]
    ValidationError(String),
}

pub type Result<T> = std::result::Result<T, ConfigError>;

/// Routes served next to the metrics endpoint
const CONTROL_ROUTES: [&str; 4] = ["/run", "/start", "/initialize", "/running"];

/// Command-line values, applied last
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub hostname: Option<String>,
    pub volumes: Vec<String>,
    pub run_on_startup: bool,
    pub schedule: Option<String>,
    pub listen_address: Option<String>,
    pub listen_port: Option<u16>,
}

/// Defaults, then the file (if any), then the environment, then `overrides`.
/// The result is validated.
pub fn load_config<F>(path: Option<&Path>, lookup: F, overrides: &Overrides) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config = match path {
        Some(path) => parse_config_file(path)?,
        None => Config::default(),
    };
    config.apply_env(lookup)?;
    config.apply_overrides(overrides);
    validate_config(&config)?;
    Ok(config)
}

pub fn parse_config_file(path: &Path) -> Result<Config> {
    let contents = fs::read_to_string(path)?;
    Ok(toml::from_str(&contents)?)
}

impl Config {
    /// Overlay the agent's environment variables. Unset and empty variables
    /// leave the current value alone.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.is_empty());

        if let Some(url) = get("RESTIC_REPOSITORY") {
            self.repository.url = url;
        }
        if let Some(password) = get("RESTIC_PASSWORD") {
            self.repository.password = password;
        }
        if let Some(hostname) = get("RESTIC_HOSTNAME") {
            self.agent.hostname = hostname;
        }
        if let Some(value) = get("RUN_ON_STARTUP") {
            self.agent.run_on_startup = parse_bool("RUN_ON_STARTUP", &value)?;
        }
        if let Some(schedule) = get("SCHEDULE") {
            self.agent.schedule = Some(schedule);
        }
        if let Some(address) = get("LISTEN_ADDRESS") {
            self.agent.listen_address = address;
        }
        if let Some(value) = get("LISTEN_PORT") {
            self.agent.listen_port = value.trim().parse().map_err(|_| ConfigError::InvalidValue {
                key: "LISTEN_PORT".to_string(),
                value,
            })?;
        }
        if let Some(endpoint) = get("PROMETHEUS_ENDPOINT") {
            self.agent.prometheus_endpoint = endpoint;
        }

        if let Some(database) = database_from_env("POSTGRES", &get) {
            self.postgres.push(database);
        }
        if let Some(database) = database_from_env("MARIADB", &get) {
            self.mariadb.push(database);
        }

        Ok(())
    }

    pub fn apply_overrides(&mut self, overrides: &Overrides) {
        if let Some(hostname) = &overrides.hostname {
            self.agent.hostname = hostname.clone();
        }
        self.volumes.extend(overrides.volumes.iter().cloned());
        if overrides.run_on_startup {
            self.agent.run_on_startup = true;
        }
        if let Some(schedule) = &overrides.schedule {
            self.agent.schedule = Some(schedule.clone());
        }
        if let Some(address) = &overrides.listen_address {
            self.agent.listen_address = address.clone();
        }
        if let Some(port) = overrides.listen_port {
            self.agent.listen_port = port;
        }
    }
}

/// `<PREFIX>_HOST`, `_USER`, `_PASSWORD`, `_DB`, `_NAME`; only when a host
/// is set
fn database_from_env<F>(prefix: &str, get: &F) -> Option<DatabaseConfig>
where
    F: Fn(&str) -> Option<String>,
{
    let var = |suffix: &str| get(format!("{}_{}", prefix, suffix).as_str());
    let host = var("HOST")?;
    Some(DatabaseConfig {
        host,
        user: var("USER").unwrap_or_default(),
        password: var("PASSWORD").unwrap_or_default(),
        database: var("DB").unwrap_or_default(),
        name: var("NAME"),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "t" | "true" | "yes" | "on" => Ok(true),
        "0" | "f" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidValue {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

/// Validate the configuration
pub fn validate_config(config: &Config) -> Result<()> {
    if let Some(expression) = &config.agent.schedule {
        parse_schedule(expression).map_err(|e| ConfigError::InvalidSchedule {
            expression: expression.clone(),
            reason: e.to_string(),
        })?;
    }

    let endpoint = &config.agent.prometheus_endpoint;
    if !endpoint.starts_with('/') || endpoint.len() < 2 {
        return Err(ConfigError::ValidationError(format!(
            "Metrics endpoint must be an absolute path: '{}'",
            endpoint
        )));
    }
    if CONTROL_ROUTES.contains(&endpoint.as_str()) {
        return Err(ConfigError::ValidationError(format!(
            "Metrics endpoint collides with control route '{}'",
            endpoint
        )));
    }

    if config.volumes.iter().any(|v| v.trim().is_empty()) {
        return Err(ConfigError::ValidationError(
            "Volume paths must not be empty".to_string(),
        ));
    }

    for (kind, databases) in [("postgres", &config.postgres), ("mariadb", &config.mariadb)] {
        for database in databases {
            validate_database(kind, database)?;
        }
    }

    Ok(())
}

fn validate_database(kind: &str, database: &DatabaseConfig) -> Result<()> {
    let missing = [
        ("host", &database.host),
        ("user", &database.user),
        ("database", &database.database),
    ]
    .into_iter()
    .find(|(_, value)| value.trim().is_empty());

    if let Some((field, _)) = missing {
        return Err(ConfigError::ValidationError(format!(
            "{} database on '{}' is missing '{}'",
            kind, database.host, field
        )));
    }
    Ok(())
}
