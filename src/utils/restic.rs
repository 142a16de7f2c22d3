//! Backup engine invocations and output parsing

use super::command::Invocation;
use crate::config::Binaries;
use crate::steps::Destination;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use tracing::warn;

/// Conventional exclude file looked up at the root of a volume
pub const EXCLUDE_FILE_NAME: &str = ".resticexclude";

/// Environment variables for the engine
#[derive(Default)]
pub struct ResticEnv {
    vars: HashMap<String, String>,
}

impl ResticEnv {
    /// Repository and password are only set when configured; otherwise the
    /// engine falls back to the inherited process environment.
    pub fn from_destination(destination: &Destination) -> Self {
        let mut vars = HashMap::new();
        if !destination.repository.is_empty() {
            vars.insert(
                "RESTIC_REPOSITORY".to_string(),
                destination.repository.clone(),
            );
        }
        if !destination.password.is_empty() {
            vars.insert("RESTIC_PASSWORD".to_string(), destination.password.clone());
        }
        Self { vars }
    }

    /// Add custom environment variable
    pub fn add(&mut self, key: String, value: String) {
        self.vars.insert(key, value);
    }

    pub fn vars(&self) -> &HashMap<String, String> {
        &self.vars
    }
}

/// Build an engine invocation against the destination's repository
pub fn engine_invocation(
    binaries: &Binaries,
    destination: &Destination,
    args: Vec<String>,
) -> Invocation {
    let env = ResticEnv::from_destination(destination);
    Invocation::new(&binaries.restic)
        .args(args)
        .envs(env.vars())
}

/// `snapshots --json --last`
pub fn snapshots_args() -> Vec<String> {
    ["snapshots", "--json", "--last"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

/// `init --json`
pub fn init_args() -> Vec<String> {
    ["init", "--json"].iter().map(|s| s.to_string()).collect()
}

fn backup_prefix(hostname: &str) -> Vec<String> {
    vec![
        "backup".to_string(),
        "--json".to_string(),
        "--host".to_string(),
        hostname.to_string(),
    ]
}

/// `backup --json --host <host> [--cache-dir=..] [--exclude-file=..] <path>`
pub fn volume_backup_args(
    hostname: &str,
    cache_dir: Option<&str>,
    exclude_file: Option<&str>,
    path: &str,
) -> Vec<String> {
    let mut args = backup_prefix(hostname);
    if let Some(dir) = cache_dir {
        args.push(format!("--cache-dir={}", dir));
    }
    if let Some(file) = exclude_file {
        args.push(format!("--exclude-file={}", file));
    }
    args.push(path.to_string());
    args
}

/// `backup --json --host <host> --stdin --stdin-filename <name>`
pub fn stdin_backup_args(hostname: &str, filename: &str) -> Vec<String> {
    let mut args = backup_prefix(hostname);
    args.push("--stdin".to_string());
    args.push("--stdin-filename".to_string());
    args.push(filename.to_string());
    args
}

/// Per-path cache directory.
///
/// The engine does not cope with several processes sharing one cache, so
/// every volume gets its own: `<home>/.cache/restic-data-app` for `/data/app`.
pub fn cache_dir_for(home: &Path, path: &str) -> String {
    format!(
        "{}/.cache/restic{}",
        home.display(),
        path.replace('/', "-")
    )
}

/// `<path>/.resticexclude` if that file exists
pub fn exclude_file_for(path: &str) -> Option<String> {
    let candidate = format!("{}/{}", path, EXCLUDE_FILE_NAME);
    if PathBuf::from(&candidate).is_file() {
        Some(candidate)
    } else {
        None
    }
}

/// Final `summary` message of `backup --json`
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct BackupSummary {
    pub files_new: u64,
    pub files_changed: u64,
    pub files_unmodified: u64,
    pub dirs_new: u64,
    pub dirs_changed: u64,
    pub dirs_unmodified: u64,
    pub data_blobs: i64,
    pub tree_blobs: i64,
    pub data_added: u64,
    pub total_files_processed: u64,
    pub total_bytes_processed: u64,
    /// Seconds
    pub total_duration: f64,
    pub snapshot_id: String,
}

/// Scan JSON-lines output of `backup --json` for the summary message.
///
/// Status lines are skipped, error lines are logged, anything that is not
/// JSON is ignored.
pub fn parse_backup_output(stdout: &str) -> Option<BackupSummary> {
    let mut summary = None;

    for line in stdout.lines() {
        let line = line.trim();
        if !line.starts_with('{') {
            continue;
        }
        let Ok(message) = serde_json::from_str::<serde_json::Value>(line) else {
            continue;
        };

        match message.get("message_type").and_then(|t| t.as_str()) {
            Some("summary") => match serde_json::from_value::<BackupSummary>(message) {
                Ok(parsed) => summary = Some(parsed),
                Err(e) => warn!("Failed to parse backup summary: {}", e),
            },
            Some("error") => {
                let item = message.get("item").and_then(|i| i.as_str()).unwrap_or("");
                let detail = message
                    .get("error")
                    .map(|e| e.to_string())
                    .unwrap_or_default();
                warn!(item, error = %detail, "Engine reported an error");
            }
            _ => {}
        }
    }

    summary
}
