//! Postgres connection-credentials file (`~/.pgpass`)
//!
//! Lines use the format the dump tool reads, `host:port:database:user:password`,
//! with `:` and `\` escaped by a backslash. Entries are upserted by their
//! `host:port:database:user` key so repeated registration does not pile up
//! duplicate lines.

use crate::error::{BackupError, Result};
use fd_lock::RwLock;
use std::fs::OpenOptions;
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// One credential line
#[derive(Clone, PartialEq, Eq)]
pub struct PgPassEntry {
    pub host: String,
    pub port: u16,
    pub database: String,
    pub user: String,
    pub password: String,
}

impl std::fmt::Debug for PgPassEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgPassEntry")
            .field("key", &self.key())
            .finish_non_exhaustive()
    }
}

impl PgPassEntry {
    /// Escaped `host:port:database:user`
    pub fn key(&self) -> String {
        [
            escape(&self.host),
            self.port.to_string(),
            escape(&self.database),
            escape(&self.user),
        ]
        .join(":")
    }

    pub fn to_line(&self) -> String {
        format!("{}:{}", self.key(), escape(&self.password))
    }
}

/// Handle on a credentials file
#[derive(Debug, Clone)]
pub struct PgPassFile {
    path: PathBuf,
}

impl PgPassFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// `~/.pgpass` of the invoking user
    pub fn user_default() -> Option<Self> {
        dirs::home_dir().map(|home| Self::new(home.join(".pgpass")))
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert or replace the line for `entry`'s key.
    ///
    /// The file is created with mode 0600 and held under an exclusive lock
    /// for the whole read-modify-write.
    pub fn upsert(&self, entry: &PgPassEntry) -> Result<()> {
        let credentials_error = |source: std::io::Error| BackupError::Credentials {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(credentials_error)?;
            }
        }

        let mut options = OpenOptions::new();
        options.read(true).write(true).create(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(0o600);
        }
        let file = options.open(&self.path).map_err(credentials_error)?;

        // The dump tool ignores the file if group or others can read it
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            file.set_permissions(std::fs::Permissions::from_mode(0o600))
                .map_err(credentials_error)?;
        }

        let mut lock = RwLock::new(file);
        let mut guard = lock.write().map_err(credentials_error)?;

        let mut contents = String::new();
        guard
            .read_to_string(&mut contents)
            .map_err(credentials_error)?;

        let (updated, replaced) = merge_entry(&contents, entry);

        guard.set_len(0).map_err(credentials_error)?;
        guard.seek(SeekFrom::Start(0)).map_err(credentials_error)?;
        guard
            .write_all(updated.as_bytes())
            .map_err(credentials_error)?;
        guard.flush().map_err(credentials_error)?;

        if replaced {
            debug!(path = ?self.path, key = %entry.key(), "Replaced credential line");
        } else {
            info!(path = ?self.path, key = %entry.key(), "Added credential line");
        }

        Ok(())
    }
}

/// Escape `\` and `:` the way the dump tool expects
fn escape(field: &str) -> String {
    field.replace('\\', "\\\\").replace(':', "\\:")
}

/// Escaped key of an existing line, i.e. everything before the fourth
/// unescaped colon. None for comments and malformed lines.
fn line_key(line: &str) -> Option<&str> {
    if line.trim_start().starts_with('#') {
        return None;
    }

    let mut separators = 0;
    let mut escaped = false;
    for (i, c) in line.char_indices() {
        if escaped {
            escaped = false;
            continue;
        }
        match c {
            '\\' => escaped = true,
            ':' => {
                separators += 1;
                if separators == 4 {
                    return Some(&line[..i]);
                }
            }
            _ => {}
        }
    }
    None
}

/// Returns the new file contents and whether an existing line was replaced.
/// Later duplicates of the same key are dropped.
fn merge_entry(contents: &str, entry: &PgPassEntry) -> (String, bool) {
    let key = entry.key();
    let mut replaced = false;
    let mut lines = Vec::new();

    for line in contents.lines() {
        if line_key(line) == Some(key.as_str()) {
            if !replaced {
                lines.push(entry.to_line());
                replaced = true;
            }
            continue;
        }
        lines.push(line.to_string());
    }

    if !replaced {
        lines.push(entry.to_line());
    }

    let mut updated = lines.join("\n");
    updated.push('\n');
    (updated, replaced)
}
