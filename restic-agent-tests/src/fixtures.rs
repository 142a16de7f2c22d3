//! Test fixtures and sample data
//!
//! Engine output samples in the `backup --json` line format.

/// A `status` line as printed while a backup progresses
pub fn status_line(percent_done: f64) -> String {
    format!(
        "{{\"message_type\":\"status\",\"percent_done\":{},\"total_files\":10,\"files_done\":3,\"total_bytes\":4096,\"bytes_done\":1024}}",
        percent_done
    )
}

/// A final `summary` line
pub fn summary_line(files_new: u64, files_changed: u64, duration_secs: f64) -> String {
    format!(
        concat!(
            "{{\"message_type\":\"summary\",\"files_new\":{},\"files_changed\":{},",
            "\"files_unmodified\":0,\"dirs_new\":1,\"dirs_changed\":0,\"dirs_unmodified\":0,",
            "\"data_blobs\":{},\"tree_blobs\":1,\"data_added\":2048,",
            "\"total_files_processed\":{},\"total_bytes_processed\":8192,",
            "\"total_duration\":{},\"snapshot_id\":\"4e5f6a7b\"}}"
        ),
        files_new,
        files_changed,
        files_new + files_changed,
        files_new + files_changed,
        duration_secs
    )
}

/// Complete stdout of a successful backup
pub fn backup_output(files_new: u64) -> String {
    [
        status_line(0.0),
        status_line(0.5),
        summary_line(files_new, 0, 1.25),
    ]
    .join("\n")
        + "\n"
}

/// stderr of the engine when the repository does not exist
pub fn missing_repository_stderr() -> &'static str {
    "Fatal: unable to open config file: stat /srv/restic/config: no such file or directory\nIs there a repository at the following location?"
}

/// Minimal valid config TOML template
pub fn minimal_config_toml() -> &'static str {
    r#"
volumes = ["{volume}"]

[agent]
hostname = "test-host"
listen_port = 0

[repository]
url = "{repository}"
password = "test-password-123"
"#
}

/// Config TOML with every section filled in
pub fn full_config_toml() -> &'static str {
    r#"
volumes = ["/data", "/etc/app"]

[agent]
hostname = "web-1"
run_on_startup = true
schedule = "0 30 2 * * *"
listen_address = "127.0.0.1"
listen_port = 8080
prometheus_endpoint = "/prometheus"
credentials_file = "{credentials}"

[repository]
url = "s3:s3.example.com/backups"
password = "repository-secret"

[binaries]
restic = "/usr/local/bin/restic"

[logging]
level = "debug"
max_files = 3
format = "json"

[[postgres]]
host = "postgres:5433"
user = "backup"
password = "pg-secret"
database = "shop"

[[mariadb]]
host = "mariadb"
user = "root"
password = "maria-secret"
database = "wiki"
name = "/wiki.sql"
"#
}
