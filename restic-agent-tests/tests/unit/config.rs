//! Configuration loading and backup set construction

use restic_agent::config::{self, load_config, ConfigError};
use rstest::rstest;
use std::collections::HashMap;
use std::sync::Arc;
use test_utils::*;

fn no_env(_: &str) -> Option<String> {
    None
}

fn env_of(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
    let map: HashMap<String, String> = vars
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
    move |key: &str| map.get(key).cloned()
}

#[test]
fn test_full_file_parses() {
    let ctx = TestContext::new();
    let credentials = ctx.temp_dir().join("pgpass");
    let contents = full_config_toml().replace("{credentials}", &credentials.display().to_string());
    let path = ctx.create_file("agent.toml", &contents);

    let config = load_config(Some(&path), no_env, &Overrides::default()).assert_ok();

    assert_eq!(config.volumes, vec!["/data", "/etc/app"]);
    assert_eq!(config.agent.listen_port, 8080);
    assert_eq!(config.agent.prometheus_endpoint, "/prometheus");
    assert_eq!(config.binaries.restic, "/usr/local/bin/restic");
    assert_eq!(config.binaries.pg_dump, "pg_dump");
    assert_eq!(config.postgres[0].host, "postgres:5433");
    assert_eq!(config.mariadb[0].name.as_deref(), Some("/wiki.sql"));
}

#[test]
fn test_masked_config_hides_secrets() {
    let ctx = TestContext::new();
    let contents = full_config_toml().replace("{credentials}", "/tmp/pgpass");
    let path = ctx.create_file("agent.toml", &contents);
    let config = load_config(Some(&path), no_env, &Overrides::default()).assert_ok();

    let rendered = toml::to_string(&config.masked()).unwrap();
    assert!(!rendered.contains("repository-secret"));
    assert!(!rendered.contains("pg-secret"));
    assert!(!rendered.contains("maria-secret"));
    assert!(rendered.contains("***"));
}

#[test]
fn test_env_database_becomes_step() {
    let mut config = ConfigBuilder::minimal().build();
    config
        .apply_env(env_of(&[
            ("MARIADB_HOST", "maria"),
            ("MARIADB_USER", "root"),
            ("MARIADB_PASSWORD", "pw"),
            ("MARIADB_DB", "wiki"),
        ]))
        .assert_ok();

    let set = config::build_backup_set(&config, Arc::new(MockExecutor::new())).assert_ok();
    assert_eq!(set.steps().len(), 1);
    assert_eq!(set.steps()[0].kind(), StepKind::MariaDb);
    assert_eq!(set.steps()[0].describe(), "root@maria/wiki");
}

#[test]
fn test_missing_file_is_read_error() {
    let ctx = TestContext::new();
    let err = load_config(Some(&ctx.temp_dir().join("missing.toml")), no_env, &Overrides::default())
        .unwrap_err();
    assert!(matches!(err, ConfigError::ReadError(_)));
}

#[test]
fn test_malformed_file_is_parse_error() {
    let ctx = TestContext::new();
    let path = ctx.create_file("agent.toml", "[agent\nhostname = ");
    let err = load_config(Some(&path), no_env, &Overrides::default()).unwrap_err();
    assert!(matches!(err, ConfigError::ParseError(_)));
}

#[rstest]
#[case("0 0 2 * * *", true)]
#[case("@hourly", true)]
#[case("0 2 * * *", false)]
#[case("tomorrow", false)]
fn test_schedule_validation(#[case] schedule: &str, #[case] valid: bool) {
    let config = ConfigBuilder::minimal().with_schedule(schedule).build();
    assert_eq!(config::validate_config(&config).is_ok(), valid, "{}", schedule);
}

#[test]
fn test_overrides_extend_file_volumes() {
    let ctx = TestContext::new();
    let path = ctx.create_file(
        "agent.toml",
        &minimal_config_toml()
            .replace("{volume}", "/from-file")
            .replace("{repository}", "/srv/restic"),
    );
    let overrides = Overrides {
        volumes: vec!["/from-cli".to_string()],
        run_on_startup: true,
        ..Default::default()
    };

    let config = load_config(Some(&path), no_env, &overrides).assert_ok();
    assert_eq!(config.volumes, vec!["/from-file", "/from-cli"]);
    assert!(config.agent.run_on_startup);
    assert_eq!(config.agent.hostname, "test-host");
}

#[test]
fn test_unwritable_credentials_fail_construction() {
    let ctx = TestContext::new();
    let blocker = ctx.create_file("not-a-dir", "");
    let mut config = ConfigBuilder::minimal()
        .with_postgres("db", "backup", "pw", "shop")
        .build();
    config.agent.credentials_file = Some(blocker.join("pgpass"));

    let result = config::build_backup_set(&config, Arc::new(MockExecutor::new()));
    result.map(|set| set.steps().len()).assert_err_contains("credentials");
}
