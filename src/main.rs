use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use restic_agent::config::{self, Config, Overrides};
use restic_agent::managers::logging::{init_logging, LoggingConfig};
use restic_agent::managers::metrics::MetricsCollection;
use restic_agent::managers::server;
use restic_agent::utils::cron::{parse_schedule, run_schedule};
use restic_agent::utils::RealExecutor;
use restic_agent::BackupSet;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

#[derive(Parser)]
#[command(name = "restic-agent")]
#[command(about = "Backup agent running restic for volumes and databases", long_about = None)]
#[command(version)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Hostname for restic snapshots
    #[arg(long = "host", global = true)]
    host: Option<String>,

    /// Path to a volume to save, may be given multiple times
    #[arg(short = 'v', long = "volume", value_name = "PATH", global = true)]
    volumes: Vec<String>,

    /// Run a backup on startup
    #[arg(short, long, global = true)]
    run: bool,

    /// Cron schedule, seconds first (e.g. "0 0 2 * * *")
    #[arg(short, long, global = true)]
    schedule: Option<String>,

    /// Listen address for the HTTP server
    #[arg(short = 'l', long = "listen-host", global = true)]
    listen_host: Option<String>,

    /// Listen port for the HTTP server, 0 disables it
    #[arg(short = 'p', long = "listen-port", global = true)]
    listen_port: Option<u16>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand, Clone, Copy)]
enum Commands {
    /// Serve the HTTP endpoints and run the scheduler (default)
    Serve,

    /// Run one backup of all steps and exit
    Run,

    /// Create the repository if it does not exist yet
    Init,

    /// Print the resolved configuration with secrets masked
    Validate,
}

impl Cli {
    fn overrides(&self) -> Overrides {
        Overrides {
            hostname: self.host.clone(),
            volumes: self.volumes.clone(),
            run_on_startup: self.run,
            schedule: self.schedule.clone(),
            listen_address: self.listen_host.clone(),
            listen_port: self.listen_port,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = config::load_config(
        cli.config.as_deref(),
        |key| std::env::var(key).ok(),
        &cli.overrides(),
    )
    .context("Failed to load configuration")?;

    let command = cli.command.unwrap_or(Commands::Serve);

    if let Commands::Validate = command {
        let rendered = toml::to_string_pretty(&config.masked())
            .context("Failed to render configuration")?;
        println!("{}", rendered);
        println!("✓ Configuration is valid");
        return Ok(());
    }

    // Must stay alive until exit
    let _log_guard = init_logging(&LoggingConfig::from_settings(&config.logging))?;
    debug!("restic-agent is starting");

    check_binaries(&config)?;

    let mut backup_set = config::build_backup_set(&config, Arc::new(RealExecutor::new()))
        .context("Failed to configure backup steps")?;
    let metrics = Arc::new(MetricsCollection::new().context("Failed to create metrics")?);
    backup_set.set_metrics(Arc::clone(&metrics));
    let backup_set = Arc::new(backup_set);

    match command {
        Commands::Run => {
            backup_set.run_synchronously().await;
            let (attempted, failed) = (metrics.attempted(), metrics.failed());
            println!("{} backup steps finished, {} failed", attempted, failed);
            if failed > 0 {
                bail!("{} of {} backup steps failed", failed, attempted);
            }
            Ok(())
        }
        Commands::Init => {
            let state = backup_set
                .initialize_repository()
                .await
                .context("Failed to initialize repository")?;
            println!("✓ Repository ready ({:?})", state);
            Ok(())
        }
        Commands::Serve => serve(&config, backup_set).await,
        Commands::Validate => Ok(()),
    }
}

/// Start the HTTP server, the scheduler and the startup run, then wait
async fn serve(config: &Config, backup_set: Arc<BackupSet>) -> Result<()> {
    let mut tasks: JoinSet<Result<()>> = JoinSet::new();

    if config.agent.listen_port != 0 {
        let app = server::router(Arc::clone(&backup_set), &config.agent.prometheus_endpoint);
        let address = config.agent.listen_address.clone();
        let port = config.agent.listen_port;
        info!(%address, port, "Starting http server");
        tasks.spawn(async move { server::serve(app, &address, port).await });
    }

    if let Some(expression) = &config.agent.schedule {
        let schedule = parse_schedule(expression)
            .with_context(|| format!("Failed to schedule task: {}", expression))?;
        let set = Arc::clone(&backup_set);
        tasks.spawn(async move {
            run_schedule(schedule, set).await;
            Ok(())
        });
    }

    if config.agent.run_on_startup {
        let set = Arc::clone(&backup_set);
        tasks.spawn(async move {
            debug!("Run backup on startup");
            set.run_synchronously().await;
            Ok(())
        });
    }

    if tasks.is_empty() {
        warn!("No server, schedule or startup run configured, nothing to do");
        return Ok(());
    }

    info!("restic-agent startup complete");
    while let Some(joined) = tasks.join_next().await {
        joined.context("Agent task panicked")??;
    }
    Ok(())
}

/// The engine must be present; dump tools only when a database is configured
fn check_binaries(config: &Config) -> Result<()> {
    if which::which(&config.binaries.restic).is_err() {
        eprintln!("⚠️  Restic binary not found!");
        eprintln!();
        eprintln!("Install restic or set [binaries] restic in the config file.");
        eprintln!();
        bail!("{} not found", config.binaries.restic);
    }

    let dump_tools = [
        (!config.postgres.is_empty(), &config.binaries.pg_dump),
        (!config.mariadb.is_empty(), &config.binaries.mariadb_dump),
    ];
    for (needed, program) in dump_tools {
        if needed && which::which(program).is_err() {
            warn!(%program, "Dump tool not found, database steps will fail");
        }
    }
    Ok(())
}
