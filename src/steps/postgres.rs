use super::dump::{stream_dump, DumpTarget};
use super::{Destination, Toolchain};
use crate::error::Result;
use crate::utils::command::{Invocation, ProcessOutput};
use crate::utils::pgpass::{PgPassEntry, PgPassFile};
use crate::utils::run_guard::RunGuard;
use tracing::debug;

pub const POSTGRES_DEFAULT_PORT: u16 = 5432;

/// Dumps one Postgres database into the engine
#[derive(Debug)]
pub struct PostgresStep {
    pub(super) guard: RunGuard,
    pub(super) destination: Destination,
    target: DumpTarget,
    credentials: PgPassFile,
}

impl PostgresStep {
    /// Registers the password in `credentials` so the dump runs without a
    /// prompt (`-w`). Fails if the credentials file cannot be written.
    pub fn new(
        host: &str,
        user: &str,
        password: &str,
        database: &str,
        credentials: PgPassFile,
    ) -> Result<Self> {
        let target = DumpTarget::new(host, POSTGRES_DEFAULT_PORT, user, database, "psql");

        credentials.upsert(&PgPassEntry {
            host: target.host.clone(),
            port: target.port,
            database: target.database.clone(),
            user: target.user.clone(),
            password: password.to_string(),
        })?;

        Ok(Self {
            guard: RunGuard::new(),
            destination: Destination::default(),
            target,
            credentials,
        })
    }

    /// Override the file name inside the snapshot
    pub fn set_name(&mut self, name: impl Into<String>) {
        self.target.name = name.into();
    }

    pub fn target(&self) -> &DumpTarget {
        &self.target
    }

    pub fn describe(&self) -> String {
        self.target.describe()
    }

    /// `pg_dump -h <host> -U <user> -w -d <database> [-p <port>]`
    pub fn producer(&self, toolchain: &Toolchain) -> Invocation {
        let mut invocation = Invocation::new(&toolchain.binaries.pg_dump)
            .args(["-h", &self.target.host, "-U", &self.target.user, "-w"])
            .args(["-d", &self.target.database]);
        if self.target.port != POSTGRES_DEFAULT_PORT {
            invocation = invocation.args(["-p".to_string(), self.target.port.to_string()]);
        }
        invocation.env(
            "PGPASSFILE",
            self.credentials.path().display().to_string(),
        )
    }

    pub fn consumer(&self, toolchain: &Toolchain) -> Invocation {
        self.target.consumer(toolchain, &self.destination)
    }

    pub(super) async fn execute(&self, toolchain: &Toolchain) -> Result<ProcessOutput> {
        debug!(database = %self.target.database, name = %self.target.name, "Streaming pg_dump into backup");
        stream_dump(toolchain, &self.producer(toolchain), &self.consumer(toolchain)).await
    }
}
