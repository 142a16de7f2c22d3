use super::dump::{stream_dump, DumpTarget};
use super::{Destination, Toolchain};
use crate::error::Result;
use crate::utils::command::{Invocation, ProcessOutput};
use crate::utils::run_guard::RunGuard;
use std::fmt;
use tracing::debug;

pub const MARIADB_DEFAULT_PORT: u16 = 3306;

/// Dumps one MariaDB database into the engine.
///
/// The password goes to the dump tool as an argument; nothing is persisted.
pub struct MariaDbStep {
    pub(super) guard: RunGuard,
    pub(super) destination: Destination,
    target: DumpTarget,
    password: String,
}

impl fmt::Debug for MariaDbStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MariaDbStep")
            .field("guard", &self.guard)
            .field("destination", &self.destination)
            .field("target", &self.target)
            .finish_non_exhaustive()
    }
}

impl MariaDbStep {
    pub fn new(host: &str, user: &str, password: &str, database: &str) -> Self {
        Self {
            guard: RunGuard::new(),
            destination: Destination::default(),
            target: DumpTarget::new(host, MARIADB_DEFAULT_PORT, user, database, "mysql"),
            password: password.to_string(),
        }
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

    /// `mariadb-dump -h <host> -u <user> -p<password> [-P <port>] <database>`
    pub fn producer(&self, toolchain: &Toolchain) -> Invocation {
        let mut invocation = Invocation::new(&toolchain.binaries.mariadb_dump)
            .args(["-h", &self.target.host, "-u", &self.target.user])
            .secret_arg(format!("-p{}", self.password));
        if self.target.port != MARIADB_DEFAULT_PORT {
            invocation = invocation.args(["-P".to_string(), self.target.port.to_string()]);
        }
        invocation.arg(&self.target.database)
    }

    pub fn consumer(&self, toolchain: &Toolchain) -> Invocation {
        self.target.consumer(toolchain, &self.destination)
    }

    pub(super) async fn execute(&self, toolchain: &Toolchain) -> Result<ProcessOutput> {
        debug!(database = %self.target.database, name = %self.target.name, "Streaming mariadb-dump into backup");
        stream_dump(toolchain, &self.producer(toolchain), &self.consumer(toolchain)).await
    }
}
