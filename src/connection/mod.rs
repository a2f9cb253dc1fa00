pub mod config;
pub mod pool;

use crate::batch::BatchMutationCommand;
use crate::core::Result;
use crate::interface::{SessionFactory, SessionProvider};
use crate::transaction::Transaction;
use config::ConnectionConfig;
use pool::SessionPool;
use std::sync::Arc;
use std::time::Duration;

/// Database connection handle
///
/// Owns the session provider for one database and creates commands bound
/// to it. Cloning is cheap; clones share the provider.
#[derive(Clone)]
pub struct Connection {
    database: String,
    provider: Arc<dyn SessionProvider>,
    call_timeout: Option<Duration>,
}

impl Connection {
    /// Open a connection backed by a session pool over `factory`.
    pub async fn open(config: ConnectionConfig, factory: Arc<dyn SessionFactory>) -> Result<Self> {
        let call_timeout = config.call_timeout;
        let pool = SessionPool::new(config, factory).await?;

        Ok(Self {
            database: pool.database().to_string(),
            provider: Arc::new(pool),
            call_timeout,
        })
    }

    /// Wrap an existing session provider
    pub fn with_provider(database: &str, provider: Arc<dyn SessionProvider>) -> Self {
        Self {
            database: database.to_string(),
            provider,
            call_timeout: None,
        }
    }

    pub fn database(&self) -> &str {
        &self.database
    }

    pub fn provider(&self) -> &Arc<dyn SessionProvider> {
        &self.provider
    }

    /// Create a batch mutation command bound to this connection
    ///
    /// # Examples
    ///
    /// ```
    /// # use batchwrite::{Connection, ConnectionConfig, MemoryStore};
    /// # use std::sync::Arc;
    /// # #[tokio::main]
    /// # async fn main() -> batchwrite::Result<()> {
    /// let config = ConnectionConfig::new("demo", "local", "music");
    /// let connection = Connection::open(config, Arc::new(MemoryStore::new())).await?;
    ///
    /// let command = connection.create_batch_mutation_command();
    /// assert!(command.is_empty());
    /// # Ok(())
    /// # }
    /// ```
    pub fn create_batch_mutation_command(&self) -> BatchMutationCommand {
        let mut command = BatchMutationCommand::new(Arc::clone(&self.provider));
        command.set_call_timeout(self.call_timeout);
        command
    }

    /// Start a transaction handle on this connection
    pub fn begin_transaction(&self) -> Transaction {
        Transaction::new(&self.database)
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("database", &self.database)
            .field("call_timeout", &self.call_timeout)
            .finish()
    }
}
