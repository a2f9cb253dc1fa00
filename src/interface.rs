use crate::batch::{BatchWriteRequest, BatchWriteResponse};
use crate::core::Result;
use crate::transaction::TransactionId;
use async_trait::async_trait;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Per-call settings handed to the session when a stream is opened.
#[derive(Debug, Clone, Default)]
pub struct CallOptions {
    /// Deadline for the stream, measured from stream open
    pub timeout: Option<Duration>,
    pub cancellation: CancellationToken,
}

impl CallOptions {
    pub fn new(cancellation: CancellationToken) -> Self {
        Self {
            timeout: None,
            cancellation,
        }
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

/// Supplies live sessions bound to one database.
///
/// The session layer lives outside the batch core. `SessionPool` is the
/// bundled implementation; tests substitute their own.
#[async_trait]
pub trait SessionProvider: Send + Sync {
    /// Acquire a session, optionally tied to an existing transaction.
    ///
    /// Must return promptly with `DbError::Cancelled` once `cancel` fires.
    async fn acquire_session(
        &self,
        transaction: Option<&TransactionId>,
        cancel: &CancellationToken,
    ) -> Result<Box<dyn Session>>;
}

/// A live, authenticated channel to the database.
///
/// Dropping the session releases it (a pooled session goes back to its pool).
#[async_trait]
pub trait Session: Send {
    fn name(&self) -> &str;

    /// Open the server-streaming batch write call.
    async fn open_batch_write(
        &mut self,
        request: BatchWriteRequest,
        options: CallOptions,
    ) -> Result<Box<dyn BatchWriteStream>>;
}

/// Handle on an open response stream.
#[async_trait]
pub trait BatchWriteStream: Send {
    /// Pull the next message; `Ok(None)` once the server has finished.
    async fn next_message(&mut self) -> Result<Option<BatchWriteResponse>>;

    /// Release the underlying call. Synchronous so it can run from `Drop`.
    fn dispose(&mut self);
}

/// Creates raw sessions for a pool to manage.
#[async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create_session(&self, database: &str) -> Result<Box<dyn Session>>;

    /// Cheap liveness check used before handing out an idle session
    fn is_healthy(&self, _session: &dyn Session) -> bool {
        true
    }
}
