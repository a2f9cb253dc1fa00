// ============================================================================
// batchwrite Library
// ============================================================================
//
// Client-side batch writes: many independent mutation groups in one streaming
// request, one outcome per group as the server reports it.
//
// ============================================================================

pub mod batch;
pub mod connection;
pub mod core;
pub mod interface;
pub mod memory;
pub mod mutation;
pub mod transaction;

pub use crate::batch::{
    BatchMutationCommand, BatchOutcomes, BatchRequestBuilder, BatchWriteOptions,
    BatchWriteRequest, BatchWriteResponse, MutationGroup, Priority, StreamCursor,
    StreamingExecutor,
};
pub use connection::{
    Connection,
    config::ConnectionConfig,
    pool::{PoolStats, SessionGuard, SessionPool},
};
pub use crate::core::{Code, DbError, Result, Status, Value};
pub use interface::{BatchWriteStream, CallOptions, Session, SessionFactory, SessionProvider};
pub use memory::{MemoryStore, ResponseOrder};
pub use mutation::{KeySet, Mutation, Write};
pub use transaction::{Transaction, TransactionId};

/// Re-exported so callers need not depend on tokio-util directly
pub use tokio_util::sync::CancellationToken;
