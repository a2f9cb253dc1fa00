// ============================================================================
// Transactions
// ============================================================================
//
// Transaction handles as seen by commands. Batch writes never run inside a
// transaction; a command refuses to execute while one is attached.
//
// ============================================================================

use std::sync::atomic::{AtomicU64, Ordering};

/// Global transaction ID counter
static NEXT_TXN_ID: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a transaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId(pub u64);

impl TransactionId {
    /// Generate a new unique transaction ID
    pub fn new() -> Self {
        TransactionId(NEXT_TXN_ID.fetch_add(1, Ordering::SeqCst))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Default for TransactionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for TransactionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "txn_{}", self.0)
    }
}

/// Transaction marker handed out by a [`Connection`](crate::Connection).
///
/// Only identifies the transaction; a [`BatchMutationCommand`](crate::BatchMutationCommand)
/// carrying one refuses to execute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transaction {
    id: TransactionId,
    database: String,
}

impl Transaction {
    pub(crate) fn new(database: &str) -> Self {
        Self {
            id: TransactionId::new(),
            database: database.to_string(),
        }
    }

    pub fn id(&self) -> TransactionId {
        self.id
    }

    pub fn database(&self) -> &str {
        &self.database
    }
}
