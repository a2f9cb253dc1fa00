// ============================================================================
// Mutations
// ============================================================================
//
// Single write intents against one table. The batch layer never looks inside
// a mutation; it only forwards it. The in-memory store is the one consumer
// that interprets them.
//
// ============================================================================

pub mod key_set;

pub use key_set::KeySet;

use crate::core::Value;
use serde::{Deserialize, Serialize};

/// Rows to write into a table.
///
/// `values` holds one row per entry, each aligned with `columns`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Write {
    pub table: String,
    pub columns: Vec<String>,
    pub values: Vec<Vec<Value>>,
}

impl Write {
    pub fn new<I, S>(table: &str, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            table: table.to_string(),
            columns: columns.into_iter().map(Into::into).collect(),
            values: Vec::new(),
        }
    }

    /// Append one row
    pub fn row<I, V>(mut self, row: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        self.values.push(row.into_iter().map(Into::into).collect());
        self
    }
}

/// A single write operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mutation {
    /// Fails with ALREADY_EXISTS if any row exists
    Insert(Write),
    /// Fails with NOT_FOUND if any row is missing
    Update(Write),
    InsertOrUpdate(Write),
    /// Like insert-or-update, but unlisted columns are cleared
    Replace(Write),
    Delete { table: String, key_set: KeySet },
}

impl Mutation {
    pub fn insert(write: Write) -> Self {
        Self::Insert(write)
    }

    pub fn update(write: Write) -> Self {
        Self::Update(write)
    }

    pub fn insert_or_update(write: Write) -> Self {
        Self::InsertOrUpdate(write)
    }

    pub fn replace(write: Write) -> Self {
        Self::Replace(write)
    }

    pub fn delete(table: &str, key_set: KeySet) -> Self {
        Self::Delete {
            table: table.to_string(),
            key_set,
        }
    }

    /// Table this mutation targets
    pub fn table(&self) -> &str {
        match self {
            Self::Insert(w) | Self::Update(w) | Self::InsertOrUpdate(w) | Self::Replace(w) => {
                &w.table
            }
            Self::Delete { table, .. } => table,
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::Insert(_) => "insert",
            Self::Update(_) => "update",
            Self::InsertOrUpdate(_) => "insert_or_update",
            Self::Replace(_) => "replace",
            Self::Delete { .. } => "delete",
        }
    }
}
