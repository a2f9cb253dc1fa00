// ============================================================================
// Undo Log
// ============================================================================
//
// Every row change made while applying a mutation group is recorded with the
// row it replaced, so a failing group can be reverted without touching the
// groups applied before it.
//
// ============================================================================

use super::{Row, Table};
use crate::core::Value;
use std::collections::HashMap;

/// A single reversible row change
#[derive(Debug, Clone)]
pub(crate) enum Change {
    /// A row was inserted or overwritten
    RowWritten {
        table: String,
        key: Vec<Value>,
        previous: Option<Row>,
    },

    /// An existing row was removed
    RowDeleted {
        table: String,
        key: Vec<Value>,
        previous: Row,
    },
}

impl Change {
    pub(crate) fn table_name(&self) -> &str {
        match self {
            Change::RowWritten { table, .. } => table,
            Change::RowDeleted { table, .. } => table,
        }
    }
}

#[derive(Debug, Default)]
pub(crate) struct UndoLog {
    changes: Vec<Change>,
}

impl UndoLog {
    pub(crate) fn record(&mut self, change: Change) {
        self.changes.push(change);
    }

    pub(crate) fn len(&self) -> usize {
        self.changes.len()
    }

    /// Revert all recorded changes, newest first
    pub(crate) fn rollback(self, tables: &mut HashMap<String, Table>) {
        for change in self.changes.into_iter().rev() {
            let Some(table) = tables.get_mut(change.table_name()) else {
                continue;
            };
            match change {
                Change::RowWritten {
                    key,
                    previous: Some(previous),
                    ..
                }
                | Change::RowDeleted { key, previous, .. } => {
                    table.rows.insert(key, previous);
                }
                Change::RowWritten {
                    key,
                    previous: None,
                    ..
                } => {
                    table.rows.remove(&key);
                }
            }
        }
    }
}
