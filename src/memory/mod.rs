// ============================================================================
// In-memory Store
// ============================================================================
//
// A process-local stand-in for the remote store. It serves sessions to a
// pool, applies each mutation group atomically when the response stream is
// pulled, and reports one outcome message per group.
//
// ============================================================================

mod change;
pub mod session;

pub use session::{MemoryBatchStream, MemorySession};

use crate::batch::{BatchWriteResponse, MutationGroup};
use crate::core::{Code, DbError, Result, Status, Value};
use crate::interface::{Session, SessionFactory};
use crate::mutation::{KeySet, Mutation, Write};
use async_trait::async_trait;
use change::{Change, UndoLog};
use chrono::{DateTime, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use tracing::debug;

/// Column name to value
pub type Row = BTreeMap<String, Value>;

/// Order in which the store reports group outcomes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseOrder {
    /// Same order as the request
    #[default]
    Request,
    /// Last group first
    Reversed,
}

#[derive(Debug, Clone)]
pub(crate) struct Table {
    key_columns: Vec<String>,
    rows: HashMap<Vec<Value>, Row>,
}

#[derive(Debug, Default)]
struct Database {
    tables: HashMap<String, Table>,
    last_commit: Option<DateTime<Utc>>,
}

struct StoreInner {
    database: RwLock<Database>,
    response_order: ResponseOrder,
    sessions_created: AtomicUsize,
    open_streams: AtomicUsize,
}

/// In-process table store
///
/// Cloning shares the same data.
#[derive(Clone)]
pub struct MemoryStore {
    inner: Arc<StoreInner>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::with_response_order(ResponseOrder::Request)
    }

    pub fn with_response_order(response_order: ResponseOrder) -> Self {
        Self {
            inner: Arc::new(StoreInner {
                database: RwLock::new(Database::default()),
                response_order,
                sessions_created: AtomicUsize::new(0),
                open_streams: AtomicUsize::new(0),
            }),
        }
    }

    pub fn response_order(&self) -> ResponseOrder {
        self.inner.response_order
    }

    /// Create a table keyed by `key_columns`
    pub async fn create_table(&self, name: &str, key_columns: &[&str]) -> Result<()> {
        if key_columns.is_empty() {
            return Err(DbError::InvalidArgument(format!(
                "Table '{}' needs at least one key column",
                name
            )));
        }

        let mut database = self.inner.database.write().await;
        if database.tables.contains_key(name) {
            return Err(DbError::rpc(
                Code::AlreadyExists,
                format!("Table '{}' already exists", name),
            ));
        }

        database.tables.insert(
            name.to_string(),
            Table {
                key_columns: key_columns.iter().map(|c| c.to_string()).collect(),
                rows: HashMap::new(),
            },
        );
        Ok(())
    }

    pub async fn read_row(&self, table: &str, key: &[Value]) -> Option<Row> {
        let database = self.inner.database.read().await;
        database.tables.get(table)?.rows.get(key).cloned()
    }

    pub async fn row_count(&self, table: &str) -> usize {
        let database = self.inner.database.read().await;
        database.tables.get(table).map_or(0, |t| t.rows.len())
    }

    pub fn sessions_created(&self) -> usize {
        self.inner.sessions_created.load(Ordering::SeqCst)
    }

    /// Response streams opened and not yet released
    pub fn open_streams(&self) -> usize {
        self.inner.open_streams.load(Ordering::SeqCst)
    }

    pub(crate) fn stream_opened(&self) {
        self.inner.open_streams.fetch_add(1, Ordering::SeqCst);
    }

    pub(crate) fn stream_released(&self) {
        self.inner.open_streams.fetch_sub(1, Ordering::SeqCst);
    }

    /// Apply one group atomically and describe the outcome for `index`
    pub(crate) async fn apply_group(&self, index: usize, group: &MutationGroup) -> BatchWriteResponse {
        let mut database = self.inner.database.write().await;

        match database.apply_group(group) {
            Ok(commit_timestamp) => {
                debug!(group = index, %commit_timestamp, "mutation group committed");
                BatchWriteResponse::committed(vec![index], commit_timestamp)
            }
            Err(status) => {
                debug!(group = index, %status, "mutation group rejected");
                BatchWriteResponse {
                    indexes: vec![index],
                    status,
                    commit_timestamp: None,
                }
            }
        }
    }
}

impl Database {
    fn apply_group(&mut self, group: &MutationGroup) -> std::result::Result<DateTime<Utc>, Status> {
        let mut undo = UndoLog::default();

        for mutation in group {
            if let Err(status) = self.apply_mutation(mutation, &mut undo) {
                debug!(reverted = undo.len(), "reverting partially applied group");
                undo.rollback(&mut self.tables);
                return Err(status);
            }
        }

        Ok(self.next_commit_timestamp())
    }

    fn apply_mutation(
        &mut self,
        mutation: &Mutation,
        undo: &mut UndoLog,
    ) -> std::result::Result<(), Status> {
        match mutation {
            Mutation::Insert(write) => self.apply_write(write, WriteMode::Insert, undo),
            Mutation::Update(write) => self.apply_write(write, WriteMode::Update, undo),
            Mutation::InsertOrUpdate(write) => {
                self.apply_write(write, WriteMode::InsertOrUpdate, undo)
            }
            Mutation::Replace(write) => self.apply_write(write, WriteMode::Replace, undo),
            Mutation::Delete { table, key_set } => self.apply_delete(table, key_set, undo),
        }
    }

    fn apply_write(
        &mut self,
        write: &Write,
        mode: WriteMode,
        undo: &mut UndoLog,
    ) -> std::result::Result<(), Status> {
        let table = table_mut(&mut self.tables, &write.table)?;

        let key_positions = table
            .key_columns
            .iter()
            .map(|key_column| {
                write
                    .columns
                    .iter()
                    .position(|column| column == key_column)
                    .ok_or_else(|| {
                        Status::new(
                            Code::InvalidArgument,
                            format!(
                                "Write to table '{}' is missing key column '{}'",
                                write.table, key_column
                            ),
                        )
                    })
            })
            .collect::<std::result::Result<Vec<_>, _>>()?;

        for values in &write.values {
            if values.len() != write.columns.len() {
                return Err(Status::new(
                    Code::InvalidArgument,
                    format!(
                        "Row has {} values but {} columns were named",
                        values.len(),
                        write.columns.len()
                    ),
                ));
            }

            let key: Vec<Value> = key_positions.iter().map(|&i| values[i].clone()).collect();
            let existing = table.rows.get(&key);

            let row = match (mode, existing) {
                (WriteMode::Insert, Some(_)) => {
                    return Err(Status::new(
                        Code::AlreadyExists,
                        format!("Row {} in table '{}' already exists", format_key(&key), write.table),
                    ));
                }
                (WriteMode::Update, None) => {
                    return Err(Status::new(
                        Code::NotFound,
                        format!("Row {} in table '{}' not found", format_key(&key), write.table),
                    ));
                }
                (WriteMode::Update | WriteMode::InsertOrUpdate, Some(current)) => {
                    let mut merged = current.clone();
                    merged.extend(write.columns.iter().cloned().zip(values.iter().cloned()));
                    merged
                }
                _ => write.columns.iter().cloned().zip(values.iter().cloned()).collect(),
            };

            let previous = table.rows.insert(key.clone(), row);
            undo.record(Change::RowWritten {
                table: write.table.clone(),
                key,
                previous,
            });
        }

        Ok(())
    }

    fn apply_delete(
        &mut self,
        table_name: &str,
        key_set: &KeySet,
        undo: &mut UndoLog,
    ) -> std::result::Result<(), Status> {
        let table = table_mut(&mut self.tables, table_name)?;

        if key_set.all {
            for (key, previous) in table.rows.drain() {
                undo.record(Change::RowDeleted {
                    table: table_name.to_string(),
                    key,
                    previous,
                });
            }
            return Ok(());
        }

        for key in &key_set.keys {
            if key.len() != table.key_columns.len() {
                return Err(Status::new(
                    Code::InvalidArgument,
                    format!(
                        "Key {} does not match the {} key column(s) of table '{}'",
                        format_key(key),
                        table.key_columns.len(),
                        table_name
                    ),
                ));
            }

            // Deleting an absent row is not an error
            if let Some(previous) = table.rows.remove(key) {
                undo.record(Change::RowDeleted {
                    table: table_name.to_string(),
                    key: key.clone(),
                    previous,
                });
            }
        }

        Ok(())
    }

    /// Strictly increasing commit timestamps
    fn next_commit_timestamp(&mut self) -> DateTime<Utc> {
        let mut now = Utc::now();
        if let Some(last) = self.last_commit {
            if now <= last {
                now = last + chrono::Duration::microseconds(1);
            }
        }
        self.last_commit = Some(now);
        now
    }
}

#[derive(Debug, Clone, Copy)]
enum WriteMode {
    Insert,
    Update,
    InsertOrUpdate,
    Replace,
}

fn table_mut<'a>(
    tables: &'a mut HashMap<String, Table>,
    name: &str,
) -> std::result::Result<&'a mut Table, Status> {
    tables
        .get_mut(name)
        .ok_or_else(|| Status::new(Code::NotFound, format!("Table '{}' not found", name)))
}

fn format_key(key: &[Value]) -> String {
    let parts: Vec<String> = key.iter().map(ToString::to_string).collect();
    format!("[{}]", parts.join(", "))
}

#[async_trait]
impl SessionFactory for MemoryStore {
    async fn create_session(&self, database: &str) -> Result<Box<dyn Session>> {
        let id = self.inner.sessions_created.fetch_add(1, Ordering::SeqCst) + 1;
        let session = MemorySession::new(database, self.clone());
        debug!(session = session.name(), count = id, "memory session created");
        Ok(Box::new(session))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn singer(id: i64, name: &str) -> Write {
        Write::new("Singers", ["SingerId", "Name"]).row([Value::from(id), Value::from(name)])
    }

    async fn store() -> MemoryStore {
        let store = MemoryStore::new();
        store.create_table("Singers", &["SingerId"]).await.unwrap();
        store
    }

    #[tokio::test]
    async fn test_insert_then_duplicate_fails() {
        let store = store().await;

        let ok = store
            .apply_group(0, &MutationGroup::new(vec![Mutation::insert(singer(1, "Marc"))]))
            .await;
        assert!(ok.is_success());
        assert!(ok.commit_timestamp.is_some());

        let dup = store
            .apply_group(1, &MutationGroup::new(vec![Mutation::insert(singer(1, "Again"))]))
            .await;
        assert_eq!(dup.status.code, Code::AlreadyExists);
        assert_eq!(dup.indexes, vec![1]);
        assert!(dup.commit_timestamp.is_none());
    }

    #[tokio::test]
    async fn test_failed_group_is_reverted_entirely() {
        let store = store().await;
        let group = MutationGroup::new(vec![
            Mutation::insert(singer(1, "Marc")),
            Mutation::insert(singer(2, "Catalina")),
            Mutation::update(singer(3, "Missing")),
        ]);

        let outcome = store.apply_group(0, &group).await;

        assert_eq!(outcome.status.code, Code::NotFound);
        assert_eq!(store.row_count("Singers").await, 0);
    }

    #[tokio::test]
    async fn test_update_merges_and_replace_clears() {
        let store = store().await;
        let with_genre = Write::new("Singers", ["SingerId", "Name", "Genre"])
            .row([Value::from(1i64), Value::from("Marc"), Value::from("Jazz")]);
        store
            .apply_group(0, &MutationGroup::new(vec![Mutation::insert(with_genre)]))
            .await;

        store
            .apply_group(1, &MutationGroup::new(vec![Mutation::update(singer(1, "Marcus"))]))
            .await;
        let row = store.read_row("Singers", &[Value::from(1i64)]).await.unwrap();
        assert_eq!(row["Name"], Value::from("Marcus"));
        assert_eq!(row["Genre"], Value::from("Jazz"));

        store
            .apply_group(2, &MutationGroup::new(vec![Mutation::replace(singer(1, "Marc"))]))
            .await;
        let row = store.read_row("Singers", &[Value::from(1i64)]).await.unwrap();
        assert!(!row.contains_key("Genre"));
    }

    #[tokio::test]
    async fn test_delete_restored_when_group_fails() {
        let store = store().await;
        store
            .apply_group(0, &MutationGroup::new(vec![Mutation::insert(singer(1, "Marc"))]))
            .await;

        let group = MutationGroup::new(vec![
            Mutation::delete("Singers", KeySet::all()),
            Mutation::insert(Write::new("Albums", ["AlbumId"]).row([Value::from(1i64)])),
        ]);
        let outcome = store.apply_group(1, &group).await;

        assert_eq!(outcome.status.code, Code::NotFound);
        assert_eq!(store.row_count("Singers").await, 1);
    }

    #[tokio::test]
    async fn test_missing_key_column() {
        let store = store().await;
        let write = Write::new("Singers", ["Name"]).row([Value::from("Nobody")]);

        let outcome = store
            .apply_group(0, &MutationGroup::new(vec![Mutation::insert(write)]))
            .await;

        assert_eq!(outcome.status.code, Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_commit_timestamps_increase() {
        let store = store().await;
        let mut last = None;
        for id in 0..5 {
            let outcome = store
                .apply_group(0, &MutationGroup::new(vec![Mutation::insert(singer(id, "x"))]))
                .await;
            let ts = outcome.commit_timestamp.unwrap();
            if let Some(prev) = last {
                assert!(ts > prev);
            }
            last = Some(ts);
        }
    }

    #[tokio::test]
    async fn test_duplicate_table() {
        let store = store().await;
        assert!(store.create_table("Singers", &["SingerId"]).await.is_err());
        assert!(store.create_table("Empty", &[]).await.is_err());
    }
}
