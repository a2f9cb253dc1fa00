/// End-to-end batch writes against the in-memory store
///
/// Run with: cargo test --test memory_store_tests
use async_trait::async_trait;
use batchwrite::{
    CancellationToken, Code, Connection, ConnectionConfig, DbError, KeySet, MemoryStore, Mutation,
    ResponseOrder, Result, Session, SessionFactory, SessionPool, Value, Write,
};
use std::sync::Arc;
use std::time::Duration;

/// Hands out memory sessions after a delay, like a slow session RPC
struct SlowSessions {
    store: MemoryStore,
    delay: Duration,
}

#[async_trait]
impl SessionFactory for SlowSessions {
    async fn create_session(&self, database: &str) -> Result<Box<dyn Session>> {
        tokio::time::sleep(self.delay).await;
        self.store.create_session(database).await
    }
}

async fn setup(order: ResponseOrder) -> (Connection, MemoryStore) {
    let store = MemoryStore::with_response_order(order);
    store.create_table("Singers", &["SingerId"]).await.unwrap();
    store
        .create_table("Albums", &["SingerId", "AlbumId"])
        .await
        .unwrap();

    let config = ConnectionConfig::new("test", "local", "music").max_sessions(2);
    let connection = Connection::open(config, Arc::new(store.clone())).await.unwrap();
    (connection, store)
}

fn singer(id: i64, name: &str) -> Write {
    Write::new("Singers", ["SingerId", "Name"]).row([Value::from(id), Value::from(name)])
}

fn album(singer_id: i64, album_id: i64, title: &str) -> Write {
    Write::new("Albums", ["SingerId", "AlbumId", "Title"]).row([
        Value::from(singer_id),
        Value::from(album_id),
        Value::from(title),
    ])
}

#[tokio::test]
async fn test_groups_commit_independently() {
    let (connection, store) = setup(ResponseOrder::Request).await;

    let mut seed = connection.create_batch_mutation_command();
    seed.add([Mutation::insert(singer(1, "Marc"))]);
    seed.execute(CancellationToken::new())
        .unwrap()
        .collect_all()
        .await
        .unwrap();

    let mut command = connection.create_batch_mutation_command();
    command.add([
        Mutation::insert(singer(2, "Catalina")),
        Mutation::insert(album(2, 1, "Total Junk")),
    ]);
    command.add([
        Mutation::insert(singer(3, "Alice")),
        Mutation::insert(singer(1, "Duplicate")),
    ]);
    command.add([Mutation::update(singer(1, "Marcus"))]);

    let outcomes = command
        .execute(CancellationToken::new())
        .unwrap()
        .collect_all()
        .await
        .unwrap();

    assert_eq!(outcomes.len(), 3);
    assert!(outcomes[0].is_success());
    assert_eq!(outcomes[1].status.code, Code::AlreadyExists);
    assert!(outcomes[2].is_success());
    assert!(outcomes[0].commit_timestamp < outcomes[2].commit_timestamp);

    // The failed group left nothing behind
    assert!(store.read_row("Singers", &[Value::from(3i64)]).await.is_none());
    assert_eq!(store.row_count("Albums").await, 1);

    let marc = store.read_row("Singers", &[Value::from(1i64)]).await.unwrap();
    assert_eq!(marc["Name"], Value::from("Marcus"));
}

#[tokio::test]
async fn test_outcomes_follow_server_order() {
    let (connection, _store) = setup(ResponseOrder::Reversed).await;

    let mut command = connection.create_batch_mutation_command();
    for id in 0..4 {
        command.add([Mutation::insert(singer(id, "x"))]);
    }

    let outcomes = command
        .execute(CancellationToken::new())
        .unwrap()
        .collect_all()
        .await
        .unwrap();

    let order: Vec<usize> = outcomes.iter().flat_map(|o| o.indexes.clone()).collect();
    assert_eq!(order, vec![3, 2, 1, 0]);
}

#[tokio::test]
async fn test_abandoned_stream_is_released() {
    let (connection, store) = setup(ResponseOrder::Request).await;

    let mut command = connection.create_batch_mutation_command();
    command.add([Mutation::insert(singer(1, "a"))]);
    command.add([Mutation::insert(singer(2, "b"))]);

    let mut outcomes = command.execute(CancellationToken::new()).unwrap();
    assert!(outcomes.try_next().await.unwrap().unwrap().is_success());
    assert_eq!(store.open_streams(), 1);

    drop(outcomes);
    assert_eq!(store.open_streams(), 0);
    // The second group was never pulled, so never applied
    assert_eq!(store.row_count("Singers").await, 1);
}

#[tokio::test]
async fn test_sessions_are_reused_across_commands() {
    let (connection, store) = setup(ResponseOrder::Request).await;

    for id in 0..5 {
        let mut command = connection.create_batch_mutation_command();
        command.add([Mutation::insert_or_update(singer(id, "x"))]);
        let outcomes = command
            .execute(CancellationToken::new())
            .unwrap()
            .collect_all()
            .await
            .unwrap();
        assert_eq!(outcomes.len(), 1);
    }

    assert_eq!(store.sessions_created(), 1);
    assert_eq!(store.row_count("Singers").await, 5);
}

#[tokio::test]
async fn test_concurrent_commands() {
    let (connection, store) = setup(ResponseOrder::Request).await;

    let mut handles = vec![];
    for task_id in 0..4i64 {
        let connection = connection.clone();
        handles.push(tokio::spawn(async move {
            let mut command = connection.create_batch_mutation_command();
            for i in 0..10 {
                command.add([Mutation::insert(singer(task_id * 100 + i, "x"))]);
            }
            command
                .execute(CancellationToken::new())
                .unwrap()
                .collect_all()
                .await
                .unwrap()
        }));
    }

    for handle in handles {
        let outcomes = handle.await.unwrap();
        assert_eq!(outcomes.len(), 10);
        assert!(outcomes.iter().all(|o| o.is_success()));
    }
    assert_eq!(store.row_count("Singers").await, 40);
    assert!(store.sessions_created() <= 2);
}

#[tokio::test]
async fn test_delete_by_key() {
    let (connection, store) = setup(ResponseOrder::Request).await;

    let mut command = connection.create_batch_mutation_command();
    command.add([
        Mutation::insert(album(1, 1, "A")),
        Mutation::insert(album(1, 2, "B")),
    ]);
    command.add([Mutation::delete(
        "Albums",
        KeySet::from_keys([vec![Value::from(1i64), Value::from(1i64)]]),
    )]);
    command.add([Mutation::delete("Albums", KeySet::key(1i64))]);

    let outcomes = command
        .execute(CancellationToken::new())
        .unwrap()
        .collect_all()
        .await
        .unwrap();

    assert!(outcomes[0].is_success());
    assert!(outcomes[1].is_success());
    assert_eq!(outcomes[2].status.code, Code::InvalidArgument);
    assert_eq!(store.row_count("Albums").await, 1);
}

#[tokio::test]
async fn test_cancel_while_acquiring_leaves_pool_idle() {
    let store = MemoryStore::new();
    store.create_table("Singers", &["SingerId"]).await.unwrap();
    let factory = Arc::new(SlowSessions {
        store: store.clone(),
        delay: Duration::from_millis(100),
    });
    let pool = Arc::new(
        SessionPool::new(
            ConnectionConfig::new("test", "local", "music")
                .min_sessions(0)
                .max_sessions(1),
            factory,
        )
        .await
        .unwrap(),
    );
    let connection = Connection::with_provider(pool.database(), pool.clone());

    let cancel = CancellationToken::new();
    let mut command = connection.create_batch_mutation_command();
    command.add([Mutation::insert(singer(1, "Marc"))]);
    let mut outcomes = command.execute(cancel.clone()).unwrap();

    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(20)).await;
        trigger.cancel();
    });

    assert_eq!(outcomes.try_next().await, Err(DbError::Cancelled));
    let stats = pool.stats().await;
    assert_eq!(stats.total_sessions, 0);
    assert_eq!(stats.active_sessions, 0);

    let mut retry = connection.create_batch_mutation_command();
    retry.add([Mutation::insert(singer(1, "Marc"))]);
    let results = retry
        .execute(CancellationToken::new())
        .unwrap()
        .collect_all()
        .await
        .unwrap();

    assert_eq!(results.len(), 1);
    assert!(results[0].is_success());
    assert_eq!(store.row_count("Singers").await, 1);

    tokio::time::sleep(Duration::from_millis(20)).await;
    let stats = pool.stats().await;
    assert_eq!(stats.total_sessions, 1);
    assert_eq!(stats.available_sessions, 1);
}
