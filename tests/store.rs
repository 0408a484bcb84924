// ABOUTME: Behavioral contract shared by the memory and SQLite stores.
// ABOUTME: FIFO claims, single-flight execution, cancellation, logs and stack versions.

use chrono::Utc;
use stackyard::store::{
    CommandId, CommandStatus, CommandStore, LogLevel, MAX_ERROR_LEN, MemoryStore, SqliteStore,
    StackStore, StackVersion, Store, StoreError, truncate_error,
};
use std::sync::Arc;

fn version(stack: &str, label: &str, parent: Option<&str>) -> StackVersion {
    StackVersion {
        stack_id: stack.to_string(),
        version: label.to_string(),
        parent_version: parent.map(str::to_string),
        body: format!(r#"{{"label":"{label}"}}"#),
        hash: format!("hash-{label}"),
        created_by: "tests".to_string(),
        comment: None,
        created_at: Utc::now(),
    }
}

async fn status(store: &impl CommandStore, id: CommandId) -> CommandStatus {
    store.get_command(id).await.unwrap().unwrap().status
}

async fn enqueue_n(store: &impl CommandStore, n: usize) -> Vec<CommandId> {
    let mut ids = Vec::new();
    for _ in 0..n {
        ids.push(store.enqueue("app", "START_STACK", "{}").await.unwrap());
    }
    ids
}

async fn enqueue_is_pending(store: impl Store) {
    let id = store
        .enqueue("app", "APPLY_STACK_VERSION", r#"{"version":"v1"}"#)
        .await
        .unwrap();
    let cmd = store.get_command(id).await.unwrap().unwrap();

    assert_eq!(cmd.status, CommandStatus::Pending);
    assert_eq!(cmd.stack_id, "app");
    assert_eq!(cmd.command_type, "APPLY_STACK_VERSION");
    assert_eq!(cmd.payload, r#"{"version":"v1"}"#);
    assert!(cmd.started_at.is_none());
    assert!(cmd.ended_at.is_none());
    assert!(cmd.error.is_none());
    assert!(store.get_command(CommandId(999)).await.unwrap().is_none());
}

async fn ids_increase(store: impl Store) {
    let ids = enqueue_n(&store, 3).await;
    assert!(ids[0] < ids[1] && ids[1] < ids[2]);
}

async fn claims_in_fifo_order(store: impl Store) {
    let ids = enqueue_n(&store, 3).await;

    for id in ids {
        assert_eq!(store.claim_next_pending().await.unwrap(), Some(id));
        assert_eq!(status(&store, id).await, CommandStatus::Running);
        assert!(store.mark_done(id).await.unwrap());
    }
    assert_eq!(store.claim_next_pending().await.unwrap(), None);
}

async fn empty_queue_claims_nothing(store: impl Store) {
    assert_eq!(store.claim_next_pending().await.unwrap(), None);
}

async fn running_command_blocks_the_queue(store: impl Store) {
    let ids = enqueue_n(&store, 2).await;

    assert_eq!(store.claim_next_pending().await.unwrap(), Some(ids[0]));
    assert_eq!(store.claim_next_pending().await.unwrap(), None);
    assert_eq!(status(&store, ids[1]).await, CommandStatus::Pending);

    assert!(store.mark_failed(ids[0], "boom").await.unwrap());
    assert_eq!(store.claim_next_pending().await.unwrap(), Some(ids[1]));
}

async fn cancelled_commands_are_skipped(store: impl Store) {
    let ids = enqueue_n(&store, 3).await;

    assert!(store.cancel_if_pending(ids[0]).await.unwrap());
    assert!(store.cancel_if_pending(ids[1]).await.unwrap());
    assert_eq!(store.claim_next_pending().await.unwrap(), Some(ids[2]));
}

async fn cancel_only_pending(store: impl Store) {
    let ids = enqueue_n(&store, 2).await;

    let cancelled = store.get_command(ids[1]).await.unwrap();
    assert_eq!(cancelled.unwrap().status, CommandStatus::Pending);
    assert!(store.cancel_if_pending(ids[1]).await.unwrap());
    let cancelled = store.get_command(ids[1]).await.unwrap().unwrap();
    assert_eq!(cancelled.status, CommandStatus::Cancelled);
    assert!(cancelled.ended_at.is_some());
    assert!(!store.cancel_if_pending(ids[1]).await.unwrap());

    store.claim_next_pending().await.unwrap();
    assert!(!store.cancel_if_pending(ids[0]).await.unwrap());
    assert_eq!(status(&store, ids[0]).await, CommandStatus::Running);

    store.mark_done(ids[0]).await.unwrap();
    assert!(!store.cancel_if_pending(ids[0]).await.unwrap());
    assert!(!store.cancel_if_pending(CommandId(999)).await.unwrap());
}

async fn terminal_transitions_need_running(store: impl Store) {
    let ids = enqueue_n(&store, 1).await;

    assert!(!store.mark_done(ids[0]).await.unwrap());
    assert!(!store.mark_failed(ids[0], "nope").await.unwrap());
    assert_eq!(status(&store, ids[0]).await, CommandStatus::Pending);

    store.claim_next_pending().await.unwrap();
    assert!(store.mark_done(ids[0]).await.unwrap());
    assert!(!store.mark_done(ids[0]).await.unwrap());
    assert!(!store.mark_failed(ids[0], "late").await.unwrap());

    let cmd = store.get_command(ids[0]).await.unwrap().unwrap();
    assert_eq!(cmd.status, CommandStatus::Done);
    assert!(cmd.started_at.is_some());
    assert!(cmd.ended_at.is_some());
    assert!(cmd.error.is_none());
}

async fn failure_message_is_truncated(store: impl Store) {
    let ids = enqueue_n(&store, 1).await;
    store.claim_next_pending().await.unwrap();

    let long = "é".repeat(MAX_ERROR_LEN + 500);
    assert!(store.mark_failed(ids[0], &long).await.unwrap());

    let cmd = store.get_command(ids[0]).await.unwrap().unwrap();
    assert_eq!(cmd.status, CommandStatus::Failed);
    assert_eq!(cmd.error.unwrap().chars().count(), MAX_ERROR_LEN);
}

async fn list_commands_newest_first(store: impl Store) {
    let a1 = store.enqueue("a", "START_STACK", "{}").await.unwrap();
    let b1 = store.enqueue("b", "START_STACK", "{}").await.unwrap();
    let a2 = store.enqueue("a", "STOP_STACK", "{}").await.unwrap();

    let all: Vec<CommandId> = store
        .list_commands(None, 10)
        .await
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(all, vec![a2, b1, a1]);

    let only_a: Vec<CommandId> = store
        .list_commands(Some("a"), 10)
        .await
        .unwrap()
        .iter()
        .map(|c| c.id)
        .collect();
    assert_eq!(only_a, vec![a2, a1]);

    assert_eq!(store.list_commands(None, 1).await.unwrap().len(), 1);
    assert!(store.list_commands(Some("zzz"), 10).await.unwrap().is_empty());
}

async fn logs_newest_first_per_command(store: impl Store) {
    let ids = enqueue_n(&store, 2).await;
    store
        .append_log(ids[0], LogLevel::Info, "first")
        .await
        .unwrap();
    store
        .append_log(ids[1], LogLevel::Warn, "other command")
        .await
        .unwrap();
    store
        .append_log(ids[0], LogLevel::Error, "second")
        .await
        .unwrap();

    let logs = store.list_logs(ids[0], 10).await.unwrap();
    let messages: Vec<&str> = logs.iter().map(|l| l.message.as_str()).collect();
    assert_eq!(messages, vec!["second", "first"]);
    assert_eq!(logs[0].level, LogLevel::Error);
    assert_eq!(logs[0].command_id, ids[0]);

    assert_eq!(store.list_logs(ids[0], 1).await.unwrap().len(), 1);
    assert!(store.list_logs(CommandId(999), 10).await.unwrap().is_empty());
}

async fn stacks(store: impl Store) {
    let created = store.create_stack("web", "Web shop").await.unwrap();
    assert_eq!(created.current_version, None);
    store.create_stack("api", "API").await.unwrap();

    assert!(matches!(
        store.create_stack("web", "again").await.unwrap_err(),
        StoreError::StackExists(id) if id == "web"
    ));

    let fetched = store.get_stack("web").await.unwrap().unwrap();
    assert_eq!(fetched.name, "Web shop");
    assert!(store.get_stack("nope").await.unwrap().is_none());

    let ids: Vec<String> = store
        .list_stacks()
        .await
        .unwrap()
        .into_iter()
        .map(|s| s.stack_id)
        .collect();
    assert_eq!(ids, vec!["api", "web"]);
}

async fn current_version(store: impl Store) {
    store.create_stack("web", "web").await.unwrap();

    store.set_current_version("web", Some("v2")).await.unwrap();
    let stack = store.get_stack("web").await.unwrap().unwrap();
    assert_eq!(stack.current_version.as_deref(), Some("v2"));

    store.set_current_version("web", None).await.unwrap();
    let stack = store.get_stack("web").await.unwrap().unwrap();
    assert_eq!(stack.current_version, None);

    assert!(matches!(
        store.set_current_version("nope", Some("v1")).await.unwrap_err(),
        StoreError::StackNotFound(_)
    ));
}

async fn versions(store: impl Store) {
    store.create_stack("web", "web").await.unwrap();
    store.create_stack("api", "api").await.unwrap();

    store.insert_version(&version("web", "b", None)).await.unwrap();
    store
        .insert_version(&version("web", "a", Some("b")))
        .await
        .unwrap();
    store
        .insert_version(&version("api", "z", None))
        .await
        .unwrap();

    // Latest means most recently inserted, not greatest label.
    let latest = store.latest_version("web").await.unwrap().unwrap();
    assert_eq!(latest.version, "a");
    assert_eq!(latest.parent_version.as_deref(), Some("b"));

    let labels: Vec<String> = store
        .list_versions("web", 10)
        .await
        .unwrap()
        .into_iter()
        .map(|v| v.version)
        .collect();
    assert_eq!(labels, vec!["a", "b"]);
    assert_eq!(store.list_versions("web", 1).await.unwrap().len(), 1);

    let b = store.get_version("web", "b").await.unwrap().unwrap();
    assert_eq!(b.body, r#"{"label":"b"}"#);
    assert_eq!(b.hash, "hash-b");
    assert_eq!(b.created_by, "tests");
    assert!(store.get_version("web", "z").await.unwrap().is_none());
    assert!(store.latest_version("nope").await.unwrap().is_none());
}

async fn version_conflicts(store: impl Store) {
    store.create_stack("web", "web").await.unwrap();
    store.insert_version(&version("web", "v1", None)).await.unwrap();

    assert!(matches!(
        store.insert_version(&version("web", "v1", None)).await.unwrap_err(),
        StoreError::VersionExists { .. }
    ));
    assert!(matches!(
        store.insert_version(&version("nope", "v1", None)).await.unwrap_err(),
        StoreError::StackNotFound(_)
    ));
}

async fn concurrent_claims_are_single_flight(store: impl Store + 'static) {
    let store = Arc::new(store);
    let ids = enqueue_n(&*store, 3).await;

    let claims: Vec<_> = (0..8)
        .map(|_| {
            let store = store.clone();
            tokio::spawn(async move { store.claim_next_pending().await.unwrap() })
        })
        .collect();

    let mut won = Vec::new();
    for claim in claims {
        if let Some(id) = claim.await.unwrap() {
            won.push(id);
        }
    }
    assert_eq!(won, vec![ids[0]]);
}

macro_rules! store_contract {
    ($($name:ident),* $(,)?) => {
        mod memory {
            use super::*;
            $(
                #[tokio::test]
                async fn $name() {
                    super::$name(MemoryStore::new()).await;
                }
            )*
        }

        mod sqlite {
            use super::*;
            $(
                #[tokio::test]
                async fn $name() {
                    super::$name(SqliteStore::in_memory().await.unwrap()).await;
                }
            )*
        }
    };
}

store_contract!(
    enqueue_is_pending,
    ids_increase,
    claims_in_fifo_order,
    empty_queue_claims_nothing,
    running_command_blocks_the_queue,
    cancelled_commands_are_skipped,
    cancel_only_pending,
    terminal_transitions_need_running,
    failure_message_is_truncated,
    list_commands_newest_first,
    logs_newest_first_per_command,
    stacks,
    current_version,
    versions,
    version_conflicts,
    concurrent_claims_are_single_flight,
);

mod sqlite_file {
    use super::*;

    #[tokio::test]
    async fn reopened_database_keeps_the_queue() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("stackyard.db");

        let first = {
            let store = SqliteStore::open(&path).await.unwrap();
            store.create_stack("web", "web").await.unwrap();
            let id = store.enqueue("web", "START_STACK", "{}").await.unwrap();
            store.claim_next_pending().await.unwrap();
            id
        };

        let store = SqliteStore::open(&path).await.unwrap();
        assert_eq!(status(&store, first).await, CommandStatus::Running);
        assert!(store.get_stack("web").await.unwrap().is_some());

        let second = store.enqueue("web", "STOP_STACK", "{}").await.unwrap();
        assert!(second > first);
        assert_eq!(store.claim_next_pending().await.unwrap(), None);
    }
}

mod truncation {
    use super::*;

    #[test]
    fn short_messages_are_kept() {
        assert_eq!(truncate_error("boom"), "boom");
        assert_eq!(truncate_error(""), "");
    }

    #[test]
    fn long_messages_are_cut_on_char_boundaries() {
        let exact = "x".repeat(MAX_ERROR_LEN);
        assert_eq!(truncate_error(&exact), exact);

        let cut = truncate_error(&"日本".repeat(MAX_ERROR_LEN));
        assert_eq!(cut.chars().count(), MAX_ERROR_LEN);
    }
}
