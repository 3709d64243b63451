//! Integration tests for `SqliteStore` against a real on-disk database file, exercising the
//! `PersistenceStore` trait surface the way `morgana-core`'s Manager actually calls it.

use morgana_core::collaborators::PersistenceStore;
use morgana_persistence::SqliteStore;
use tempfile::NamedTempFile;

#[tokio::test(flavor = "multi_thread")]
async fn reopening_the_same_file_preserves_turns_and_active_agent() {
    let file = NamedTempFile::new().unwrap();
    let path = file.path().to_path_buf();

    let store1 = SqliteStore::new(&path).unwrap();
    store1.save_turn("c1", "show my invoices", "here they are", Some("billing")).await.unwrap();
    drop(store1);

    let store2 = SqliteStore::new(&path).unwrap();
    assert_eq!(store2.get_last_active_agent("c1").await.unwrap().as_deref(), Some("billing"));
}

#[tokio::test(flavor = "multi_thread")]
async fn conversations_do_not_see_each_others_active_agent() {
    let file = NamedTempFile::new().unwrap();
    let store = SqliteStore::new(file.path()).unwrap();

    store.save_turn("c1", "hi", "hello", Some("billing")).await.unwrap();
    store.save_turn("c2", "hi", "hello", Some("support")).await.unwrap();

    assert_eq!(store.get_last_active_agent("c1").await.unwrap().as_deref(), Some("billing"));
    assert_eq!(store.get_last_active_agent("c2").await.unwrap().as_deref(), Some("support"));
}

#[tokio::test(flavor = "multi_thread")]
async fn later_turns_overwrite_the_active_agent_for_a_conversation() {
    let file = NamedTempFile::new().unwrap();
    let store = SqliteStore::new(file.path()).unwrap();

    store.save_turn("c1", "bill me", "ok", Some("billing")).await.unwrap();
    store.save_turn("c1", "actually, support", "ok", Some("support")).await.unwrap();
    store.save_turn("c1", "thanks", "you're welcome", None).await.unwrap();

    assert_eq!(store.get_last_active_agent("c1").await.unwrap(), None);
}
