use super::*;
use std::sync::Arc;

#[tokio::test]
async fn health_check_succeeds_for_live_pool() {
    let storage = Storage::new(IN_MEMORY_DATABASE_URL).await.expect("db");
    storage.health_check().await.expect("health check");
}

#[tokio::test]
async fn set_overwrites_existing_value() {
    let storage = Storage::new(IN_MEMORY_DATABASE_URL).await.expect("db");
    assert_eq!(storage.get("theme").await.expect("get"), None);

    storage.set("theme", "dark").await.expect("set");
    storage.set("theme", "light").await.expect("overwrite");
    assert_eq!(
        storage.get("theme").await.expect("get").as_deref(),
        Some("light")
    );

    storage.remove("theme").await.expect("remove");
    assert_eq!(storage.get("theme").await.expect("get"), None);
}

#[tokio::test]
async fn creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("history.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let storage = Storage::new(&database_url).await.expect("db");
    storage.set("k", "v").await.expect("set");
    drop(storage);

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[tokio::test]
async fn values_survive_reopening_the_database() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let database_url = format!(
        "sqlite://{}",
        temp_root
            .path()
            .join("history.db")
            .to_string_lossy()
            .replace('\\', "/")
    );

    let storage = Storage::new(&database_url).await.expect("db");
    storage.set(PROMPT_HISTORY_KEY, "[\"a\"]").await.expect("set");
    storage.pool().close().await;

    let reopened = Storage::new(&database_url).await.expect("reopen");
    assert_eq!(
        reopened.get(PROMPT_HISTORY_KEY).await.expect("get").as_deref(),
        Some("[\"a\"]")
    );
}

#[tokio::test]
async fn history_records_most_recent_first_and_persists_json() {
    let store = Arc::new(MemoryStore::new());
    let mut history = PromptHistory::load(store.clone()).await.expect("load");
    assert!(history.is_empty());

    history.record("a castle").await.expect("record");
    history.record("a fox").await.expect("record");
    history.record("a castle").await.expect("record");

    assert_eq!(history.entries(), ["a castle", "a fox"]);
    assert_eq!(
        store.get(PROMPT_HISTORY_KEY).await.expect("get").as_deref(),
        Some("[\"a castle\",\"a fox\"]")
    );
}

#[tokio::test]
async fn history_ignores_blank_prompts() {
    let store = Arc::new(MemoryStore::new());
    let mut history = PromptHistory::load(store.clone()).await.expect("load");

    history.record("   ").await.expect("record");

    assert!(history.is_empty());
    assert_eq!(store.get(PROMPT_HISTORY_KEY).await.expect("get"), None);
}

#[tokio::test]
async fn history_caps_entries_at_ten() {
    let store = Arc::new(MemoryStore::new());
    let mut history = PromptHistory::load(store.clone()).await.expect("load");

    for index in 0..15 {
        history
            .record(&format!("prompt {index}"))
            .await
            .expect("record");
    }

    assert_eq!(history.entries().len(), MAX_HISTORY_ENTRIES);
    assert_eq!(history.entries()[0], "prompt 14");
    assert_eq!(history.entries()[MAX_HISTORY_ENTRIES - 1], "prompt 5");
}

#[tokio::test]
async fn corrupt_history_loads_as_empty() {
    let store = Arc::new(MemoryStore::new());
    store
        .set(PROMPT_HISTORY_KEY, "{not json")
        .await
        .expect("seed");

    let mut history = PromptHistory::load(store.clone()).await.expect("load");
    assert!(history.is_empty());

    history.record("fresh start").await.expect("record");
    assert_eq!(
        store.get(PROMPT_HISTORY_KEY).await.expect("get").as_deref(),
        Some("[\"fresh start\"]")
    );
}

#[tokio::test]
async fn clearing_history_removes_stored_value() {
    let store = Arc::new(MemoryStore::new());
    let mut history = PromptHistory::load(store.clone()).await.expect("load");
    history.record("a fox").await.expect("record");

    history.clear().await.expect("clear");

    assert!(history.is_empty());
    assert_eq!(store.get(PROMPT_HISTORY_KEY).await.expect("get"), None);
}

#[tokio::test]
async fn legacy_history_with_repeats_is_deduplicated_on_load() {
    let store = Arc::new(MemoryStore::new());
    store
        .set(
            PROMPT_HISTORY_KEY,
            "[\"a fox\",\"a castle\",\"a fox\",\"a koi pond\",\"a castle\"]",
        )
        .await
        .expect("seed");

    let history = PromptHistory::load(store.clone()).await.expect("load");

    assert_eq!(history.entries(), ["a fox", "a castle", "a koi pond"]);
}
