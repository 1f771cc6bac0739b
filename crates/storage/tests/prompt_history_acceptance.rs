use std::sync::Arc;

use storage::{PromptHistory, Storage, MAX_HISTORY_ENTRIES};

#[tokio::test]
async fn history_is_restored_from_sqlite_on_next_session() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let database_url = format!(
        "sqlite://{}",
        temp_root
            .path()
            .join("studio")
            .join("history.db")
            .to_string_lossy()
            .replace('\\', "/")
    );

    {
        let storage = Arc::new(Storage::new(&database_url).await.expect("db"));
        let mut history = PromptHistory::load(storage.clone()).await.expect("load");
        for prompt in ["a red fox", "a koi pond", "a red fox", "a lighthouse"] {
            history.record(prompt).await.expect("record");
        }
        storage.pool().close().await;
    }

    let storage = Arc::new(Storage::new(&database_url).await.expect("reopen"));
    let history = PromptHistory::load(storage).await.expect("reload");
    assert_eq!(history.entries(), ["a lighthouse", "a red fox", "a koi pond"]);
    assert!(history.entries().len() <= MAX_HISTORY_ENTRIES);
}
