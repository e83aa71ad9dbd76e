use storage::repository::{KeyValueStore, Storage};
use storage::sqlite::SqliteKvStore;

#[tokio::test]
async fn sqlite_roundtrip_set_get_delete() {
    let repo = SqliteKvStore::connect("sqlite:file:memdb_kv_roundtrip?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    assert_eq!(repo.get("rust-learning-progress").await.unwrap(), None);

    repo.set("rust-learning-progress", r#"{"lessonsCompleted":[]}"#)
        .await
        .unwrap();
    assert_eq!(
        repo.get("rust-learning-progress").await.unwrap().as_deref(),
        Some(r#"{"lessonsCompleted":[]}"#)
    );

    repo.delete("rust-learning-progress").await.unwrap();
    assert_eq!(repo.get("rust-learning-progress").await.unwrap(), None);
}

#[tokio::test]
async fn sqlite_set_overwrites_existing_value() {
    let repo = SqliteKvStore::connect("sqlite:file:memdb_kv_overwrite?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("migrate");

    repo.set("rust-learning-theme", "light").await.unwrap();
    repo.set("rust-learning-theme", "dark").await.unwrap();
    assert_eq!(
        repo.get("rust-learning-theme").await.unwrap().as_deref(),
        Some("dark")
    );

    let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM kv_entries")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn migrations_are_idempotent() {
    let repo = SqliteKvStore::connect("sqlite:file:memdb_kv_migrate?mode=memory&cache=shared")
        .await
        .expect("connect");
    repo.migrate().await.expect("first migrate");
    repo.migrate().await.expect("second migrate");

    let versions: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM schema_migrations")
        .fetch_one(repo.pool())
        .await
        .unwrap();
    assert_eq!(versions, 1);
}

#[tokio::test]
async fn storage_sqlite_keys_are_independent() {
    let storage = Storage::sqlite("sqlite:file:memdb_kv_storage?mode=memory&cache=shared")
        .await
        .expect("storage");

    storage.kv.set("a", "1").await.unwrap();
    storage.kv.set("b", "2").await.unwrap();
    storage.kv.delete("a").await.unwrap();

    assert_eq!(storage.kv.get("a").await.unwrap(), None);
    assert_eq!(storage.kv.get("b").await.unwrap().as_deref(), Some("2"));
}
