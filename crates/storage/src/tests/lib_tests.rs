use super::*;

fn joke(id: &str) -> Joke {
    Joke::new(id, format!("joke {id}"), "dev")
}

#[tokio::test]
async fn list_initializes_missing_slot_to_empty_array() {
    let local = LocalJokeStore::new(MemorySlotStore::new());

    let jokes = local.list_jokes().await.expect("list");
    assert!(jokes.is_empty());

    let raw = local.slots().get(DEFAULT_SLOT_KEY).await.expect("get");
    assert_eq!(raw.as_deref(), Some("[]"));
}

#[tokio::test]
async fn save_requires_initialized_slot() {
    let local = LocalJokeStore::new(MemorySlotStore::new());

    let err = local.save_joke(joke("1")).await.expect_err("must fail");
    assert!(matches!(err, JokeError::MissingSlot { ref key } if key == "jokes"));
}

#[tokio::test]
async fn delete_requires_initialized_slot() {
    let local = LocalJokeStore::new(MemorySlotStore::new());

    let err = local
        .delete_joke(&JokeId::from("1"))
        .await
        .expect_err("must fail");
    assert_eq!(err.kind(), shared::error::ErrorKind::MissingSlot);
}

#[tokio::test]
async fn saves_in_order_and_deletes_by_id() {
    let local = LocalJokeStore::new(MemorySlotStore::new());
    local.list_jokes().await.expect("init");

    for id in ["1", "2", "3"] {
        local.save_joke(joke(id)).await.expect("save");
    }
    local.delete_joke(&JokeId::from("2")).await.expect("delete");

    let ids: Vec<String> = local
        .list_jokes()
        .await
        .expect("list")
        .into_iter()
        .map(|j| j.id.0)
        .collect();
    assert_eq!(ids, vec!["1", "3"]);
}

#[tokio::test]
async fn delete_removes_every_duplicate_id() {
    let local = LocalJokeStore::new(MemorySlotStore::new());
    local.ensure_slot().await.expect("init");
    local.save_joke(joke("1")).await.expect("save");
    local.save_joke(joke("2")).await.expect("save");
    local.save_joke(joke("1")).await.expect("save");

    local.delete_joke(&JokeId::from("1")).await.expect("delete");

    let jokes = local.list_jokes().await.expect("list");
    assert_eq!(jokes, vec![joke("2")]);
}

#[tokio::test]
async fn delete_of_unknown_id_is_a_no_op() {
    let local = LocalJokeStore::new(MemorySlotStore::new());
    local.ensure_slot().await.expect("init");
    local.save_joke(joke("1")).await.expect("save");

    local.delete_joke(&JokeId::from("9")).await.expect("delete");
    local.delete_joke(&JokeId::from("9")).await.expect("delete again");

    assert_eq!(local.list_jokes().await.expect("list"), vec![joke("1")]);
}

#[tokio::test]
async fn ensure_slot_keeps_existing_content() {
    let local = LocalJokeStore::new(MemorySlotStore::new());
    local.ensure_slot().await.expect("init");
    local.save_joke(joke("1")).await.expect("save");

    local.ensure_slot().await.expect("ensure again");

    assert_eq!(local.list_jokes().await.expect("list").len(), 1);
}

#[tokio::test]
async fn garbage_in_slot_is_a_decode_error() {
    let slots = MemorySlotStore::new();
    slots.set("jokes", "{not json").await.expect("set");
    let local = LocalJokeStore::new(slots);

    let err = local.list_jokes().await.expect_err("must fail");
    assert_eq!(err.kind(), shared::error::ErrorKind::Decode);
}

#[tokio::test]
async fn custom_key_leaves_default_slot_alone() {
    let slots = MemorySlotStore::new();
    let local = LocalJokeStore::with_key(slots.clone(), "favourites");
    local.list_jokes().await.expect("init");

    assert_eq!(local.key(), "favourites");
    assert!(slots.get(DEFAULT_SLOT_KEY).await.expect("get").is_none());
    assert!(slots.get("favourites").await.expect("get").is_some());
}

#[tokio::test]
async fn sqlite_slots_overwrite_values() {
    let store = SqliteSlotStore::new("sqlite::memory:").await.expect("db");

    assert!(store.get("jokes").await.expect("get").is_none());
    store.set("jokes", "[]").await.expect("set");
    store.set("jokes", "[1]").await.expect("overwrite");

    assert_eq!(store.get("jokes").await.expect("get").as_deref(), Some("[1]"));
}

#[tokio::test]
async fn sqlite_store_creates_database_file_when_missing() {
    let temp_root = tempfile::tempdir().expect("tempdir");
    let db_path = temp_root.path().join("nested").join("jokes.db");
    let database_url = format!("sqlite://{}", db_path.to_string_lossy().replace('\\', "/"));

    let store = SqliteSlotStore::new(&database_url).await.expect("db");
    store.pool().close().await;

    assert!(
        db_path.exists(),
        "database file should exist: {}",
        db_path.display()
    );
}

#[test]
fn sqlite_path_ignores_memory_urls() {
    assert!(sqlite_path("sqlite::memory:").is_none());
    assert!(sqlite_path("postgres://localhost/db").is_none());
    assert_eq!(
        sqlite_path("sqlite://./data/jokes.db?mode=rwc"),
        Some(PathBuf::from("./data/jokes.db"))
    );
}
