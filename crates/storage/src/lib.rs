use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Arc,
};

use async_trait::async_trait;
use shared::{
    domain::{Joke, JokeId},
    error::{JokeError, JokeResult},
};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    Pool, Row, Sqlite,
};
use tokio::sync::Mutex;

pub const DEFAULT_SLOT_KEY: &str = "jokes";

/// String-valued key/value persistence, addressed by slot key.
#[async_trait]
pub trait SlotStore: Send + Sync {
    async fn get(&self, key: &str) -> JokeResult<Option<String>>;
    async fn set(&self, key: &str, value: &str) -> JokeResult<()>;
}

#[derive(Clone)]
pub struct SqliteSlotStore {
    pool: Pool<Sqlite>,
}

impl SqliteSlotStore {
    pub async fn new(database_url: &str) -> JokeResult<Self> {
        ensure_sqlite_parent_dir_exists(database_url)?;

        let connect_options = SqliteConnectOptions::from_str(database_url)
            .map_err(|err| {
                JokeError::storage(format!("invalid database url '{database_url}': {err}"))
            })?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(connect_options)
            .await
            .map_err(|err| {
                JokeError::storage(format!("failed to open '{database_url}': {err}"))
            })?;

        let store = Self { pool };
        store.ensure_slots_table().await?;
        Ok(store)
    }

    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    async fn ensure_slots_table(&self) -> JokeResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS slots (
                key        TEXT PRIMARY KEY NOT NULL,
                value      TEXT NOT NULL,
                updated_at TEXT NOT NULL DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|err| JokeError::storage(format!("failed to ensure slots table exists: {err}")))?;
        Ok(())
    }
}

#[async_trait]
impl SlotStore for SqliteSlotStore {
    async fn get(&self, key: &str) -> JokeResult<Option<String>> {
        let row = sqlx::query("SELECT value FROM slots WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| JokeError::storage(format!("failed to read slot '{key}': {err}")))?;
        Ok(row.map(|r| r.get::<String, _>(0)))
    }

    async fn set(&self, key: &str, value: &str) -> JokeResult<()> {
        sqlx::query(
            "INSERT INTO slots (key, value) VALUES (?, ?)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP",
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await
        .map_err(|err| JokeError::storage(format!("failed to write slot '{key}': {err}")))?;
        Ok(())
    }
}

/// Process-local slots; cloning shares the same map.
#[derive(Clone, Default)]
pub struct MemorySlotStore {
    slots: Arc<Mutex<HashMap<String, String>>>,
}

impl MemorySlotStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SlotStore for MemorySlotStore {
    async fn get(&self, key: &str) -> JokeResult<Option<String>> {
        Ok(self.slots.lock().await.get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> JokeResult<()> {
        self.slots
            .lock()
            .await
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Saved jokes, kept as one JSON array under a single slot.
///
/// Every operation reads and rewrites the whole array.
#[derive(Clone)]
pub struct LocalJokeStore<S> {
    slots: S,
    key: String,
}

impl<S: SlotStore> LocalJokeStore<S> {
    pub fn new(slots: S) -> Self {
        Self::with_key(slots, DEFAULT_SLOT_KEY)
    }

    pub fn with_key(slots: S, key: impl Into<String>) -> Self {
        Self {
            slots,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn slots(&self) -> &S {
        &self.slots
    }

    /// Returns the saved jokes in save order. An absent slot is initialized
    /// to an empty array.
    pub async fn list_jokes(&self) -> JokeResult<Vec<Joke>> {
        match self.slots.get(&self.key).await? {
            Some(raw) => decode_jokes(&raw),
            None => {
                self.write_jokes(&[]).await?;
                Ok(Vec::new())
            }
        }
    }

    pub async fn ensure_slot(&self) -> JokeResult<()> {
        if self.slots.get(&self.key).await?.is_none() {
            self.write_jokes(&[]).await?;
        }
        Ok(())
    }

    /// Appends `joke`. Fails with `MissingSlot` if the slot was never initialized.
    pub async fn save_joke(&self, joke: Joke) -> JokeResult<()> {
        let mut jokes = self.read_existing().await?;
        jokes.push(joke);
        self.write_jokes(&jokes).await
    }

    /// Removes every joke with the given id.
    pub async fn delete_joke(&self, id: &JokeId) -> JokeResult<()> {
        let mut jokes = self.read_existing().await?;
        jokes.retain(|joke| &joke.id != id);
        self.write_jokes(&jokes).await
    }

    async fn read_existing(&self) -> JokeResult<Vec<Joke>> {
        let raw = self
            .slots
            .get(&self.key)
            .await?
            .ok_or_else(|| JokeError::missing_slot(&self.key))?;
        decode_jokes(&raw)
    }

    async fn write_jokes(&self, jokes: &[Joke]) -> JokeResult<()> {
        let raw = serde_json::to_string(jokes)?;
        self.slots.set(&self.key, &raw).await
    }
}

fn decode_jokes(raw: &str) -> JokeResult<Vec<Joke>> {
    serde_json::from_str(raw).map_err(|err| JokeError::decode(format!("stored jokes: {err}")))
}

fn ensure_sqlite_parent_dir_exists(database_url: &str) -> JokeResult<()> {
    let Some(path) = sqlite_path(database_url) else {
        return Ok(());
    };

    let Some(parent) = path.parent() else {
        return Ok(());
    };

    fs::create_dir_all(parent).map_err(|err| {
        JokeError::storage(format!(
            "failed to create parent directory '{}' for database url '{database_url}': {err}",
            parent.display()
        ))
    })?;

    Ok(())
}

fn sqlite_path(database_url: &str) -> Option<PathBuf> {
    if database_url.starts_with("sqlite::memory:") || !database_url.starts_with("sqlite:") {
        return None;
    }

    let path = database_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:")
        .split('?')
        .next()
        .unwrap_or_default();

    if path.is_empty() {
        return None;
    }

    Some(Path::new(path).to_path_buf())
}

#[cfg(test)]
#[path = "tests/lib_tests.rs"]
mod tests;
