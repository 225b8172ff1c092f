use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::error::StorageResult;

// Well-known keys shared by every user
pub const API_KEY_KEY: &str = "gemini_api_key";
pub const DARK_MODE_KEY: &str = "darkMode";
pub const COMPLETED_KEY: &str = "completedFlashcards";
pub const CURRENT_USER_KEY: &str = "mockUser";
pub const USER_KEY_PREFIX: &str = "user_";

// Per-user key, e.g. user_<id>_topics
pub fn user_key(user_id: &str, suffix: &str) -> String {
    format!("{}{}_{}", USER_KEY_PREFIX, user_id, suffix)
}

// Flat string-keyed store; no atomicity across keys
#[async_trait]
pub trait Storage: Send + Sync {
    async fn get(&self, key: &str) -> StorageResult<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    async fn remove(&self, key: &str) -> StorageResult<()>;

    // Drops every key the predicate rejects
    async fn retain(&self, keep: &(dyn for<'k> Fn(&'k str) -> bool + Sync)) -> StorageResult<()>;
}

// JSON helpers layered over any Storage
pub async fn get_json<T: DeserializeOwned>(
    storage: &dyn Storage,
    key: &str,
) -> StorageResult<Option<T>> {
    match storage.get(key).await? {
        Some(raw) => Ok(Some(serde_json::from_str(&raw)?)),
        None => Ok(None),
    }
}

pub async fn set_json<T: Serialize + ?Sized>(
    storage: &dyn Storage,
    key: &str,
    value: &T,
) -> StorageResult<()> {
    let raw = serde_json::to_string(value)?;
    storage.set(key, &raw).await
}

pub struct SqliteStorage {
    pool: SqlitePool,
}

impl SqliteStorage {
    pub async fn open(db_path: &Path) -> StorageResult<Self> {
        tracing::info!("opening storage at {}", db_path.display());

        let options = SqliteConnectOptions::new()
            .filename(db_path)
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options).await?;

        let storage = SqliteStorage { pool };
        storage.initialize_tables().await?;
        Ok(storage)
    }

    // A single connection so every query sees the same in-memory database
    pub async fn in_memory() -> StorageResult<Self> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await?;

        let storage = SqliteStorage { pool };
        storage.initialize_tables().await?;
        Ok(storage)
    }

    async fn initialize_tables(&self) -> StorageResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS kv_store (
                key TEXT PRIMARY KEY NOT NULL,
                value TEXT NOT NULL,
                updated_at DATETIME DEFAULT (datetime('now'))
            )
            "#,
        )
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[async_trait]
impl Storage for SqliteStorage {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let row: Option<(String,)> = sqlx::query_as("SELECT value FROM kv_store WHERE key = ?")
            .bind(key)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|r| r.0))
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        sqlx::query(
            r#"
            INSERT INTO kv_store (key, value, updated_at) VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
            "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        tracing::debug!("stored {} ({} bytes)", key, value.len());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        sqlx::query("DELETE FROM kv_store WHERE key = ?")
            .bind(key)
            .execute(&self.pool)
            .await?;

        tracing::debug!("removed {}", key);
        Ok(())
    }

    async fn retain(&self, keep: &(dyn for<'k> Fn(&'k str) -> bool + Sync)) -> StorageResult<()> {
        let keys: Vec<(String,)> = sqlx::query_as("SELECT key FROM kv_store")
            .fetch_all(&self.pool)
            .await?;

        for (key,) in keys {
            if !keep(&key) {
                self.remove(&key).await?;
            }
        }
        Ok(())
    }
}

// Process-local store for tests and throwaway sessions
#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        // A poisoned map is still a valid map
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.entries().get(key).cloned())
    }

    async fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.entries().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove(&self, key: &str) -> StorageResult<()> {
        self.entries().remove(key);
        Ok(())
    }

    async fn retain(&self, keep: &(dyn for<'k> Fn(&'k str) -> bool + Sync)) -> StorageResult<()> {
        self.entries().retain(|k, _| keep(k));
        Ok(())
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    async fn exercise(storage: &dyn Storage) {
        assert_eq!(storage.get("a").await.unwrap(), None);

        storage.set("a", "1").await.unwrap();
        storage.set("a", "2").await.unwrap();
        storage.set("b", "3").await.unwrap();
        assert_eq!(storage.get("a").await.unwrap().as_deref(), Some("2"));

        storage.remove("a").await.unwrap();
        assert_eq!(storage.get("a").await.unwrap(), None);

        storage.set("keep", "x").await.unwrap();
        storage.set("keep_too", "y").await.unwrap();
        storage.retain(&|key| key.starts_with("keep")).await.unwrap();
        assert_eq!(storage.get("b").await.unwrap(), None);
        assert_eq!(storage.get("keep").await.unwrap().as_deref(), Some("x"));
        assert_eq!(storage.get("keep_too").await.unwrap().as_deref(), Some("y"));
    }

    #[tokio::test]
    async fn memory_storage_roundtrip() {
        exercise(&MemoryStorage::new()).await;
    }

    #[tokio::test]
    async fn sqlite_storage_roundtrip() {
        exercise(&SqliteStorage::in_memory().await.unwrap()).await;
    }

    #[tokio::test]
    async fn sqlite_file_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("store.db");

        let storage = SqliteStorage::open(&path).await.unwrap();
        storage.set(DARK_MODE_KEY, "true").await.unwrap();
        drop(storage);

        let reopened = SqliteStorage::open(&path).await.unwrap();
        assert_eq!(
            reopened.get(DARK_MODE_KEY).await.unwrap().as_deref(),
            Some("true")
        );
    }

    #[tokio::test]
    async fn file_name_with_url_characters() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("deck?mode=ro#50%.db");

        let storage = SqliteStorage::open(&path).await.unwrap();
        storage.set("a", "1").await.unwrap();

        assert!(path.exists());
        assert_eq!(storage.get("a").await.unwrap().as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn json_helpers() {
        let storage = MemoryStorage::new();
        set_json(&storage, "list", &vec!["x", "y"]).await.unwrap();
        let list: Option<Vec<String>> = get_json(&storage, "list").await.unwrap();
        assert_eq!(list, Some(vec!["x".to_string(), "y".to_string()]));

        storage.set("broken", "{not json").await.unwrap();
        assert!(get_json::<Vec<String>>(&storage, "broken").await.is_err());
    }

    #[test]
    fn user_keys_are_namespaced() {
        assert_eq!(user_key("abc", "topics"), "user_abc_topics");
    }
}
