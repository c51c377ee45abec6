//! SQLite-backed seen store.
//! One database file for all entities; appends run in a single transaction.
//! Queries run on the blocking pool so a slow disk never stalls the runtime.

use async_trait::async_trait;
use newsrelay_core::error::StorageError;
use newsrelay_core::types::EntityKey;
use rusqlite::Connection;
use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use crate::store::SeenStore;

/// SQLite-backed seen store.
pub struct SqliteSeenStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteSeenStore {
    /// Open or create the seen database.
    pub fn open(path: &Path) -> Result<Self, StorageError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StorageError::new("*", format!("create dir: {e}")))?;
        }
        let conn = Connection::open(path).map_err(|e| StorageError::new("*", format!("DB open: {e}")))?;
        Self::with_connection(conn)
    }

    /// In-memory database.
    pub fn in_memory() -> Result<Self, StorageError> {
        let conn = Connection::open_in_memory().map_err(|e| StorageError::new("*", format!("DB open: {e}")))?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> Result<Self, StorageError> {
        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS seen_ids (
                entity TEXT NOT NULL,
                id TEXT NOT NULL,
                seen_at TEXT NOT NULL,
                PRIMARY KEY (entity, id)
            );
            ",
        )
        .map_err(|e| StorageError::new("*", format!("Migration: {e}")))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }
}

fn load_ids(conn: &Mutex<Connection>, entity: &EntityKey) -> Result<HashSet<String>, StorageError> {
    let err = |e: rusqlite::Error| StorageError::new(entity.as_str(), e);
    let conn = conn
        .lock()
        .map_err(|e| StorageError::new(entity.as_str(), format!("lock poisoned: {e}")))?;
    let mut stmt = conn
        .prepare("SELECT id FROM seen_ids WHERE entity = ?1")
        .map_err(err)?;
    let rows = stmt
        .query_map([entity.as_str()], |row| row.get::<_, String>(0))
        .map_err(err)?;
    let ids = rows.collect::<Result<HashSet<_>, _>>().map_err(err)?;
    Ok(ids)
}

fn append_ids(conn: &Mutex<Connection>, entity: &EntityKey, new_ids: &[String]) -> Result<usize, StorageError> {
    let err = |e: rusqlite::Error| StorageError::new(entity.as_str(), e);
    let mut conn = conn
        .lock()
        .map_err(|e| StorageError::new(entity.as_str(), format!("lock poisoned: {e}")))?;
    let now = chrono::Utc::now().to_rfc3339();
    let tx = conn.transaction().map_err(err)?;
    let mut inserted = 0;
    {
        let mut stmt = tx
            .prepare("INSERT OR IGNORE INTO seen_ids (entity, id, seen_at) VALUES (?1, ?2, ?3)")
            .map_err(err)?;
        for id in new_ids {
            inserted += stmt
                .execute(rusqlite::params![entity.as_str(), id, now])
                .map_err(err)?;
        }
    }
    tx.commit().map_err(err)?;
    Ok(inserted)
}

#[async_trait]
impl SeenStore for SqliteSeenStore {
    fn name(&self) -> &str {
        "sqlite"
    }

    async fn load(&self, entity: &EntityKey) -> Result<HashSet<String>, StorageError> {
        let conn = self.conn.clone();
        let key = entity.clone();
        tokio::task::spawn_blocking(move || load_ids(&conn, &key))
            .await
            .map_err(|e| StorageError::new(entity.as_str(), format!("blocking task: {e}")))?
    }

    async fn append(&self, entity: &EntityKey, new_ids: &[String]) -> Result<(), StorageError> {
        let conn = self.conn.clone();
        let key = entity.clone();
        let ids = new_ids.to_vec();
        let inserted = tokio::task::spawn_blocking(move || append_ids(&conn, &key, &ids))
            .await
            .map_err(|e| StorageError::new(entity.as_str(), format!("blocking task: {e}")))??;
        tracing::debug!("💾 Recorded {} new seen ids for '{}'", inserted, entity);
        Ok(())
    }
}
