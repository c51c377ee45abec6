//! File-based seen store — one newline-delimited record per entity.
//! Human-readable: `cat ~/.newsrelay/seen/5.txt` shows every delivered id.

use async_trait::async_trait;
use newsrelay_core::error::StorageError;
use newsrelay_core::types::EntityKey;
use std::collections::{HashMap, HashSet};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::AsyncWriteExt;

/// Durable, append-only set of delivered notification ids per entity.
#[async_trait]
pub trait SeenStore: Send + Sync {
    /// Backend name (for logs).
    fn name(&self) -> &str;

    /// Ids already delivered for `entity`. A missing record is an empty set,
    /// and the record is created so later appends find it.
    async fn load(&self, entity: &EntityKey) -> Result<HashSet<String>, StorageError>;

    /// Durably add `new_ids`. Either all of them are recorded or none are.
    async fn append(&self, entity: &EntityKey, new_ids: &[String]) -> Result<(), StorageError>;
}

/// File-based seen store.
pub struct FileSeenStore {
    dir: PathBuf,
}

impl FileSeenStore {
    /// Create a store keeping its records in `dir`.
    pub fn new(dir: &Path) -> Self {
        Self {
            dir: dir.to_path_buf(),
        }
    }

    /// Path of the record for `entity`.
    pub fn record_path(&self, entity: &EntityKey) -> Result<PathBuf, StorageError> {
        if !entity.is_path_safe() {
            return Err(StorageError::new(entity.as_str(), "key is not usable as a file name"));
        }
        Ok(self.dir.join(format!("{entity}.txt")))
    }

    /// Ids in the order they were first recorded.
    pub async fn ids(&self, entity: &EntityKey) -> Result<Vec<String>, StorageError> {
        let path = self.record_path(entity)?;
        match tokio::fs::read_to_string(&path).await {
            Ok(content) => Ok(parse_record(&content)),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::info!("📄 No seen record for '{}' yet, creating {}", entity, path.display());
                tokio::fs::create_dir_all(&self.dir)
                    .await
                    .map_err(|e| StorageError::new(entity.as_str(), format!("create dir: {e}")))?;
                tokio::fs::write(&path, "")
                    .await
                    .map_err(|e| StorageError::new(entity.as_str(), format!("create record: {e}")))?;
                Ok(Vec::new())
            }
            Err(e) => Err(StorageError::new(entity.as_str(), format!("read {}: {e}", path.display()))),
        }
    }

    /// Write the whole record to a sibling temp file, then rename it into place.
    async fn replace_record(&self, entity: &EntityKey, ids: &[String]) -> Result<(), StorageError> {
        let path = self.record_path(entity)?;
        let tmp = path.with_extension("txt.tmp");
        let err = |what: &str, e: std::io::Error| StorageError::new(entity.as_str(), format!("{what}: {e}"));

        let mut file = tokio::fs::File::create(&tmp).await.map_err(|e| err("create temp", e))?;
        file.write_all(ids.join("\n").as_bytes())
            .await
            .map_err(|e| err("write temp", e))?;
        file.sync_all().await.map_err(|e| err("sync temp", e))?;
        drop(file);

        tokio::fs::rename(&tmp, &path).await.map_err(|e| err("rename", e))?;
        Ok(())
    }
}

#[async_trait]
impl SeenStore for FileSeenStore {
    fn name(&self) -> &str {
        "file"
    }

    async fn load(&self, entity: &EntityKey) -> Result<HashSet<String>, StorageError> {
        Ok(self.ids(entity).await?.into_iter().collect())
    }

    async fn append(&self, entity: &EntityKey, new_ids: &[String]) -> Result<(), StorageError> {
        if new_ids.is_empty() {
            return Ok(());
        }
        let mut ids = self.ids(entity).await?;
        let mut known: HashSet<String> = ids.iter().cloned().collect();
        for id in new_ids {
            if known.insert(id.clone()) {
                ids.push(id.clone());
            }
        }
        self.replace_record(entity, &ids).await?;
        tracing::debug!("💾 Saved {} seen ids for '{}' ({} total)", new_ids.len(), entity, ids.len());
        Ok(())
    }
}

/// Reads through to another store but keeps appends in memory.
///
/// Dry runs see the real seen set, and nothing they "deliver" is recorded.
pub struct DryRunSeenStore {
    inner: Arc<dyn SeenStore>,
    pending: Mutex<HashMap<EntityKey, HashSet<String>>>,
}

impl DryRunSeenStore {
    pub fn new(inner: Arc<dyn SeenStore>) -> Self {
        Self {
            inner,
            pending: Mutex::new(HashMap::new()),
        }
    }

    fn pending(&self) -> std::sync::MutexGuard<'_, HashMap<EntityKey, HashSet<String>>> {
        self.pending.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[async_trait]
impl SeenStore for DryRunSeenStore {
    fn name(&self) -> &str {
        "dry-run"
    }

    async fn load(&self, entity: &EntityKey) -> Result<HashSet<String>, StorageError> {
        let mut seen = self.inner.load(entity).await?;
        if let Some(pending) = self.pending().get(entity) {
            seen.extend(pending.iter().cloned());
        }
        Ok(seen)
    }

    async fn append(&self, entity: &EntityKey, new_ids: &[String]) -> Result<(), StorageError> {
        self.pending()
            .entry(entity.clone())
            .or_default()
            .extend(new_ids.iter().cloned());
        tracing::debug!("🧪 Dry run: {} ids for '{}' kept in memory", new_ids.len(), entity);
        Ok(())
    }
}

fn parse_record(content: &str) -> Vec<String> {
    content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect()
}
