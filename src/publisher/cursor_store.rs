//! Publish cursor storage and persistence.

use dashmap::DashMap;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::publisher::interval::{PublishCursor, PublishedBlock};
use crate::publisher::types::TargetKey;

/// File name under the storage location.
pub const CURSOR_FILE: &str = "publish-cursors.json";

/// Thread-safe map of target → cursor, optionally backed by a JSON file.
#[derive(Clone, Default)]
pub struct CursorStore {
    inner: Arc<DashMap<TargetKey, PublishCursor>>,
    persistence_path: Option<PathBuf>,
    /// Serializes writers of the backing file.
    save_lock: Arc<Mutex<()>>,
}

impl CursorStore {
    /// A store that forgets everything on restart.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open the store under `storage_location`, loading existing cursors.
    pub fn open(storage_location: &Path) -> std::io::Result<Self> {
        fs::create_dir_all(storage_location)?;
        let path = storage_location.join(CURSOR_FILE);

        let store = Self {
            persistence_path: Some(path.clone()),
            ..Self::default()
        };

        if path.exists() {
            let reader = BufReader::new(File::open(&path)?);
            let map: BTreeMap<String, PublishCursor> = serde_json::from_reader(reader)?;

            for (key, cursor) in map {
                match key.parse::<TargetKey>() {
                    Ok(target) => {
                        store.inner.insert(target, cursor);
                    }
                    Err(e) => tracing::warn!(error = %e, "Skipping unreadable cursor entry"),
                }
            }
            tracing::info!(
                path = %path.display(),
                cursors = store.inner.len(),
                "Loaded publish cursors"
            );
        }

        Ok(store)
    }

    /// Cursor for `target`, zeroed if never seen.
    pub fn get(&self, target: &TargetKey) -> PublishCursor {
        self.inner
            .get(target)
            .map(|r| r.value().clone())
            .unwrap_or_default()
    }

    pub fn put(&self, target: TargetKey, cursor: PublishCursor) {
        self.inner.insert(target, cursor);
    }

    /// Store the counting part of `cursor`, keeping the recorded publication.
    pub fn record_observation(&self, target: &TargetKey, cursor: &PublishCursor) {
        let mut entry = self.inner.entry(target.clone()).or_default();
        entry.blocks_since_publish = cursor.blocks_since_publish;
        entry.last_observed_height = cursor.last_observed_height;
        entry.last_job = cursor.last_job;
    }

    /// Record a confirmed publication without touching the count.
    pub fn record_published(&self, target: &TargetKey, published: PublishedBlock) {
        self.inner.entry(target.clone()).or_default().last_published = Some(published);
    }

    pub fn len(&self) -> usize {
        self.inner.len()
    }

    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Write all cursors to the backing file, if any.
    ///
    /// Writes a temporary file and renames it over the old one, so a crash never
    /// leaves a truncated file behind.
    pub fn save(&self) -> std::io::Result<()> {
        let Some(path) = &self.persistence_path else {
            return Ok(());
        };
        let _guard = self.save_lock.lock().unwrap_or_else(|e| e.into_inner());

        let map: BTreeMap<String, PublishCursor> = self
            .inner
            .iter()
            .map(|r| (r.key().to_string(), r.value().clone()))
            .collect();

        let tmp = path.with_extension("json.tmp");
        {
            let mut writer = BufWriter::new(File::create(&tmp)?);
            serde_json::to_writer_pretty(&mut writer, &map)?;
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp, path)?;

        tracing::trace!(cursors = map.len(), "Saved publish cursors");
        Ok(())
    }
}

impl CursorStore {
    /// [`save`](Self::save) on the blocking thread pool, for async callers.
    pub async fn persist(&self) -> std::io::Result<()> {
        if self.persistence_path.is_none() {
            return Ok(());
        }
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.save())
            .await
            .map_err(std::io::Error::other)?
    }
}

impl std::fmt::Debug for CursorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CursorStore")
            .field("cursors", &self.inner.len())
            .field("persistence_path", &self.persistence_path)
            .finish()
    }
}
