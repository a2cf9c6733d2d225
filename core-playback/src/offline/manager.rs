//! # Offline Asset Manager
//!
//! Orchestrates downloading remote assets to local storage, indexing them
//! per user, computing aggregate storage usage, and deleting assets
//! individually or in bulk.
//!
//! The persisted download index is the authoritative membership list; the
//! manager keeps an in-memory mirror of it so `is_downloaded` and
//! `path_for` answer synchronously.

use bridge_traits::error::BridgeError;
use bridge_traits::http::{HttpClient, HttpRequest};
use bridge_traits::storage::{FileSystemAccess, KeyValueStore};
use bridge_traits::time::Clock;
use core_runtime::events::{CoreEvent, DownloadEvent, EventBus};
use parking_lot::Mutex;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::Mutex as AsyncMutex;
use tracing::{debug, info, instrument, warn};

use crate::error::{PlaybackError, Result};
use crate::model::{RecordingId, TrackRef};
use crate::offline::config::DownloadConfig;
use crate::offline::progress::DownloadProgress;
use crate::offline::{index_key, record_key, DownloadRecord, Namespace};

/// Denormalized catalogue metadata fetched at download time.
#[derive(Debug, Clone, Deserialize)]
struct CatalogDetails {
    title: Option<String>,
    species: Option<String>,
    caption: Option<String>,
}

/// In-memory mirror of the active namespace.
#[derive(Default)]
struct ManagerState {
    namespace: Namespace,
    index: Vec<RecordingId>,
    paths: HashMap<RecordingId, PathBuf>,
    progress: HashMap<RecordingId, DownloadProgress>,
}

/// Offline asset manager.
pub struct OfflineAssetManager {
    config: DownloadConfig,
    kv: Arc<dyn KeyValueStore>,
    fs: Arc<dyn FileSystemAccess>,
    http: Arc<dyn HttpClient>,
    clock: Arc<dyn Clock>,
    events: Option<Arc<EventBus>>,
    state: Mutex<ManagerState>,
    /// Serializes read-modify-write cycles on the persisted index so
    /// concurrent downloads never lose entries.
    index_lock: AsyncMutex<()>,
    base_dir: Mutex<Option<PathBuf>>,
}

impl OfflineAssetManager {
    /// Create a new manager.
    ///
    /// # Arguments
    ///
    /// * `config` - Download configuration
    /// * `kv` - Key-value store holding records and the index
    /// * `fs` - Filesystem for payload files
    /// * `http` - HTTP client for asset and metadata fetches
    /// * `clock` - Time source for download timestamps
    pub fn new(
        config: DownloadConfig,
        kv: Arc<dyn KeyValueStore>,
        fs: Arc<dyn FileSystemAccess>,
        http: Arc<dyn HttpClient>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        config.validate().map_err(PlaybackError::InvalidConfig)?;

        Ok(Self {
            config,
            kv,
            fs,
            http,
            clock,
            events: None,
            state: Mutex::new(ManagerState::default()),
            index_lock: AsyncMutex::new(()),
            base_dir: Mutex::new(None),
        })
    }

    /// Set event bus for download events.
    pub fn with_event_bus(mut self, event_bus: Arc<EventBus>) -> Self {
        self.events = Some(event_bus);
        self
    }

    /// Initialize the manager: resolve the payload directory and load the
    /// index mirror for the active namespace.
    #[instrument(skip(self))]
    pub async fn initialize(&self) -> Result<()> {
        let data_dir = self
            .fs
            .get_data_directory()
            .await
            .map_err(storage_error)?;

        *self.base_dir.lock() = Some(data_dir.join(&self.config.downloads_dir));
        self.reload_namespace().await?;

        info!("offline asset manager initialized");
        Ok(())
    }

    /// Switch the active storage namespace.
    ///
    /// In-memory progress and the mirror are reset; nothing from the
    /// previous namespace remains visible.
    #[instrument(skip(self))]
    pub async fn set_user(&self, user: Option<String>) -> Result<()> {
        let namespace = Namespace::from_user(user);
        {
            let mut state = self.state.lock();
            if state.namespace == namespace {
                return Ok(());
            }
            state.namespace = namespace;
            state.index.clear();
            state.paths.clear();
            state.progress.clear();
        }

        self.reload_namespace().await
    }

    /// The active storage namespace.
    pub fn namespace(&self) -> Namespace {
        self.state.lock().namespace.clone()
    }

    /// Synchronous membership lookup against the index mirror.
    pub fn is_downloaded(&self, id: &RecordingId) -> bool {
        self.state.lock().index.contains(id)
    }

    /// Synchronous payload path lookup against the index mirror.
    pub fn path_for(&self, id: &RecordingId) -> Option<PathBuf> {
        self.state.lock().paths.get(id).cloned()
    }

    /// Transient progress of a download attempt, if one was made this
    /// process lifetime.
    pub fn progress(&self, id: &RecordingId) -> Option<DownloadProgress> {
        self.state.lock().progress.get(id).cloned()
    }

    /// All downloads currently fetching.
    pub fn active_downloads(&self) -> Vec<DownloadProgress> {
        self.state
            .lock()
            .progress
            .values()
            .filter(|progress| progress.is_active())
            .cloned()
            .collect()
    }

    /// Download the low-fidelity asset for `track`.
    ///
    /// No-op when the recording is already indexed; ignored when an
    /// attempt is already fetching. A failed attempt is terminal: the
    /// progress entry keeps the fault and the recording stays absent from
    /// the index until a fresh `download` call succeeds.
    #[instrument(skip(self, track), fields(recording_id = %track.id))]
    pub async fn download(&self, track: &TrackRef) -> Result<()> {
        let namespace = {
            let mut state = self.state.lock();
            if state.index.contains(&track.id) {
                debug!("already downloaded; nothing to do");
                return Ok(());
            }
            if state
                .progress
                .get(&track.id)
                .map_or(false, |progress| progress.is_active())
            {
                debug!("download already in flight; ignoring");
                return Ok(());
            }
            state
                .progress
                .insert(track.id.clone(), DownloadProgress::started(track.id.clone()));
            state.namespace.clone()
        };

        self.emit(DownloadEvent::Started {
            recording_id: track.id.to_string(),
        });

        match self.fetch_and_persist(&namespace, track).await {
            Ok(record) => {
                self.finish_progress(
                    &namespace,
                    DownloadProgress::completed(track.id.clone()),
                );
                info!(size_bytes = record.size_bytes, "download completed");
                self.emit(DownloadEvent::Completed {
                    recording_id: track.id.to_string(),
                    size_bytes: record.size_bytes,
                });
                Ok(())
            }
            Err(err) => {
                warn!(error = %err, "download failed");
                self.finish_progress(
                    &namespace,
                    DownloadProgress::failed(track.id.clone(), err.to_string()),
                );
                self.emit(DownloadEvent::Failed {
                    recording_id: track.id.to_string(),
                    message: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn fetch_and_persist(
        &self,
        namespace: &Namespace,
        track: &TrackRef,
    ) -> Result<DownloadRecord> {
        let dir = self.namespace_dir(namespace)?;
        self.fs
            .create_dir_all(&dir)
            .await
            .map_err(storage_error)?;

        let extension = file_extension(&track.download_url);
        let dest = dir.join(format!("audio_{}.{}", track.id, extension));

        let size_bytes = match self.http.download_to_file(&track.download_url, &dest).await {
            Ok(size) => size,
            Err(err) => {
                // A failed transfer may leave a partial payload behind.
                self.remove_payload(&dest).await;
                return Err(PlaybackError::DownloadFailed(err.to_string()));
            }
        };

        // Denormalized catalogue metadata is a nicety; its absence never
        // fails the download.
        let details = self.fetch_catalog_details(&track.id).await;

        let record = DownloadRecord {
            recording_id: track.id.clone(),
            file_path: dest.clone(),
            title: details
                .as_ref()
                .and_then(|d| d.title.clone())
                .or_else(|| track.title.clone()),
            species: details
                .as_ref()
                .and_then(|d| d.species.clone())
                .or_else(|| track.species.clone()),
            caption: details
                .as_ref()
                .and_then(|d| d.caption.clone())
                .or_else(|| track.caption.clone()),
            downloaded_at: self.clock.unix_timestamp(),
            size_bytes,
        };

        if let Err(err) = self.persist_record(namespace, &record).await {
            // Keep the invariant: a payload without a record is garbage.
            self.remove_payload(&dest).await;
            return Err(err);
        }

        Ok(record)
    }

    async fn persist_record(&self, namespace: &Namespace, record: &DownloadRecord) -> Result<()> {
        let payload =
            serde_json::to_vec(record).map_err(|e| PlaybackError::StorageFailed(e.to_string()))?;
        self.kv
            .set(&record_key(namespace, &record.recording_id), payload.into())
            .await
            .map_err(storage_error)?;

        let _guard = self.index_lock.lock().await;
        let key = index_key(namespace);
        let mut ids = self.read_index(&key).await?;
        if !ids.contains(&record.recording_id) {
            ids.push(record.recording_id.clone());
            let encoded =
                serde_json::to_vec(&ids).map_err(|e| PlaybackError::StorageFailed(e.to_string()))?;
            self.kv
                .set(&key, encoded.into())
                .await
                .map_err(storage_error)?;
        }

        let mut state = self.state.lock();
        if state.namespace == *namespace {
            if !state.index.contains(&record.recording_id) {
                state.index.push(record.recording_id.clone());
            }
            state
                .paths
                .insert(record.recording_id.clone(), record.file_path.clone());
        }
        Ok(())
    }

    async fn fetch_catalog_details(&self, id: &RecordingId) -> Option<CatalogDetails> {
        let endpoint = self.config.catalog_endpoint.as_ref()?;
        let url = format!("{}/recordings/{}", endpoint.trim_end_matches('/'), id);

        match self.http.execute(HttpRequest::get(url)).await {
            Ok(response) if response.is_success() => match response.json::<CatalogDetails>() {
                Ok(details) => Some(details),
                Err(err) => {
                    warn!(error = %err, "catalogue metadata parse failed");
                    None
                }
            },
            Ok(response) => {
                warn!(status = response.status, "catalogue metadata fetch failed");
                None
            }
            Err(err) => {
                warn!(error = %err, "catalogue metadata fetch failed");
                None
            }
        }
    }

    /// Delete a downloaded recording.
    ///
    /// Idempotent: a missing file or record counts as success, and
    /// storage faults are logged without aborting the removal of the
    /// remaining pieces.
    #[instrument(skip(self), fields(recording_id = %id))]
    pub async fn delete(&self, id: &RecordingId) -> Result<()> {
        let namespace = self.namespace();
        let key = record_key(&namespace, id);

        let stored_path = match self.kv.get(&key).await {
            Ok(Some(bytes)) => serde_json::from_slice::<DownloadRecord>(&bytes)
                .ok()
                .map(|record| record.file_path),
            Ok(None) => None,
            Err(err) => {
                warn!(error = %err, "failed to read download record");
                None
            }
        };

        let path = stored_path.or_else(|| self.state.lock().paths.get(id).cloned());
        if let Some(path) = path {
            self.remove_payload(&path).await;
        }

        if let Err(err) = self.kv.remove(&key).await {
            warn!(error = %err, "failed to remove download record");
        }

        self.remove_from_index(&namespace, id).await;

        let was_present = {
            let mut state = self.state.lock();
            if state.namespace != namespace {
                false
            } else {
                let present = state.index.contains(id);
                state.index.retain(|entry| entry != id);
                state.paths.remove(id);
                state.progress.remove(id);
                present
            }
        };

        if was_present {
            self.emit(DownloadEvent::Deleted {
                recording_id: id.to_string(),
            });
        }
        Ok(())
    }

    /// Remove every download in the active namespace.
    ///
    /// Used on sign-out and explicit "clear all"; safe to call when
    /// nothing is stored. Individual storage faults are logged and the
    /// clear continues.
    #[instrument(skip(self))]
    pub async fn clear_all(&self) -> Result<()> {
        let namespace = self.namespace();

        let _guard = self.index_lock.lock().await;
        let key = index_key(&namespace);
        let mut ids = self.read_index(&key).await.unwrap_or_default();
        for id in self.state.lock().index.clone() {
            if !ids.contains(&id) {
                ids.push(id);
            }
        }

        let removed = ids.len();
        for id in &ids {
            let entry_key = record_key(&namespace, id);
            if let Ok(Some(bytes)) = self.kv.get(&entry_key).await {
                if let Ok(record) = serde_json::from_slice::<DownloadRecord>(&bytes) {
                    self.remove_payload(&record.file_path).await;
                }
            }
            if let Err(err) = self.kv.remove(&entry_key).await {
                warn!(%id, error = %err, "failed to remove download record");
            }
        }

        if let Err(err) = self.kv.remove(&key).await {
            warn!(error = %err, "failed to remove download index");
        }

        // Drop stray files (e.g. partial downloads) with the directory.
        if let Ok(dir) = self.namespace_dir(&namespace) {
            if self.fs.exists(&dir).await.unwrap_or(false) {
                if let Err(err) = self.fs.delete_dir_all(&dir).await {
                    warn!(error = %err, "failed to remove download directory");
                }
            }
            if let Err(err) = self.fs.create_dir_all(&dir).await {
                warn!(error = %err, "failed to recreate download directory");
            }
        }

        {
            let mut state = self.state.lock();
            if state.namespace == namespace {
                state.index.clear();
                state.paths.clear();
                state.progress.clear();
            }
        }

        info!(items_removed = removed, "cleared all downloads");
        self.emit(DownloadEvent::Cleared {
            namespace: namespace.as_key_component().to_string(),
            items_removed: removed,
        });
        Ok(())
    }

    /// Reconstruct the full download records of the active namespace.
    ///
    /// Corrupt or missing entries are skipped with a warning; the index
    /// mirror stays authoritative for membership.
    pub async fn list_all(&self) -> Result<Vec<DownloadRecord>> {
        let (namespace, ids) = {
            let state = self.state.lock();
            (state.namespace.clone(), state.index.clone())
        };

        let mut records = Vec::with_capacity(ids.len());
        for id in ids {
            match self.kv.get(&record_key(&namespace, &id)).await {
                Ok(Some(bytes)) => match serde_json::from_slice::<DownloadRecord>(&bytes) {
                    Ok(record) => records.push(record),
                    Err(err) => warn!(%id, error = %err, "skipping corrupt download record"),
                },
                Ok(None) => warn!(%id, "indexed download has no stored record"),
                Err(err) => warn!(%id, error = %err, "failed to read download record"),
            }
        }

        Ok(records)
    }

    /// Total bytes stored in the active namespace, computed on demand.
    pub async fn storage_usage(&self) -> Result<u64> {
        let namespace = self.namespace();
        let dir = self.namespace_dir(&namespace)?;

        if !self.fs.exists(&dir).await.map_err(storage_error)? {
            return Ok(0);
        }
        self.fs.directory_size(&dir).await.map_err(storage_error)
    }

    async fn reload_namespace(&self) -> Result<()> {
        let namespace = self.namespace();
        let dir = self.namespace_dir(&namespace)?;
        self.fs
            .create_dir_all(&dir)
            .await
            .map_err(storage_error)?;

        let ids = self.read_index(&index_key(&namespace)).await?;

        let mut paths = HashMap::new();
        for id in &ids {
            match self.kv.get(&record_key(&namespace, id)).await {
                Ok(Some(bytes)) => match serde_json::from_slice::<DownloadRecord>(&bytes) {
                    Ok(record) => {
                        paths.insert(id.clone(), record.file_path);
                    }
                    Err(err) => warn!(%id, error = %err, "skipping corrupt download record"),
                },
                Ok(None) => warn!(%id, "indexed download has no stored record"),
                Err(err) => warn!(%id, error = %err, "failed to read download record"),
            }
        }

        let mut state = self.state.lock();
        if state.namespace != namespace {
            // Namespace switched again while we were reading
            return Ok(());
        }
        state.index = ids
            .into_iter()
            .filter(|id| paths.contains_key(id))
            .collect();
        state.paths = paths;

        debug!(entries = state.index.len(), %namespace, "download index loaded");
        Ok(())
    }

    async fn read_index(&self, key: &str) -> Result<Vec<RecordingId>> {
        match self.kv.get(key).await.map_err(storage_error)? {
            Some(bytes) => Ok(serde_json::from_slice(&bytes).unwrap_or_else(|err| {
                warn!(error = %err, "download index is corrupt; treating as empty");
                Vec::new()
            })),
            None => Ok(Vec::new()),
        }
    }

    async fn remove_from_index(&self, namespace: &Namespace, id: &RecordingId) {
        let _guard = self.index_lock.lock().await;
        let key = index_key(namespace);
        match self.kv.get(&key).await {
            Ok(Some(bytes)) => {
                let mut ids: Vec<RecordingId> =
                    serde_json::from_slice(&bytes).unwrap_or_default();
                if ids.iter().any(|entry| entry == id) {
                    ids.retain(|entry| entry != id);
                    match serde_json::to_vec(&ids) {
                        Ok(encoded) => {
                            if let Err(err) = self.kv.set(&key, encoded.into()).await {
                                warn!(error = %err, "failed to rewrite download index");
                            }
                        }
                        Err(err) => warn!(error = %err, "failed to encode download index"),
                    }
                }
            }
            Ok(None) => {}
            Err(err) => warn!(error = %err, "failed to read download index"),
        }
    }

    /// Delete a payload file, tolerating a file that is already gone.
    async fn remove_payload(&self, path: &Path) {
        match self.fs.exists(path).await {
            Ok(true) => {
                if let Err(err) = self.fs.delete_file(path).await {
                    warn!(path = %path.display(), error = %err, "failed to delete payload");
                }
            }
            Ok(false) => {}
            Err(err) => warn!(path = %path.display(), error = %err, "failed to stat payload"),
        }
    }

    fn finish_progress(&self, namespace: &Namespace, progress: DownloadProgress) {
        let mut state = self.state.lock();
        // A user switch mid-download orphans the attempt; its progress
        // stays with the namespace it belonged to, which is gone.
        if state.namespace == *namespace {
            state
                .progress
                .insert(progress.recording_id.clone(), progress);
        }
    }

    fn namespace_dir(&self, namespace: &Namespace) -> Result<PathBuf> {
        self.base_dir
            .lock()
            .clone()
            .map(|base| base.join(namespace.as_key_component()))
            .ok_or_else(|| {
                PlaybackError::StorageFailed("offline asset manager not initialized".to_string())
            })
    }

    fn emit(&self, event: DownloadEvent) {
        if let Some(bus) = &self.events {
            bus.emit(CoreEvent::Download(event)).ok();
        }
    }
}

impl std::fmt::Debug for OfflineAssetManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("OfflineAssetManager")
            .field("namespace", &state.namespace)
            .field("indexed", &state.index.len())
            .field("active_downloads", &state.progress.len())
            .finish()
    }
}

fn storage_error(err: BridgeError) -> PlaybackError {
    PlaybackError::StorageFailed(err.to_string())
}

/// File extension taken from the download URL, defaulting to `mp3`.
fn file_extension(url: &str) -> &str {
    url.rsplit('/')
        .next()
        .and_then(|name| {
            let name = name.split(['?', '#']).next().unwrap_or(name);
            name.rsplit_once('.').map(|(_, ext)| ext)
        })
        .filter(|ext| {
            !ext.is_empty() && ext.len() <= 5 && ext.chars().all(|c| c.is_ascii_alphanumeric())
        })
        .unwrap_or("mp3")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::offline::progress::DownloadStatus;

    #[test]
    fn extension_from_url() {
        assert_eq!(file_extension("https://cdn/lo/xc1.ogg"), "ogg");
        assert_eq!(file_extension("https://cdn/lo/xc1.m4a?token=abc"), "m4a");
        assert_eq!(file_extension("https://cdn/lo/xc1"), "mp3");
        assert_eq!(file_extension("https://cdn/lo/xc1.tar.gz"), "gz");
        assert_eq!(file_extension("https://cdn/lo/xc1.not-an-ext!"), "mp3");
    }

    #[test]
    fn download_status_defaults_idle() {
        assert_eq!(DownloadStatus::default(), DownloadStatus::Idle);
    }
}
