//! Core service façade and bootstrap helpers.
//!
//! This crate wires host-provided bridge implementations (HTTP,
//! filesystem, key-value store, network monitor, player backend) into the
//! media core and exposes the single UI-facing API surface. Desktop apps
//! typically enable the `desktop-shims` feature (which depends on
//! `bridge-desktop`); mobile hosts inject their own adapters.

pub mod error;

pub use error::{CoreError, Result};

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bridge_traits::{
    http::HttpClient,
    network::NetworkMonitor,
    player::PlayerBackend,
    storage::{FileSystemAccess, KeyValueStore},
    time::Clock,
};
use core_playback::offline::{DownloadConfig, DownloadProgress, DownloadRecord, OfflineAssetManager};
use core_playback::{
    locator, EngineConfig, PlaybackEngine, PlaybackSnapshot, PlaybackSpeed, RecordingId,
    SubscriptionId, TrackRef,
};
use core_runtime::events::{CoreEvent, EventBus, NetworkEvent};
use parking_lot::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, info, instrument, warn};

/// Top-level configuration for the core.
#[derive(Debug, Clone, Default)]
pub struct CoreConfig {
    pub engine: EngineConfig,
    pub downloads: DownloadConfig,
    /// Event bus buffer size; `None` uses the default.
    pub event_buffer: Option<usize>,
}

/// Aggregated handle to all bridge dependencies the core requires.
pub struct CoreDependencies {
    pub http_client: Arc<dyn HttpClient>,
    pub filesystem: Arc<dyn FileSystemAccess>,
    pub key_value_store: Arc<dyn KeyValueStore>,
    pub network_monitor: Arc<dyn NetworkMonitor>,
    pub player_backend: Arc<dyn PlayerBackend>,
    pub clock: Arc<dyn Clock>,
}

impl CoreDependencies {
    /// Construct a dependency bundle from explicit bridge handles.
    pub fn new(
        http_client: Arc<dyn HttpClient>,
        filesystem: Arc<dyn FileSystemAccess>,
        key_value_store: Arc<dyn KeyValueStore>,
        network_monitor: Arc<dyn NetworkMonitor>,
        player_backend: Arc<dyn PlayerBackend>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            http_client,
            filesystem,
            key_value_store,
            network_monitor,
            player_backend,
            clock,
        }
    }
}

/// Primary façade exposed to host applications.
///
/// One logical instance exists per running app; it is explicitly
/// constructed and passed by reference to consumers, never a hidden
/// global. The connectivity subscription is registered here, at
/// construction, so the engine's dependencies stay visible.
pub struct CoreService {
    engine: Arc<PlaybackEngine>,
    downloads: Arc<OfflineAssetManager>,
    events: Arc<EventBus>,
    connected: Arc<AtomicBool>,
    network_task: Mutex<Option<JoinHandle<()>>>,
}

impl CoreService {
    /// Create a new service from the provided dependencies.
    pub async fn new(deps: CoreDependencies, config: CoreConfig) -> Result<Self> {
        let events = Arc::new(match config.event_buffer {
            Some(capacity) => EventBus::new(capacity),
            None => EventBus::default(),
        });

        let engine = Arc::new(
            PlaybackEngine::new(deps.player_backend.clone(), config.engine)?
                .with_event_bus(events.clone()),
        );

        let downloads = Arc::new(
            OfflineAssetManager::new(
                config.downloads,
                deps.key_value_store.clone(),
                deps.filesystem.clone(),
                deps.http_client.clone(),
                deps.clock.clone(),
            )?
            .with_event_bus(events.clone()),
        );
        downloads.initialize().await?;

        let connected = Arc::new(AtomicBool::new(deps.network_monitor.is_connected().await));
        let network_task =
            Self::watch_connectivity(deps.network_monitor, connected.clone(), events.clone())
                .await?;

        info!("core service ready");
        Ok(Self {
            engine,
            downloads,
            events,
            connected,
            network_task: Mutex::new(Some(network_task)),
        })
    }

    async fn watch_connectivity(
        monitor: Arc<dyn NetworkMonitor>,
        connected: Arc<AtomicBool>,
        events: Arc<EventBus>,
    ) -> Result<JoinHandle<()>> {
        let mut stream = monitor
            .subscribe_changes()
            .await
            .map_err(|err| CoreError::InitializationFailed(err.to_string()))?;

        Ok(tokio::spawn(async move {
            while let Some(status) = stream.next().await {
                let online = status.is_online();
                let previous = connected.swap(online, Ordering::AcqRel);
                if previous != online {
                    debug!(connected = online, "connectivity changed");
                    events
                        .emit(CoreEvent::Network(NetworkEvent::ConnectivityChanged {
                            connected: online,
                        }))
                        .ok();
                }
            }
        }))
    }

    // ------------------------------------------------------------------
    // Observation
    // ------------------------------------------------------------------

    /// Register a playback snapshot observer. The current snapshot is
    /// delivered synchronously before this returns.
    pub fn subscribe(
        &self,
        callback: impl Fn(&PlaybackSnapshot) + Send + Sync + 'static,
    ) -> SubscriptionId {
        self.engine.subscribe(callback)
    }

    /// Remove a playback snapshot observer.
    pub fn unsubscribe(&self, id: &SubscriptionId) -> bool {
        self.engine.unsubscribe(id)
    }

    /// The current playback snapshot.
    pub fn playback_state(&self) -> PlaybackSnapshot {
        self.engine.snapshot()
    }

    /// The typed event bus (playback, download, network events).
    pub fn events(&self) -> Arc<EventBus> {
        self.events.clone()
    }

    /// Last observed connectivity.
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::Acquire)
    }

    // ------------------------------------------------------------------
    // Playback
    // ------------------------------------------------------------------

    /// Resolve a source for `track` and start (or toggle) playback.
    ///
    /// Prefers the downloaded copy; falls back to the remote stream when
    /// connected; fails with [`CoreError::SourceUnavailable`] otherwise
    /// without touching the engine.
    #[instrument(skip(self, track), fields(track_id = %track.id))]
    pub async fn play(&self, track: TrackRef) -> Result<()> {
        let local_copy = self.downloads.path_for(&track.id);
        let source = locator::resolve(&track, local_copy.as_deref(), self.is_connected())
            .ok_or_else(|| {
                warn!("no playable source: offline and not downloaded");
                CoreError::SourceUnavailable(track.id.to_string())
            })?;

        self.engine.load_and_play(source, track).await?;
        Ok(())
    }

    pub async fn pause(&self) -> Result<()> {
        Ok(self.engine.pause().await?)
    }

    pub async fn stop(&self) -> Result<()> {
        Ok(self.engine.stop().await?)
    }

    pub async fn seek_to(&self, position: Duration) -> Result<()> {
        Ok(self.engine.seek_to(position).await?)
    }

    pub async fn skip_forward(&self, delta: Duration) -> Result<()> {
        Ok(self.engine.skip_forward(delta).await?)
    }

    pub async fn skip_backward(&self, delta: Duration) -> Result<()> {
        Ok(self.engine.skip_backward(delta).await?)
    }

    /// Returns `false` when no player resource is attached.
    pub async fn set_speed(&self, speed: PlaybackSpeed) -> bool {
        self.engine.set_speed(speed).await
    }

    /// Returns `false` when no player resource is attached.
    pub async fn set_looping(&self, looping: bool) -> bool {
        self.engine.set_looping(looping).await
    }

    // ------------------------------------------------------------------
    // Offline library
    // ------------------------------------------------------------------

    pub async fn download(&self, track: &TrackRef) -> Result<()> {
        Ok(self.downloads.download(track).await?)
    }

    pub async fn delete_download(&self, id: &RecordingId) -> Result<()> {
        Ok(self.downloads.delete(id).await?)
    }

    /// Clear every download in the active namespace. Used on sign-out and
    /// explicit "clear all".
    pub async fn clear_downloads(&self) -> Result<()> {
        Ok(self.downloads.clear_all().await?)
    }

    pub fn is_downloaded(&self, id: &RecordingId) -> bool {
        self.downloads.is_downloaded(id)
    }

    pub fn download_path(&self, id: &RecordingId) -> Option<PathBuf> {
        self.downloads.path_for(id)
    }

    pub fn download_progress(&self, id: &RecordingId) -> Option<DownloadProgress> {
        self.downloads.progress(id)
    }

    pub fn active_downloads(&self) -> Vec<DownloadProgress> {
        self.downloads.active_downloads()
    }

    pub async fn list_downloads(&self) -> Result<Vec<DownloadRecord>> {
        Ok(self.downloads.list_all().await?)
    }

    pub async fn storage_usage(&self) -> Result<u64> {
        Ok(self.downloads.storage_usage().await?)
    }

    /// Switch the active storage namespace to `user` (or the anonymous
    /// bucket).
    pub async fn set_user(&self, user: Option<String>) -> Result<()> {
        Ok(self.downloads.set_user(user).await?)
    }

    // ------------------------------------------------------------------
    // Lifecycle
    // ------------------------------------------------------------------

    /// Stop playback and detach the connectivity subscription.
    pub async fn shutdown(&self) {
        if let Some(task) = self.network_task.lock().take() {
            task.abort();
        }
        if let Err(err) = self.engine.stop().await {
            warn!(error = %err, "failed to stop playback during shutdown");
        }
    }
}

impl std::fmt::Debug for CoreService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreService")
            .field("connected", &self.is_connected())
            .field("playback", &self.playback_state())
            .finish()
    }
}

/// Convenience bootstrapper for desktop hosts.
///
/// The player backend stays host-provided: desktop apps bring their own
/// audio pipeline, while storage, HTTP and connectivity use the
/// `bridge-desktop` adapters.
///
/// ```ignore
/// use core_service::{bootstrap_desktop, CoreConfig};
///
/// let core = bootstrap_desktop(my_player_backend, CoreConfig::default()).await?;
/// core.play(track).await?;
/// ```
#[cfg(feature = "desktop-shims")]
pub async fn bootstrap_desktop(
    player_backend: Arc<dyn PlayerBackend>,
    config: CoreConfig,
) -> Result<CoreService> {
    use bridge_desktop::{
        DesktopNetworkMonitor, ReqwestHttpClient, SqliteKeyValueStore, TokioFileSystem,
    };
    use bridge_traits::time::SystemClock;

    let filesystem = Arc::new(TokioFileSystem::new());
    let data_dir = filesystem
        .get_data_directory()
        .await
        .map_err(|err| CoreError::InitializationFailed(err.to_string()))?;

    let key_value_store = SqliteKeyValueStore::new(data_dir.join("chorus.db"))
        .await
        .map_err(|err| CoreError::InitializationFailed(err.to_string()))?;

    let deps = CoreDependencies::new(
        Arc::new(ReqwestHttpClient::new()),
        filesystem,
        Arc::new(key_value_store),
        Arc::new(DesktopNetworkMonitor::new()),
        player_backend,
        Arc::new(SystemClock),
    );

    CoreService::new(deps, config).await
}
