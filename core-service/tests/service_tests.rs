//! Service façade wiring tests: locator-mediated playback over mock
//! bridges.

use async_trait::async_trait;
use bridge_traits::error::{BridgeError, Result as BridgeResult};
use bridge_traits::http::{HttpClient, HttpRequest, HttpResponse};
use bridge_traits::network::{NetworkChangeStream, NetworkMonitor, NetworkStatus};
use bridge_traits::player::{
    MediaSource, PlayerBackend, PlayerControls, PlayerEventStream, PlayerHandle, PlayerStatus,
};
use bridge_traits::storage::{FileMetadata, FileSystemAccess, KeyValueStore};
use bridge_traits::time::Clock;
use bytes::Bytes;
use chrono::{DateTime, TimeZone, Utc};
use core_playback::{PlaybackPhase, TrackRef};
use core_service::{CoreConfig, CoreDependencies, CoreError, CoreService};
use parking_lot::Mutex;
use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

// ============================================================================
// Mock bridges
// ============================================================================

#[derive(Default)]
struct MemoryKv {
    entries: Mutex<HashMap<String, Bytes>>,
}

#[async_trait]
impl KeyValueStore for MemoryKv {
    async fn get(&self, key: &str) -> BridgeResult<Option<Bytes>> {
        Ok(self.entries.lock().get(key).cloned())
    }

    async fn set(&self, key: &str, value: Bytes) -> BridgeResult<()> {
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> BridgeResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }

    async fn list_keys(&self) -> BridgeResult<Vec<String>> {
        Ok(self.entries.lock().keys().cloned().collect())
    }

    async fn clear_all(&self) -> BridgeResult<()> {
        self.entries.lock().clear();
        Ok(())
    }
}

#[derive(Default)]
struct MemoryFs {
    files: Mutex<HashMap<PathBuf, u64>>,
    dirs: Mutex<HashSet<PathBuf>>,
}

#[async_trait]
impl FileSystemAccess for MemoryFs {
    async fn get_data_directory(&self) -> BridgeResult<PathBuf> {
        Ok(PathBuf::from("/data"))
    }

    async fn exists(&self, path: &Path) -> BridgeResult<bool> {
        Ok(self.files.lock().contains_key(path) || self.dirs.lock().contains(path))
    }

    async fn metadata(&self, path: &Path) -> BridgeResult<FileMetadata> {
        if let Some(size) = self.files.lock().get(path) {
            return Ok(FileMetadata {
                size: *size,
                modified_at: None,
                is_directory: false,
            });
        }
        if self.dirs.lock().contains(path) {
            return Ok(FileMetadata {
                size: 0,
                modified_at: None,
                is_directory: true,
            });
        }
        Err(BridgeError::OperationFailed("not found".into()))
    }

    async fn create_dir_all(&self, path: &Path) -> BridgeResult<()> {
        let mut dirs = self.dirs.lock();
        let mut current = path.to_path_buf();
        loop {
            dirs.insert(current.clone());
            match current.parent() {
                Some(parent) if parent != Path::new("") => current = parent.to_path_buf(),
                _ => break,
            }
        }
        Ok(())
    }

    async fn delete_file(&self, path: &Path) -> BridgeResult<()> {
        self.files
            .lock()
            .remove(path)
            .map(|_| ())
            .ok_or_else(|| BridgeError::OperationFailed("not found".into()))
    }

    async fn delete_dir_all(&self, path: &Path) -> BridgeResult<()> {
        self.dirs.lock().retain(|dir| !dir.starts_with(path));
        self.files.lock().retain(|file, _| !file.starts_with(path));
        Ok(())
    }

    async fn list_directory(&self, path: &Path) -> BridgeResult<Vec<PathBuf>> {
        let mut entries: Vec<PathBuf> = self
            .files
            .lock()
            .keys()
            .filter(|file| file.parent() == Some(path))
            .cloned()
            .collect();
        entries.extend(
            self.dirs
                .lock()
                .iter()
                .filter(|dir| dir.parent() == Some(path))
                .cloned(),
        );
        Ok(entries)
    }
}

struct MockHttp {
    fs: Arc<MemoryFs>,
}

#[async_trait]
impl HttpClient for MockHttp {
    async fn execute(&self, _request: HttpRequest) -> BridgeResult<HttpResponse> {
        Err(BridgeError::OperationFailed("no catalogue in tests".into()))
    }

    async fn download_to_file(&self, _url: &str, dest: &Path) -> BridgeResult<u64> {
        self.fs.files.lock().insert(dest.to_path_buf(), 1_024);
        Ok(1_024)
    }
}

struct StaticMonitor {
    connected: AtomicBool,
}

struct SilentChangeStream;

#[async_trait]
impl NetworkChangeStream for SilentChangeStream {
    async fn next(&mut self) -> Option<NetworkStatus> {
        None
    }
}

#[async_trait]
impl NetworkMonitor for StaticMonitor {
    async fn current_status(&self) -> BridgeResult<NetworkStatus> {
        Ok(if self.connected.load(Ordering::SeqCst) {
            NetworkStatus::Connected
        } else {
            NetworkStatus::Disconnected
        })
    }

    async fn subscribe_changes(&self) -> BridgeResult<Box<dyn NetworkChangeStream>> {
        Ok(Box::new(SilentChangeStream))
    }
}

struct RecordingControls;

#[async_trait]
impl PlayerControls for RecordingControls {
    async fn play(&self) -> BridgeResult<()> {
        Ok(())
    }
    async fn pause(&self) -> BridgeResult<()> {
        Ok(())
    }
    async fn seek(&self, _position: std::time::Duration) -> BridgeResult<()> {
        Ok(())
    }
    async fn set_rate(&self, _rate: f32) -> BridgeResult<()> {
        Ok(())
    }
    async fn set_looping(&self, _looping: bool) -> BridgeResult<()> {
        Ok(())
    }
    async fn remove(&self) -> BridgeResult<()> {
        Ok(())
    }
}

struct IdleEventStream {
    _sender: mpsc::UnboundedSender<PlayerStatus>,
    receiver: mpsc::UnboundedReceiver<PlayerStatus>,
}

#[async_trait]
impl PlayerEventStream for IdleEventStream {
    async fn next(&mut self) -> Option<PlayerStatus> {
        self.receiver.recv().await
    }
}

#[derive(Default)]
struct CapturingBackend {
    sources: Mutex<Vec<MediaSource>>,
}

#[async_trait]
impl PlayerBackend for CapturingBackend {
    async fn create(&self, source: MediaSource) -> BridgeResult<PlayerHandle> {
        self.sources.lock().push(source);
        let (sender, receiver) = mpsc::unbounded_channel();
        Ok(PlayerHandle {
            controls: Arc::new(RecordingControls),
            events: Box::new(IdleEventStream {
                _sender: sender,
                receiver,
            }),
        })
    }
}

struct FixedClock;

impl Clock for FixedClock {
    fn now(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(1_700_000_000, 0).unwrap()
    }
}

// ============================================================================
// Helpers
// ============================================================================

async fn service(connected: bool) -> (CoreService, Arc<CapturingBackend>) {
    let fs = Arc::new(MemoryFs::default());
    let backend = Arc::new(CapturingBackend::default());

    let deps = CoreDependencies::new(
        Arc::new(MockHttp { fs: fs.clone() }),
        fs,
        Arc::new(MemoryKv::default()),
        Arc::new(StaticMonitor {
            connected: AtomicBool::new(connected),
        }),
        backend.clone(),
        Arc::new(FixedClock),
    );

    let service = CoreService::new(deps, CoreConfig::default()).await.unwrap();
    (service, backend)
}

fn track(id: &str) -> TrackRef {
    TrackRef::new(
        id,
        format!("https://cdn.example.com/hi/{id}.flac"),
        format!("https://cdn.example.com/lo/{id}.mp3"),
    )
}

// ============================================================================
// Tests
// ============================================================================

#[tokio::test]
async fn offline_and_not_downloaded_refuses_playback() {
    let (service, backend) = service(false).await;
    let track_a = track("xc-1");

    let err = service.play(track_a).await.unwrap_err();
    assert!(matches!(err, CoreError::SourceUnavailable(_)));

    // The engine was never touched.
    assert!(backend.sources.lock().is_empty());
    assert_eq!(service.playback_state().phase, PlaybackPhase::Idle);
}

#[tokio::test]
async fn connected_playback_streams_the_remote_asset() {
    let (service, backend) = service(true).await;
    let track_a = track("xc-1");

    service.play(track_a.clone()).await.unwrap();

    assert_eq!(
        backend.sources.lock().as_slice(),
        &[MediaSource::RemoteStream {
            url: track_a.stream_url.clone()
        }]
    );
    assert_eq!(service.playback_state().track_id(), Some(&track_a.id));
}

#[tokio::test]
async fn downloaded_asset_plays_locally_even_offline() {
    let (service, backend) = service(false).await;
    let track_a = track("xc-1");

    service.download(&track_a).await.unwrap();
    assert!(service.is_downloaded(&track_a.id));
    let path = service.download_path(&track_a.id).unwrap();

    service.play(track_a.clone()).await.unwrap();

    assert_eq!(
        backend.sources.lock().as_slice(),
        &[MediaSource::LocalFile { path }]
    );
}

#[tokio::test]
async fn downloaded_asset_wins_over_the_network() {
    let (service, backend) = service(true).await;
    let track_a = track("xc-1");

    service.download(&track_a).await.unwrap();
    service.play(track_a.clone()).await.unwrap();

    assert!(matches!(
        backend.sources.lock()[0],
        MediaSource::LocalFile { .. }
    ));
}

#[tokio::test]
async fn sign_out_clears_the_library() {
    let (service, _backend) = service(true).await;

    for id in ["xc-1", "xc-2"] {
        service.download(&track(id)).await.unwrap();
    }
    assert_eq!(service.list_downloads().await.unwrap().len(), 2);

    service.clear_downloads().await.unwrap();
    service.set_user(None).await.unwrap();

    assert_eq!(service.list_downloads().await.unwrap().len(), 0);
    assert_eq!(service.storage_usage().await.unwrap(), 0);

    service.shutdown().await;
}
