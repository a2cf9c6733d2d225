//! Player resource contract and supporting media types.
//!
//! These abstractions allow the playback engine to drive platform media
//! pipelines (desktop audio stacks, mobile players, web audio) while
//! preserving a consistent, async-first API surface. Host applications
//! provide concrete implementations that satisfy their platform
//! constraints.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

use crate::error::Result;

/// Media source descriptor handed to the player backend.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum MediaSource {
    /// Local file accessible to the host runtime.
    LocalFile { path: PathBuf },
    /// Remote HTTP(S) stream to be fetched by the host.
    RemoteStream { url: String },
}

impl MediaSource {
    /// Determine whether the source represents remote content.
    pub fn is_remote(&self) -> bool {
        matches!(self, MediaSource::RemoteStream { .. })
    }
}

/// Status report delivered asynchronously by the player pipeline.
///
/// The engine folds each report into its playback snapshot; reports are
/// the only source of position/duration truth.
#[derive(Debug, Clone, PartialEq)]
pub struct PlayerStatus {
    /// Current playhead position.
    pub position: Duration,
    /// Total stream duration, when known.
    pub duration: Duration,
    /// Whether the pipeline is actively producing audio.
    pub is_playing: bool,
    /// Set once when the stream reaches its natural end.
    pub did_finish: bool,
    /// Pipeline fault, when one occurred.
    pub error: Option<String>,
}

impl PlayerStatus {
    /// A status report carrying only a playhead update.
    pub fn tick(position: Duration, duration: Duration, is_playing: bool) -> Self {
        Self {
            position,
            duration,
            is_playing,
            did_finish: false,
            error: None,
        }
    }

    /// A status report signalling natural end of stream.
    pub fn finished(duration: Duration) -> Self {
        Self {
            position: duration,
            duration,
            is_playing: false,
            did_finish: true,
            error: None,
        }
    }

    /// A status report carrying a pipeline fault.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            position: Duration::ZERO,
            duration: Duration::ZERO,
            is_playing: false,
            did_finish: false,
            error: Some(message.into()),
        }
    }
}

/// Handle to a freshly created player resource.
///
/// `controls` issues commands; `events` is the one-shot status stream the
/// engine pumps. The pair is bound to a single source; loading different
/// media means creating a new handle.
pub struct PlayerHandle {
    pub controls: std::sync::Arc<dyn PlayerControls>,
    pub events: Box<dyn PlayerEventStream>,
}

/// Factory for player resources.
///
/// Creating a handle may allocate native resources (audio session,
/// decoder threads, network fetch). Failing to initialize the platform
/// audio session should surface as
/// [`BridgeError::NotAvailable`](crate::error::BridgeError::NotAvailable)
/// so the core can distinguish setup faults from load faults.
#[async_trait]
pub trait PlayerBackend: Send + Sync {
    /// Provision a player bound to `source` and begin preparing it.
    async fn create(&self, source: MediaSource) -> Result<PlayerHandle>;
}

/// Command surface of a live player resource.
#[async_trait]
pub trait PlayerControls: Send + Sync {
    /// Begin or resume playback.
    async fn play(&self) -> Result<()>;

    /// Pause playback without releasing the resource.
    async fn pause(&self) -> Result<()>;

    /// Seek to an absolute position within the stream.
    async fn seek(&self, position: Duration) -> Result<()>;

    /// Adjust the playback rate (1.0 = normal speed).
    async fn set_rate(&self, rate: f32) -> Result<()>;

    /// Toggle automatic looping at end of stream.
    async fn set_looping(&self, looping: bool) -> Result<()>;

    /// Release the underlying resource. The paired event stream ends
    /// after this call.
    async fn remove(&self) -> Result<()>;
}

/// Asynchronous stream of player status reports.
#[async_trait]
pub trait PlayerEventStream: Send {
    /// Get the next status report
    ///
    /// Returns `None` when the resource has been removed.
    async fn next(&mut self) -> Option<PlayerStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_source_remote_detection() {
        let local = MediaSource::LocalFile {
            path: PathBuf::from("/tmp/audio_xc1.mp3"),
        };
        let remote = MediaSource::RemoteStream {
            url: "https://cdn.example.com/xc1.mp3".to_string(),
        };

        assert!(!local.is_remote());
        assert!(remote.is_remote());
    }

    #[test]
    fn player_status_constructors() {
        let tick = PlayerStatus::tick(Duration::from_secs(3), Duration::from_secs(60), true);
        assert!(tick.is_playing);
        assert!(!tick.did_finish);

        let done = PlayerStatus::finished(Duration::from_secs(60));
        assert!(done.did_finish);
        assert_eq!(done.position, done.duration);

        let failed = PlayerStatus::failed("decode error");
        assert_eq!(failed.error.as_deref(), Some("decode error"));
    }
}
