//! # Playback Error Types
//!
//! Error types for playback and offline download operations. None of
//! these cross the public API as panics; every operation returns a
//! `Result` and engine-level faults are additionally mirrored into the
//! playback snapshot for listeners.

use thiserror::Error;

/// Errors that can occur during playback and download operations.
#[derive(Error, Debug)]
pub enum PlaybackError {
    /// Platform audio session could not be initialized. Fatal to all
    /// subsequent playback until a fresh load succeeds.
    #[error("Audio session setup failed: {0}")]
    SetupFailed(String),

    /// Media source could not be loaded (bad URI, unreachable host,
    /// decode failure).
    #[error("Failed to load media source: {0}")]
    LoadFailed(String),

    /// The player resource rejected a play/pause/seek call.
    #[error("Playback control rejected: {0}")]
    ControlFailed(String),

    /// Attempted operation when no track is loaded.
    #[error("No track loaded")]
    NoTrackLoaded,

    /// `pause` is only valid while playing.
    #[error("Player is not playing")]
    NotPlaying,

    /// Seeking is unavailable until the load settles.
    #[error("Player is still loading")]
    StillLoading,

    /// Network fetch or file write failed while downloading an asset.
    #[error("Download failed: {0}")]
    DownloadFailed(String),

    /// Key-value or file system operation failed.
    #[error("Storage operation failed: {0}")]
    StorageFailed(String),

    /// Configuration rejected at construction time.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl PlaybackError {
    /// Returns `true` if reissuing the failed command can succeed.
    ///
    /// Setup faults need the platform audio session repaired first; every
    /// other fault is retried with a fresh call.
    pub fn is_recoverable(&self) -> bool {
        !matches!(self, PlaybackError::SetupFailed(_))
    }
}

/// Result type for playback operations.
pub type Result<T> = std::result::Result<T, PlaybackError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn setup_faults_are_not_recoverable() {
        assert!(!PlaybackError::SetupFailed("no audio device".into()).is_recoverable());
        assert!(PlaybackError::LoadFailed("bad uri".into()).is_recoverable());
        assert!(PlaybackError::DownloadFailed("timeout".into()).is_recoverable());
    }
}
