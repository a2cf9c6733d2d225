//! Transient download progress tracking.
//!
//! Progress entries live only in memory and are lost on process restart;
//! completion is always re-derived from the persisted download index,
//! never from here.

use serde::{Deserialize, Serialize};

use crate::model::RecordingId;

/// Lifecycle of a single download attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum DownloadStatus {
    #[default]
    Idle,
    Downloading,
    Completed,
    /// Terminal for this attempt; a retry is a fresh `download` call.
    Error,
}

/// Progress of a single download attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadProgress {
    pub recording_id: RecordingId,
    pub status: DownloadStatus,
    /// Completed fraction in `0.0..=1.0`.
    pub fraction: f32,
    /// Failure message when `status` is `Error`.
    pub error: Option<String>,
}

impl DownloadProgress {
    /// A fresh attempt that just started fetching.
    pub fn started(recording_id: RecordingId) -> Self {
        Self {
            recording_id,
            status: DownloadStatus::Downloading,
            fraction: 0.0,
            error: None,
        }
    }

    /// A successfully finished attempt.
    pub fn completed(recording_id: RecordingId) -> Self {
        Self {
            recording_id,
            status: DownloadStatus::Completed,
            fraction: 1.0,
            error: None,
        }
    }

    /// A failed attempt carrying the underlying fault.
    pub fn failed(recording_id: RecordingId, message: impl Into<String>) -> Self {
        Self {
            recording_id,
            status: DownloadStatus::Error,
            fraction: 0.0,
            error: Some(message.into()),
        }
    }

    /// Whether the attempt is still running.
    pub fn is_active(&self) -> bool {
        self.status == DownloadStatus::Downloading
    }

    /// Whether the attempt reached a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(self.status, DownloadStatus::Completed | DownloadStatus::Error)
    }
}
