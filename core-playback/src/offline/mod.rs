//! # Offline Asset Module
//!
//! Downloads remote recordings for playback without network access and
//! keeps the per-user download index that is the authoritative answer to
//! "is this available offline".
//!
//! ## Architecture
//!
//! ```text
//! ┌────────────────────────────────────────┐
//! │     OfflineAssetManager                │
//! │  - download()                          │
//! │  - delete() / clear_all()              │
//! │  - is_downloaded() / path_for()        │
//! │  - list_all() / storage_usage()        │
//! └────────┬───────────────────────────────┘
//!          │
//!          ├──> KeyValueStore   (records + index)
//!          ├──> FileSystemAccess (payload files)
//!          ├──> HttpClient       (asset fetch, catalogue metadata)
//!          └──> Clock            (download timestamps)
//! ```
//!
//! All keys and the payload directory are namespaced per authenticated
//! user (or an `anonymous` bucket pre-authentication); switching users
//! never leaks or merges storage between namespaces.

pub mod config;
pub mod manager;
pub mod progress;

// Re-export commonly used types
pub use config::DownloadConfig;
pub use manager::OfflineAssetManager;
pub use progress::{DownloadProgress, DownloadStatus};

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

use crate::model::RecordingId;

/// Storage namespace: an authenticated user id or the anonymous bucket.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Namespace(Option<String>);

impl Namespace {
    /// The pre-authentication bucket.
    pub fn anonymous() -> Self {
        Self(None)
    }

    /// Namespace for an authenticated user.
    pub fn user(id: impl Into<String>) -> Self {
        Self(Some(id.into()))
    }

    pub fn from_user(user: Option<String>) -> Self {
        Self(user)
    }

    /// The component embedded into storage keys and directory names.
    pub fn as_key_component(&self) -> &str {
        self.0.as_deref().unwrap_or("anonymous")
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_key_component())
    }
}

/// Persisted record of a completed download.
///
/// Immutable once written except on deletion. The metadata fields are a
/// snapshot taken at download time so the offline library renders without
/// a catalogue round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DownloadRecord {
    pub recording_id: RecordingId,
    pub file_path: PathBuf,
    pub title: Option<String>,
    pub species: Option<String>,
    pub caption: Option<String>,
    /// Unix timestamp (seconds) of download completion.
    pub downloaded_at: i64,
    pub size_bytes: u64,
}

/// Key of a download record for `id` in `namespace`.
pub(crate) fn record_key(namespace: &Namespace, id: &RecordingId) -> String {
    format!("download_{}_{}", namespace.as_key_component(), id)
}

/// Key of the download index for `namespace`.
pub(crate) fn index_key(namespace: &Namespace) -> String {
    format!("downloads_list_{}", namespace.as_key_component())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_key_components() {
        assert_eq!(Namespace::anonymous().as_key_component(), "anonymous");
        assert_eq!(Namespace::user("alice").as_key_component(), "alice");
        assert_eq!(Namespace::from_user(None), Namespace::anonymous());
    }

    #[test]
    fn key_naming_matches_storage_contract() {
        let ns = Namespace::user("alice");
        let id = RecordingId::new("xc-1042");

        assert_eq!(record_key(&ns, &id), "download_alice_xc-1042");
        assert_eq!(index_key(&ns), "downloads_list_alice");
        assert_eq!(
            record_key(&Namespace::anonymous(), &id),
            "download_anonymous_xc-1042"
        );
    }

    #[test]
    fn download_record_serde_round_trip() {
        let record = DownloadRecord {
            recording_id: RecordingId::new("xc-9"),
            file_path: PathBuf::from("/data/downloads/anonymous/audio_xc-9.mp3"),
            title: Some("Dawn song".to_string()),
            species: Some("Erithacus rubecula".to_string()),
            caption: None,
            downloaded_at: 1_700_000_000,
            size_bytes: 2_048,
        };

        let json = serde_json::to_vec(&record).unwrap();
        let back: DownloadRecord = serde_json::from_slice(&json).unwrap();
        assert_eq!(back, record);
    }
}
