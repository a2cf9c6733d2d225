//! Catalogue-facing track types.
//!
//! The engine treats everything here except the identifier as opaque;
//! metadata is carried along so listeners can render without a second
//! catalogue lookup.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Stable identifier of a catalogue recording.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RecordingId(String);

impl RecordingId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for RecordingId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for RecordingId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for RecordingId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

/// Reference to a playable recording.
///
/// `stream_url` points at the high-fidelity remote asset used for online
/// playback; `download_url` points at the low-fidelity asset fetched for
/// offline use.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackRef {
    pub id: RecordingId,
    pub stream_url: String,
    pub download_url: String,
    pub title: Option<String>,
    pub species: Option<String>,
    pub caption: Option<String>,
}

impl TrackRef {
    /// Create a track reference with no display metadata.
    pub fn new(
        id: impl Into<RecordingId>,
        stream_url: impl Into<String>,
        download_url: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            stream_url: stream_url.into(),
            download_url: download_url.into(),
            title: None,
            species: None,
            caption: None,
        }
    }

    /// Attach a display title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Attach the recorded species name.
    pub fn with_species(mut self, species: impl Into<String>) -> Self {
        self.species = Some(species.into());
        self
    }

    /// Attach a caption.
    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn recording_id_round_trips_through_serde() {
        let id = RecordingId::new("xc-1042");
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"xc-1042\"");
        let back: RecordingId = serde_json::from_str(&json).unwrap();
        assert_eq!(back, id);
    }

    #[test]
    fn track_ref_builder() {
        let track = TrackRef::new("xc-7", "https://cdn/hi/7", "https://cdn/lo/7")
            .with_title("Evening chorus")
            .with_species("Turdus merula");

        assert_eq!(track.id.as_str(), "xc-7");
        assert_eq!(track.title.as_deref(), Some("Evening chorus"));
        assert_eq!(track.species.as_deref(), Some("Turdus merula"));
        assert!(track.caption.is_none());
    }
}
