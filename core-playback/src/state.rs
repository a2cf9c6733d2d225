//! Playback state model.
//!
//! A single [`PlaybackSnapshot`] is the source of truth for everything a
//! listener can observe about the engine. Mutations always flow through
//! the engine so snapshots stay internally consistent.

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::model::{RecordingId, TrackRef};

/// The playback state machine's current mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackPhase {
    #[default]
    Idle,
    Loading,
    Playing,
    Paused,
}

/// Supported playback rates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PlaybackSpeed {
    Half,
    #[default]
    Normal,
    OneAndHalf,
    Double,
}

impl PlaybackSpeed {
    /// Rate multiplier handed to the player resource.
    pub fn rate(&self) -> f32 {
        match self {
            PlaybackSpeed::Half => 0.5,
            PlaybackSpeed::Normal => 1.0,
            PlaybackSpeed::OneAndHalf => 1.5,
            PlaybackSpeed::Double => 2.0,
        }
    }
}

/// Category of an engine fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FaultKind {
    /// Platform audio session could not be initialized.
    Setup,
    /// Source could not be loaded or timed out while loading.
    Load,
    /// The live player pipeline reported a failure.
    Playback,
}

/// Fault surfaced to listeners through the snapshot.
///
/// Faults are reported, not retried; recovery is a fresh `load_and_play`
/// issued by the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineFault {
    pub kind: FaultKind,
    pub message: String,
}

impl EngineFault {
    pub fn new(kind: FaultKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Full snapshot of the playback state.
///
/// Listeners always receive the whole snapshot rather than diffs; the
/// payload is small and update frequency is bounded by the player's
/// status tick rate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlaybackSnapshot {
    /// The current track, if one is loaded.
    pub track: Option<TrackRef>,
    pub phase: PlaybackPhase,
    pub position: Duration,
    pub duration: Duration,
    pub speed: PlaybackSpeed,
    pub looping: bool,
    pub fault: Option<EngineFault>,
}

impl PlaybackSnapshot {
    /// The initial idle snapshot.
    pub fn idle() -> Self {
        Self {
            track: None,
            phase: PlaybackPhase::Idle,
            position: Duration::ZERO,
            duration: Duration::ZERO,
            speed: PlaybackSpeed::default(),
            looping: false,
            fault: None,
        }
    }

    /// Snapshot for a track that just entered the loading phase.
    ///
    /// Position, speed and looping are reset; a stale fault from a
    /// previous load is cleared.
    pub fn loading(track: TrackRef) -> Self {
        Self {
            track: Some(track),
            phase: PlaybackPhase::Loading,
            ..Self::idle()
        }
    }

    /// Identifier of the current track, when one is loaded.
    pub fn track_id(&self) -> Option<&RecordingId> {
        self.track.as_ref().map(|t| &t.id)
    }

    /// Whether this snapshot equals the initial idle state (no track, no
    /// fault, zeroed playhead).
    pub fn is_initial(&self) -> bool {
        *self == Self::idle()
    }
}

impl Default for PlaybackSnapshot {
    fn default() -> Self {
        Self::idle()
    }
}
