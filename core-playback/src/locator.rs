//! Source selection policy.
//!
//! Pure decision function consulted before every play command: prefer a
//! local copy, fall back to the high-fidelity remote stream when
//! connected, and refuse otherwise so callers never hand the engine an
//! unreachable source.

use std::path::Path;

use bridge_traits::player::MediaSource;

use crate::model::TrackRef;

/// Pick a playable source for `track`.
///
/// `local_copy` is the downloaded payload path when the asset is present
/// in the download index. Returns `None` when the device is offline and
/// no local copy exists; the caller must not attempt playback in that
/// case.
pub fn resolve(
    track: &TrackRef,
    local_copy: Option<&Path>,
    is_connected: bool,
) -> Option<MediaSource> {
    if let Some(path) = local_copy {
        return Some(MediaSource::LocalFile {
            path: path.to_path_buf(),
        });
    }

    if is_connected {
        return Some(MediaSource::RemoteStream {
            url: track.stream_url.clone(),
        });
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn track() -> TrackRef {
        TrackRef::new("xc-42", "https://cdn.example.com/hi/42", "https://cdn.example.com/lo/42")
    }

    #[test]
    fn prefers_local_copy_when_downloaded() {
        let path = PathBuf::from("/data/downloads/anonymous/audio_xc-42.mp3");

        // A local copy wins regardless of connectivity
        for connected in [true, false] {
            let source = resolve(&track(), Some(&path), connected);
            assert_eq!(source, Some(MediaSource::LocalFile { path: path.clone() }));
        }
    }

    #[test]
    fn falls_back_to_remote_stream_when_connected() {
        let source = resolve(&track(), None, true);
        assert_eq!(
            source,
            Some(MediaSource::RemoteStream {
                url: "https://cdn.example.com/hi/42".to_string()
            })
        );
    }

    #[test]
    fn refuses_when_offline_and_not_downloaded() {
        assert_eq!(resolve(&track(), None, false), None);
    }
}
