use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Which kinds of track to capture
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConstraints {
    pub video: bool,
    pub audio: bool,
}

impl Default for MediaConstraints {
    fn default() -> Self {
        Self {
            video: true,
            audio: true,
        }
    }
}

impl MediaConstraints {
    pub fn audio_only() -> Self {
        Self {
            video: false,
            audio: true,
        }
    }

    pub fn video_only() -> Self {
        Self {
            video: true,
            audio: false,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.video && !self.audio
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TrackKind {
    Audio,
    Video,
}

impl fmt::Display for TrackKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackKind::Audio => write!(f, "audio"),
            TrackKind::Video => write!(f, "video"),
        }
    }
}

/// One captured track
///
/// Clones share the live flag, so stopping any clone stops the track.
#[derive(Debug, Clone)]
pub struct MediaTrack {
    id: String,
    kind: TrackKind,
    live: Arc<AtomicBool>,
}

impl MediaTrack {
    pub fn new(id: impl Into<String>, kind: TrackKind) -> Self {
        Self {
            id: id.into(),
            kind,
            live: Arc::new(AtomicBool::new(true)),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn kind(&self) -> TrackKind {
        self.kind
    }

    pub fn is_live(&self) -> bool {
        self.live.load(Ordering::SeqCst)
    }

    /// Stop the track; returns true only for the call that actually stopped it
    pub fn stop(&self) -> bool {
        self.live.swap(false, Ordering::SeqCst)
    }
}

/// Local media owned by the session controller and lent to the negotiator
#[derive(Debug, Clone)]
pub struct MediaStream {
    id: String,
    tracks: Vec<MediaTrack>,
}

impl MediaStream {
    pub fn new(id: impl Into<String>, tracks: Vec<MediaTrack>) -> Self {
        Self {
            id: id.into(),
            tracks,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    pub fn has_kind(&self, kind: TrackKind) -> bool {
        self.tracks.iter().any(|t| t.kind() == kind)
    }

    /// Stop every track, returning how many actually transitioned
    pub fn stop_all(&self) -> usize {
        self.tracks.iter().filter(|t| t.stop()).count()
    }

    pub fn is_live(&self) -> bool {
        self.tracks.iter().any(MediaTrack::is_live)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_track_stop_is_idempotent() {
        let track = MediaTrack::new("t1", TrackKind::Audio);
        assert!(track.is_live());
        assert!(track.stop());
        assert!(!track.stop());
        assert!(!track.is_live());
    }

    #[test]
    fn test_clones_share_liveness() {
        let track = MediaTrack::new("t1", TrackKind::Video);
        let lent = track.clone();
        assert!(lent.stop());
        assert!(!track.is_live());
        assert!(!track.stop());
    }

    #[test]
    fn test_stream_stop_all_counts_transitions() {
        let stream = MediaStream::new(
            "s",
            vec![
                MediaTrack::new("a", TrackKind::Audio),
                MediaTrack::new("v", TrackKind::Video),
            ],
        );
        stream.tracks()[0].stop();

        assert_eq!(stream.stop_all(), 1);
        assert_eq!(stream.stop_all(), 0);
        assert!(!stream.is_live());
    }

    #[test]
    fn test_constraints() {
        assert!(!MediaConstraints::default().is_empty());
        assert!(MediaConstraints::audio_only().audio);
        assert!(!MediaConstraints::video_only().audio);
        assert!(MediaConstraints {
            video: false,
            audio: false
        }
        .is_empty());
    }
}
