use crate::domain::{MediaConstraints, MediaStream, MediaTrack, TrackKind};
use crate::infrastructure::error::{MediaError, MediaResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// Local capture device access
#[async_trait]
pub trait MediaSource: Send + Sync {
    async fn acquire(&self, constraints: MediaConstraints) -> MediaResult<MediaStream>;
}

/// Placeholder capture: one track per requested kind, no real device
///
/// Clones share their settings, so a test can flip access on and off while
/// a controller holds the source.
#[derive(Clone, Default)]
pub struct SyntheticMediaSource {
    denial: Arc<Mutex<Option<String>>>,
    delay: Option<Duration>,
    acquired: Arc<AtomicUsize>,
    issued: Arc<Mutex<Vec<MediaStream>>>,
}

impl SyntheticMediaSource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Source whose user refuses capture
    pub fn denied(reason: impl Into<String>) -> Self {
        let source = Self::default();
        source.deny(reason);
        source
    }

    /// Simulate a slow permission prompt
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn deny(&self, reason: impl Into<String>) {
        *self.denial.lock() = Some(reason.into());
    }

    pub fn allow(&self) {
        *self.denial.lock() = None;
    }

    /// Number of successful acquisitions
    pub fn acquisitions(&self) -> usize {
        self.acquired.load(Ordering::SeqCst)
    }

    /// Every stream handed out so far
    pub fn issued(&self) -> Vec<MediaStream> {
        self.issued.lock().clone()
    }

    /// Tracks still capturing across every issued stream
    pub fn live_tracks(&self) -> usize {
        self.issued
            .lock()
            .iter()
            .flat_map(|s| s.tracks().iter())
            .filter(|t| t.is_live())
            .count()
    }
}

#[async_trait]
impl MediaSource for SyntheticMediaSource {
    async fn acquire(&self, constraints: MediaConstraints) -> MediaResult<MediaStream> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if let Some(reason) = self.denial.lock().clone() {
            tracing::warn!("🚫 Media access denied: {}", reason);
            return Err(MediaError::Denied(reason));
        }
        if constraints.is_empty() {
            return Err(MediaError::Unavailable(
                "neither audio nor video requested".to_string(),
            ));
        }

        let stream_id = Uuid::new_v4().to_string();
        let mut tracks = Vec::new();
        if constraints.audio {
            tracks.push(MediaTrack::new(format!("{}-audio", stream_id), TrackKind::Audio));
        }
        if constraints.video {
            tracks.push(MediaTrack::new(format!("{}-video", stream_id), TrackKind::Video));
        }

        let stream = MediaStream::new(stream_id, tracks);
        self.acquired.fetch_add(1, Ordering::SeqCst);
        self.issued.lock().push(stream.clone());

        tracing::info!("🎥 Acquired local media ({} track(s))", stream.tracks().len());
        Ok(stream)
    }
}
