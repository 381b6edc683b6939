use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;

struct Liveness {
    generation: AtomicU64,
    stop: Notify,
}

/// Cloneable remote control for a running session
///
/// `stop()` moves the session generation forward. Anything the controller
/// was awaiting when that happened is discarded when it resolves.
#[derive(Clone)]
pub struct SessionHandle {
    inner: Arc<Liveness>,
}

impl Default for SessionHandle {
    fn default() -> Self {
        Self::new()
    }
}

impl SessionHandle {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Liveness {
                generation: AtomicU64::new(0),
                stop: Notify::new(),
            }),
        }
    }

    /// Request a stop from any task
    pub fn stop(&self) {
        let generation = self.inner.generation.fetch_add(1, Ordering::SeqCst) + 1;
        tracing::debug!("Stop requested (generation {})", generation);
        self.inner.stop.notify_one();
    }

    pub fn generation(&self) -> u64 {
        self.inner.generation.load(Ordering::SeqCst)
    }

    /// Token for the current run; stale after the next stop
    pub fn token(&self) -> RunToken {
        RunToken {
            handle: self.clone(),
            generation: self.generation(),
        }
    }

    /// Resolves after the next (or a pending) stop request
    pub async fn stopped(&self) {
        self.inner.stop.notified().await;
    }
}

impl std::fmt::Debug for SessionHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionHandle")
            .field("generation", &self.generation())
            .finish()
    }
}

/// One session run, as seen by whoever works on its behalf
#[derive(Debug, Clone)]
pub struct RunToken {
    handle: SessionHandle,
    generation: u64,
}

impl RunToken {
    pub fn is_stale(&self) -> bool {
        self.handle.generation() != self.generation
    }
}
