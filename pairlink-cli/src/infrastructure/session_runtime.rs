use crate::infrastructure::error::{CliError, Result};
use pairlink_core::SessionStatus;
use pairlink_p2p::{EngineFactory, MediaSource, Relay, SessionController, SessionEvent, SessionHandle};
use tokio::sync::{mpsc, watch};

/// Background task driving one [`SessionController`]
///
/// Status is published on a watch channel (latest always available) and
/// session events are forwarded in order.
pub struct SessionRuntime {
    handle: SessionHandle,
    status_rx: watch::Receiver<SessionStatus>,
    event_rx: mpsc::UnboundedReceiver<SessionEvent>,
    task_handle: tokio::task::JoinHandle<()>,
}

impl SessionRuntime {
    /// Start the session in the background
    pub fn spawn<R, M, F>(mut controller: SessionController<R, M, F>) -> Self
    where
        R: Relay + 'static,
        M: MediaSource + 'static,
        F: EngineFactory + 'static,
    {
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        controller.forward_events(event_tx);
        let status_rx = controller.watch_status();
        let handle = controller.handle();
        let spawned_at = handle.token();

        let task_handle = tokio::spawn(async move {
            if let Err(e) = controller.start().await {
                tracing::error!("❌ Session could not start: {}", e);
            }
            // A stop issued before the task ran
            if controller.status().is_live() && spawned_at.is_stale() {
                controller.stop().await;
            }

            controller.run().await;
        });

        Self {
            handle,
            status_rx,
            event_rx,
            task_handle,
        }
    }

    /// Latest status (never blocks)
    pub fn status(&self) -> SessionStatus {
        self.status_rx.borrow().clone()
    }

    /// Next event; `None` once the session task has finished and drained
    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.event_rx.recv().await
    }

    /// Every event already forwarded
    pub fn try_events(&mut self) -> Vec<SessionEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.event_rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Stop the session, wait for teardown, return the final status
    pub async fn stop(self) -> Result<SessionStatus> {
        self.handle.stop();
        self.task_handle
            .await
            .map_err(|e| CliError::Runtime(format!("session task ended abnormally: {}", e)))?;
        Ok(self.status_rx.borrow().clone())
    }
}
