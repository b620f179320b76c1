//! Shared application state for the UI server.

use std::sync::Arc;

use canary::controller::SessionController;
use canary::core::types::Phase;
use canary::io::client::TestRepository;
use tokio::sync::broadcast;

/// Events broadcast to SSE clients when the session changes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeEvent {
    /// A fetch or run request arrived; the session has not yet accepted it.
    RequestReceived { operation: &'static str },
    /// A mutator finished (applied, stale, failed or rejected).
    SessionChanged { phase: Phase, in_flight: bool },
}

/// Shared state accessible from all request handlers.
pub struct AppState<R> {
    /// The single session served by this process.
    pub controller: Arc<SessionController<R>>,
    /// Broadcast sender for session change events.
    pub event_tx: Arc<broadcast::Sender<ChangeEvent>>,
}

impl<R> Clone for AppState<R> {
    fn clone(&self) -> Self {
        Self {
            controller: Arc::clone(&self.controller),
            event_tx: Arc::clone(&self.event_tx),
        }
    }
}

impl<R: TestRepository> AppState<R> {
    pub fn new(controller: SessionController<R>) -> Self {
        let (event_tx, _) = broadcast::channel(64);
        Self {
            controller: Arc::new(controller),
            event_tx: Arc::new(event_tx),
        }
    }

    pub fn request_received(&self, operation: &'static str) {
        let _ = self.event_tx.send(ChangeEvent::RequestReceived { operation });
    }

    /// Broadcast the current phase to SSE clients.
    pub async fn publish(&self) {
        let view = self.controller.view().await;
        let _ = self.event_tx.send(ChangeEvent::SessionChanged {
            phase: view.phase,
            in_flight: view.in_flight,
        });
    }
}
