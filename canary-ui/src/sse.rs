//! Server-Sent Events stream of session changes.

use std::convert::Infallible;
use std::time::Duration;

use axum::extract::State;
use axum::response::sse::{Event, KeepAlive, Sse};
use canary::core::types::Phase;
use canary::io::client::TestRepository;
use futures::stream::Stream;
use serde::Serialize;
use tokio::sync::broadcast;
use tracing::warn;

use crate::state::{AppState, ChangeEvent};

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SsePayload {
    #[serde(rename = "type")]
    event_type: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    operation: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    phase: Option<Phase>,
    #[serde(skip_serializing_if = "Option::is_none")]
    in_flight: Option<bool>,
}

impl From<&ChangeEvent> for SsePayload {
    fn from(event: &ChangeEvent) -> Self {
        match event {
            ChangeEvent::RequestReceived { operation } => SsePayload {
                event_type: "request_received",
                operation: Some(*operation),
                phase: None,
                in_flight: None,
            },
            ChangeEvent::SessionChanged { phase, in_flight } => SsePayload {
                event_type: "session_changed",
                operation: None,
                phase: Some(*phase),
                in_flight: Some(*in_flight),
            },
        }
    }
}

/// SSE endpoint handler.
pub async fn events_handler<R: TestRepository + 'static>(
    State(state): State<AppState<R>>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let mut rx = state.event_tx.subscribe();

    let stream = async_stream::stream! {
        yield Ok(Event::default().event("connected").data("{}"));

        loop {
            match rx.recv().await {
                Ok(change_event) => {
                    let payload = SsePayload::from(&change_event);
                    if let Ok(json) = serde_json::to_string(&payload) {
                        yield Ok(Event::default().event("change").data(json));
                    }
                }
                Err(broadcast::error::RecvError::Lagged(n)) => {
                    warn!(skipped = n, "SSE client lagged, some events dropped");
                }
                Err(broadcast::error::RecvError::Closed) => {
                    break;
                }
            }
        }
    };

    Sse::new(stream).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}
