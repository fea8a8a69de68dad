//! HTTP API handlers
//!
//! Three endpoints: a health check, a one-shot JSON snapshot for clients
//! that poll, and the SSE stream displays actually live on.

use axum::{
    extract::State,
    response::sse::{Event, Sse},
    routing::get,
    Json, Router,
};
use futures::stream::Stream;
use serde::Serialize;
use std::convert::Infallible;
use std::time::Instant;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use crate::broadcaster::{SharedBroadcaster, StateEvent};
use crate::track::CanonicalTrack;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub broadcaster: SharedBroadcaster,
    pub device_host: String,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(broadcaster: SharedBroadcaster, device_host: String) -> Self {
        Self {
            broadcaster,
            device_host,
            started_at: Instant::now(),
        }
    }
}

/// General status response
#[derive(Serialize)]
pub struct StatusResponse {
    pub service: &'static str,
    pub version: &'static str,
    pub uptime_secs: u64,
    pub device_host: String,
    pub subscribers: usize,
}

/// Envelope for state/update event payloads. `current_track: null` means
/// nothing playing.
#[derive(Serialize)]
pub struct StatePayload {
    pub current_track: Option<CanonicalTrack>,
}

pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/status", get(status_handler))
        .route("/api/state", get(state_handler))
        .route("/api/stream", get(stream_handler))
        .with_state(state)
}

/// GET /status - Service health check
pub async fn status_handler(State(state): State<AppState>) -> Json<StatusResponse> {
    Json(StatusResponse {
        service: "album-art-display",
        version: env!("CARGO_PKG_VERSION"),
        uptime_secs: state.started_at.elapsed().as_secs(),
        device_host: state.device_host.clone(),
        subscribers: state.broadcaster.subscriber_count(),
    })
}

/// GET /api/state - One-shot snapshot of the current track
pub async fn state_handler(State(state): State<AppState>) -> Json<StatePayload> {
    Json(StatePayload {
        current_track: state.broadcaster.current().await,
    })
}

/// GET /api/stream - Server-Sent Events stream
///
/// Event order per connection: one `state` event with the snapshot taken
/// at subscribe time, then `update` events for every published change and
/// `ping` keepalives. The snapshot and the receiver come from the same
/// lock acquisition, so no update published around connect time is
/// skipped or double-seen.
pub async fn stream_handler(
    State(state): State<AppState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    let (snapshot, mut rx) = state.broadcaster.subscribe().await;
    debug!(subscribers = state.broadcaster.subscriber_count(), "sse client connected");

    let stream = async_stream::stream! {
        let payload = StatePayload { current_track: snapshot };
        if let Ok(json) = serde_json::to_string(&payload) {
            yield Ok::<Event, Infallible>(Event::default().event("state").data(json));
        }

        loop {
            match rx.recv().await {
                Ok(StateEvent::Update(track)) => {
                    let payload = StatePayload { current_track: track };
                    match serde_json::to_string(&payload) {
                        Ok(json) => yield Ok(Event::default().event("update").data(json)),
                        Err(_) => continue,
                    }
                }
                Ok(StateEvent::Ping) => {
                    yield Ok(Event::default().event("ping").data(""));
                }
                // Dropped events only mean this client missed intermediate
                // states; the next update carries the full snapshot anyway.
                Err(RecvError::Lagged(_)) => continue,
                Err(RecvError::Closed) => break,
            }
        }
    };

    Sse::new(stream)
}
