//! Gas ingestion, status, and live subscription routes.

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use domo_core::Snapshot;
use metrics::counter;
use serde::Deserialize;
use tracing::warn;

use super::Envelope;
use crate::errors::ApiError;
use crate::metrics::WS_CAPACITY_REJECTIONS_TOTAL;
use crate::server::AppState;
use crate::websocket::session::run_subscriber_session;

/// `POST /data` body. `value` must be a JSON integer.
#[derive(Debug, Deserialize)]
pub struct IngestRequest {
    /// Raw sensor value.
    pub value: i64,
}

/// GET /
pub async fn root(State(state): State<AppState>) -> Json<Envelope<Snapshot>> {
    Json(Envelope::new(state.monitor.current(), "Domo hub API"))
}

/// POST /data
pub async fn ingest(
    State(state): State<AppState>,
    body: Result<Json<IngestRequest>, JsonRejection>,
) -> Result<Json<Envelope<Snapshot>>, ApiError> {
    let Json(request) = body.inspect_err(|e| warn!(error = %e.body_text(), "rejected gas reading"))?;
    let outcome = state.monitor.ingest(request.value);
    Ok(Json(Envelope::new(outcome.snapshot, outcome.tier.as_str())))
}

/// GET /data
pub async fn current(State(state): State<AppState>) -> Json<Envelope<Snapshot>> {
    let snapshot = state.monitor.current();
    Json(Envelope::new(snapshot, snapshot.tier().as_str()))
}

/// GET /ws/gas
///
/// Refuses with 503 before upgrading when the subscriber set is full. A race
/// past this check is caught at registration and closes the socket with
/// code 1013.
pub async fn live(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    if let Err(e) = state.monitor.broadcaster().ensure_capacity() {
        counter!(WS_CAPACITY_REJECTIONS_TOTAL).increment(1);
        return ApiError::from(e).into_response();
    }

    let monitor = state.monitor.clone();
    let session = state.session;
    let shutdown = state.shutdown.clone();
    ws.max_message_size(state.max_message_size).on_upgrade(move |socket| {
        let token = shutdown.token();
        shutdown.track_session(run_subscriber_session(socket, monitor, session, token))
    })
}
