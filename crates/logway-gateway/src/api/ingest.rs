/// Log submission ingress.
///
/// `POST /logs` accepts either an envelope (`{id?, agentId, messages}`)
/// or a bare array of messages; bare strings are lifted to INFO. A
/// packet is counted as received once it passes validation, whether or
/// not the queue accepts it, so the receive/process/drop accounting
/// stays closed.

use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use serde_json::json;
use tracing::debug;

use logway_protocol::message::LogSubmission;

use crate::queue::{EnqueueError, QueuedPacket};
use crate::state::AppState;

pub async fn submit_logs(State(state): State<AppState>, body: String) -> Response {
    let submission: LogSubmission = match serde_json::from_str(&body) {
        Ok(submission) => submission,
        Err(err) => {
            debug!(error = %err, "Rejected malformed submission");
            return invalid_packet(None);
        }
    };

    let packet_id = submission
        .packet_id()
        .map(str::to_string)
        .unwrap_or_else(|| state.next_packet_id());
    let agent_id = submission.agent_id().map(str::to_string);

    let mut messages = submission.into_messages();
    if messages.is_empty() {
        return invalid_packet(Some(&packet_id));
    }
    for message in &mut messages {
        if let Err(err) = message.validate() {
            debug!(packet = %packet_id, error = %err, "Rejected invalid message");
            return invalid_packet(Some(&packet_id));
        }
        message.fill_timestamp();
    }

    let message_count = messages.len();
    state.inner.metrics.record_received();

    let packet = QueuedPacket {
        packet_id: packet_id.clone(),
        agent_id,
        messages,
        enqueued_at: Instant::now(),
    };

    match state.inner.queue.try_enqueue(packet) {
        Ok(()) => (
            StatusCode::OK,
            Json(json!({
                "success": true,
                "packetId": packet_id,
                "messageCount": message_count,
                "timestamp": Utc::now(),
            })),
        )
            .into_response(),
        Err(EnqueueError::QueueFull) => {
            state.inner.metrics.record_dropped(1);
            (
                StatusCode::TOO_MANY_REQUESTS,
                Json(json!({
                    "error": "Service temporarily unavailable",
                    "message": "Queue full, retry later",
                })),
            )
                .into_response()
        }
        Err(EnqueueError::Closed) => {
            state.inner.metrics.record_dropped(1);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "error": "Service temporarily unavailable",
                    "message": "Gateway is shutting down",
                })),
            )
                .into_response()
        }
    }
}

fn invalid_packet(packet_id: Option<&str>) -> Response {
    let mut body = json!({ "error": "Invalid log packet" });
    if let Some(id) = packet_id {
        body["packetId"] = json!(id);
    }
    (StatusCode::BAD_REQUEST, Json(body)).into_response()
}
