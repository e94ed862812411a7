//! Message submission endpoint.

use axum::{extract::State, http::StatusCode, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{AppError, Result};
use crate::queue::SendOutcome;
use crate::server::AppState;

/// Request to send a telemetry message
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    /// Routing label (topic suffix)
    pub label: String,
    /// Message body. A JSON string is sent verbatim; anything else is
    /// serialized as JSON.
    pub payload: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct SendMessageResponse {
    /// `delivered` or `queued`
    pub outcome: String,
    /// Queue entry id when the message was queued
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// POST /api/v1/messages
///
/// 200 when published immediately, 202 when queued, 503 when neither.
pub async fn send_message(
    State(state): State<AppState>,
    Json(request): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<SendMessageResponse>)> {
    if request.label.trim().is_empty() {
        return Err(AppError::Validation("label must not be empty".to_string()));
    }

    let payload = match request.payload {
        serde_json::Value::String(text) => text,
        other => other.to_string(),
    };

    let outcome = state.queue.send(&request.label, &payload).await;
    tracing::debug!(label = %request.label, outcome = outcome.as_str(), "Message submitted over HTTP");

    let (status, id) = match outcome {
        SendOutcome::DeliveredNow => (StatusCode::OK, None),
        SendOutcome::Queued(id) => (StatusCode::ACCEPTED, Some(id.to_string())),
        SendOutcome::Failed => {
            return Err(AppError::Unavailable(
                "message could not be delivered or queued".to_string(),
            ))
        }
    };

    Ok((
        status,
        Json(SendMessageResponse {
            outcome: if id.is_some() { "queued" } else { "delivered" }.to_string(),
            id,
            timestamp: Utc::now(),
        }),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::server::test_state;
    use crate::transport::{CloudType, TransportEvent};

    fn request(label: &str, payload: serde_json::Value) -> Json<SendMessageRequest> {
        Json(SendMessageRequest {
            label: label.to_string(),
            payload,
        })
    }

    #[tokio::test]
    async fn test_offline_message_is_accepted_and_queued() {
        let state = test_state();

        let (status, Json(body)) = send_message(
            State(state.clone()),
            request("sensors", serde_json::json!({"t": 21})),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::ACCEPTED);
        assert_eq!(body.outcome, "queued");
        assert!(body.id.is_some());
        assert_eq!(state.queue.depth().await, 1);
    }

    #[tokio::test]
    async fn test_online_message_is_delivered() {
        let state = test_state();
        state
            .queue
            .handle_event(TransportEvent::Connected(CloudType::Memory));

        let (status, Json(body)) = send_message(
            State(state.clone()),
            request("sensors", serde_json::json!("raw text")),
        )
        .await
        .unwrap();

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.outcome, "delivered");
        assert!(body.id.is_none());
    }

    #[tokio::test]
    async fn test_empty_label_is_rejected() {
        let result = send_message(State(test_state()), request(" ", serde_json::json!(1))).await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }
}
