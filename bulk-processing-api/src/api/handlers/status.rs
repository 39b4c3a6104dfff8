use axum::{
    extract::{
        ws::{Message, WebSocket, WebSocketUpgrade},
        Path, Query, State,
    },
    response::Response,
    Json,
};
use bulk_processing_data::BatchStatus;
use bulk_processing_domain::services::ServiceError;
use serde::{Deserialize, Serialize};
use serde_json::json;
use thiserror::Error;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tracing::{error, info, instrument};
use utoipa::IntoParams;
use uuid::Uuid;

use crate::api::{ApiError, AppState};

/// Query string of the status stream
#[derive(Debug, Deserialize, IntoParams)]
pub struct StatusQuery {
    /// Batch to follow
    pub batch_id: Option<String>,
}

/// Current progress of a batch
#[utoipa::path(
    get,
    path = "/api/v1/hospital/batch/{batch_id}/status",
    params(
        ("batch_id" = Uuid, Path, description = "Batch identifier")
    ),
    responses(
        (status = 200, description = "Batch status", body = BatchStatus),
        (status = 404, description = "Batch not found", body = crate::entities::ErrorResponse)
    ),
    tag = "hospital"
)]
#[instrument(skip(state))]
pub async fn get_batch_status(
    State(state): State<AppState>,
    Path(batch_id): Path<Uuid>,
) -> Result<Json<BatchStatus>, ApiError> {
    state
        .service
        .get_batch_status(batch_id)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::NotFound("Batch not found".to_string()))
}

/// Stream the status of a batch over a WebSocket until it completes or fails
#[utoipa::path(
    get,
    path = "/api/v1/hospital/status",
    params(StatusQuery),
    responses(
        (status = 101, description = "Switching to the WebSocket status stream")
    ),
    tag = "hospital"
)]
pub async fn status_stream(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(query): Query<StatusQuery>,
) -> Response {
    ws.on_upgrade(move |socket| stream_batch_status(socket, state, query.batch_id))
}

#[derive(Debug, Error)]
enum StreamError {
    #[error("client disconnected")]
    Disconnected,

    #[error("{0}")]
    Internal(String),
}

impl From<ServiceError> for StreamError {
    fn from(error: ServiceError) -> Self {
        StreamError::Internal(error.to_string())
    }
}

async fn stream_batch_status(mut socket: WebSocket, state: AppState, batch_id: Option<String>) {
    match follow_batch(&mut socket, &state, batch_id.as_deref()).await {
        Ok(()) => {}
        Err(StreamError::Disconnected) => {
            info!(batch_id = batch_id.as_deref().unwrap_or_default(), "WebSocket disconnected");
        }
        Err(StreamError::Internal(message)) => {
            error!(error = %message, "Error in WebSocket");
            let _ = send_json(&mut socket, &json!({ "error": format!("Internal error: {}", message) })).await;
        }
    }

    let _ = socket.send(Message::Close(None)).await;
}

/// Send status updates until the batch reaches a terminal state
async fn follow_batch(socket: &mut WebSocket, state: &AppState, batch_id: Option<&str>) -> Result<(), StreamError> {
    let Some(raw_id) = batch_id.filter(|id| !id.is_empty()) else {
        return send_error(socket, "batch_id query parameter is required").await;
    };
    let Ok(batch_id) = Uuid::parse_str(raw_id) else {
        return send_error(socket, "Invalid batch_id format").await;
    };
    if state.service.get_batch_status(batch_id).await?.is_none() {
        return send_error(socket, "Batch not found").await;
    }

    let mut ticker = interval_at(Instant::now() + state.poll_interval, state.poll_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = ticker.tick() => {}
            incoming = socket.recv() => match incoming {
                Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return Err(StreamError::Disconnected),
                Some(Ok(_)) => continue,
            },
        }

        let Some(status) = state.service.get_batch_status(batch_id).await? else {
            return send_error(socket, "Batch status no longer available").await;
        };

        send_json(socket, &status).await?;
        if status.status.is_terminal() {
            return Ok(());
        }
    }
}

async fn send_error(socket: &mut WebSocket, message: &str) -> Result<(), StreamError> {
    send_json(socket, &json!({ "error": message })).await
}

async fn send_json<T: Serialize>(socket: &mut WebSocket, value: &T) -> Result<(), StreamError> {
    let text = serde_json::to_string(value).map_err(|e| StreamError::Internal(e.to_string()))?;
    socket
        .send(Message::Text(text))
        .await
        .map_err(|_| StreamError::Disconnected)
}
