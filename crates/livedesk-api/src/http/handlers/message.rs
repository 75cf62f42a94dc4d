//! Message HTTP handlers: send and watermark polling.
//!
//! Endpoints:
//! - POST /api/v1/sessions/{id}/messages - Append a message
//! - GET  /api/v1/sessions/{id}/messages - Fetch messages after a watermark
//!
//! The GET contract is the polling protocol: callers pass the highest
//! message id they have seen (`since_id`, default 0) and receive everything
//! newer in ascending id order. An empty list is the normal caught-up case.
//! With `wait=true` the handler long-polls, re-checking at the configured
//! poll interval until something arrives or `long_poll_timeout_seconds`
//! elapses, then returns the empty list.
//!
//! Both endpoints require the caller to be a participant in the session
//! (its customer, its assigned staff member, or a `manage_chats` holder);
//! the participant role also determines a sent message's sender side.

use std::time::{Duration, Instant};

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::Deserialize;
use uuid::Uuid;

use livedesk_core::settings::load_chat_settings;
use livedesk_types::chat::ChatMessage;

use crate::http::error::AppError;
use crate::http::extractors::auth::AuthenticatedUser;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Request body for sending a message. The sender side is derived from the
/// caller's role in the session, never asserted by the client.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    pub body: String,
}

/// Query parameters for message polling.
#[derive(Debug, Deserialize, Default)]
pub struct MessagePollQuery {
    /// Highest message id the caller has already seen.
    #[serde(default)]
    pub since_id: i64,
    /// Hold the request open until new messages arrive or the timeout hits.
    #[serde(default)]
    pub wait: bool,
}

fn parse_uuid(s: &str) -> Result<Uuid, AppError> {
    s.parse::<Uuid>()
        .map_err(|_| AppError::Validation(format!("Invalid UUID: {s}")))
}

/// POST /api/v1/sessions/{id}/messages - Append a message to an open session.
pub async fn send_message(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(session_id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<Json<ApiResponse<ChatMessage>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let sid = parse_uuid(&session_id)?;
    let (_, sender_type) = state.lifecycle.participant_role(&sid, &user.id).await?;
    let message = state
        .lifecycle
        .post_message(&sid, sender_type, &user.id, &body.body)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(message, request_id, elapsed)
        .with_link("session", &format!("/api/v1/sessions/{sid}"));

    Ok(Json(resp))
}

/// GET /api/v1/sessions/{id}/messages?since_id=N[&wait=true] - Poll for new
/// messages past the caller's watermark.
pub async fn poll_messages(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(session_id): Path<String>,
    Query(query): Query<MessagePollQuery>,
) -> Result<Json<ApiResponse<Vec<ChatMessage>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let sid = parse_uuid(&session_id)?;
    if query.since_id < 0 {
        return Err(AppError::Validation(
            "since_id must be non-negative".to_string(),
        ));
    }

    // The message stream follows the same access contract as session detail.
    state.lifecycle.participant_role(&sid, &user.id).await?;

    let mut messages = state.lifecycle.fetch_since(&sid, query.since_id).await?;

    if messages.is_empty() && query.wait {
        let settings = load_chat_settings(&state.params).await.map_err(|e| {
            AppError::Internal(format!("Failed to load chat settings: {e}"))
        })?;
        let deadline = start + Duration::from_secs(settings.long_poll_timeout_seconds);
        let interval = Duration::from_secs(settings.poll_interval_seconds);

        while messages.is_empty() {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                // Timed out without news: the empty list is the answer.
                break;
            }
            tokio::time::sleep(remaining.min(interval)).await;
            messages = state.lifecycle.fetch_since(&sid, query.since_id).await?;
        }
    }

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(messages, request_id, elapsed)
        .with_link("session", &format!("/api/v1/sessions/{sid}"));

    Ok(Json(resp))
}
