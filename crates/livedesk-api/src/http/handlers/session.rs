//! Session lifecycle HTTP handlers.
//!
//! Endpoints:
//! - POST /api/v1/sessions               - Open a session (caller is the customer)
//! - GET  /api/v1/sessions               - List sessions visible to the caller
//! - GET  /api/v1/sessions/{id}          - Get a single session
//! - POST /api/v1/sessions/{id}/claim    - Claim a waiting session
//! - POST /api/v1/sessions/{id}/close    - Close a session
//! - POST /api/v1/sessions/{id}/forward  - Forward the transcript explicitly

use std::time::Instant;

use axum::extract::{Path, Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use livedesk_core::chat::forward::ForwardDisposition;
use livedesk_core::chat::lifecycle::ClaimOutcome;
use livedesk_core::settings::load_chat_settings;
use livedesk_types::chat::{ChatSession, SessionStatus};

use crate::http::error::AppError;
use crate::http::extractors::auth::AuthenticatedUser;
use crate::http::response::ApiResponse;
use crate::state::AppState;

/// Request body for opening a session.
#[derive(Debug, Deserialize)]
pub struct CreateSessionRequest {
    pub account_id: Option<Uuid>,
    pub subject: Option<String>,
}

/// Query parameters for session listing.
#[derive(Debug, Deserialize, Default)]
pub struct SessionListQuery {
    /// Filter by status (waiting, active, closed).
    pub status: Option<String>,
}

/// Claim response: losers get `claimed: false` plus the winner's state.
#[derive(Debug, Serialize)]
pub struct ClaimResponse {
    pub claimed: bool,
    pub session: ChatSession,
}

/// Close response, carrying the forwarding disposition.
#[derive(Debug, Serialize)]
pub struct CloseResponse {
    pub session: ChatSession,
    pub already_closed: bool,
    /// Whether an explicit forward call is expected before delivery.
    pub pending_forward: bool,
}

/// Parse a UUID from a path parameter, returning a 400 error on invalid format.
fn parse_uuid(s: &str) -> Result<Uuid, AppError> {
    s.parse::<Uuid>()
        .map_err(|_| AppError::Validation(format!("Invalid UUID: {s}")))
}

fn parse_status_filter(status: Option<&str>) -> Result<Option<SessionStatus>, AppError> {
    status
        .map(|s| s.parse::<SessionStatus>().map_err(AppError::Validation))
        .transpose()
}

/// POST /api/v1/sessions - Open a session; the authenticated caller is the customer.
pub async fn create_session(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Json(body): Json<CreateSessionRequest>,
) -> Result<Json<ApiResponse<ChatSession>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let session = state
        .lifecycle
        .create_session(user.id, body.account_id, body.subject)
        .await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(session.clone(), request_id, elapsed)
        .with_link("self", &format!("/api/v1/sessions/{}", session.id))
        .with_link("messages", &format!("/api/v1/sessions/{}/messages", session.id));

    Ok(Json(resp))
}

/// GET /api/v1/sessions - List sessions visible to the caller, newest first.
pub async fn list_sessions(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Query(query): Query<SessionListQuery>,
) -> Result<Json<ApiResponse<Vec<ChatSession>>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let status = parse_status_filter(query.status.as_deref())?;
    let sessions = state.lifecycle.list_for_staff(&user.id, status).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(sessions, request_id, elapsed)
        .with_link("self", "/api/v1/sessions");

    Ok(Json(resp))
}

/// GET /api/v1/sessions/{id} - Session detail, subject to the visibility rule.
pub async fn get_session(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<ChatSession>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let sid = parse_uuid(&session_id)?;
    let session = state.lifecycle.get_for_staff(&user.id, &sid).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(session, request_id, elapsed)
        .with_link("self", &format!("/api/v1/sessions/{sid}"));

    Ok(Json(resp))
}

/// POST /api/v1/sessions/{id}/claim - First writer wins; losers get HTTP 200
/// with `claimed: false` and the current assignment.
pub async fn claim_session(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<ClaimResponse>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let sid = parse_uuid(&session_id)?;
    let outcome = state.lifecycle.claim(&sid, &user.id).await?;
    let response = match outcome {
        ClaimOutcome::Claimed(session) => ClaimResponse {
            claimed: true,
            session,
        },
        ClaimOutcome::AlreadyClaimed(session) => ClaimResponse {
            claimed: false,
            session,
        },
    };

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(response, request_id, elapsed)
        .with_link("self", &format!("/api/v1/sessions/{sid}"));

    Ok(Json(resp))
}

/// POST /api/v1/sessions/{id}/close - Close and kick off forwarding policy.
pub async fn close_session(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<CloseResponse>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let sid = parse_uuid(&session_id)?;
    let outcome = state.lifecycle.close(&sid, &user.id).await?;

    // Forwarding policy is read at close time so settings changes apply
    // without a restart. The close itself never blocks on delivery.
    let settings = load_chat_settings(&state.params).await.map_err(|e| {
        AppError::Internal(format!("Failed to load chat settings: {e}"))
    })?;
    let disposition =
        state
            .forwarding
            .on_close(&settings, &outcome.session, outcome.already_closed);

    let response = CloseResponse {
        session: outcome.session,
        already_closed: outcome.already_closed,
        pending_forward: disposition == ForwardDisposition::PendingConfirmation,
    };

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(response, request_id, elapsed)
        .with_link("self", &format!("/api/v1/sessions/{sid}"))
        .with_link("forward", &format!("/api/v1/sessions/{sid}/forward"));

    Ok(Json(resp))
}

/// POST /api/v1/sessions/{id}/forward - Explicit transcript forward.
pub async fn forward_session(
    State(state): State<AppState>,
    AuthenticatedUser(user): AuthenticatedUser,
    Path(session_id): Path<String>,
) -> Result<Json<ApiResponse<ChatSession>>, AppError> {
    let start = Instant::now();
    let request_id = Uuid::now_v7().to_string();

    let sid = parse_uuid(&session_id)?;
    let session = state.forwarding.forward(&sid, Some(&user.id)).await?;

    let elapsed = start.elapsed().as_millis() as u64;
    let resp = ApiResponse::success(session, request_id, elapsed)
        .with_link("self", &format!("/api/v1/sessions/{sid}"));

    Ok(Json(resp))
}
