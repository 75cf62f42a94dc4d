//! API key authentication extractor.
//!
//! Extracts and verifies API keys from:
//! - `Authorization: Bearer <key>` header
//! - `X-API-Key: <key>` header
//!
//! Keys are SHA-256 hashed and compared against the `users` table; the
//! matched row identifies the caller for claim/close/visibility decisions.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use sha2::{Digest, Sha256};

use livedesk_types::user::User;

use crate::http::error::AppError;
use crate::state::AppState;

/// Authenticated caller. Extracting this validates the API key and resolves
/// the owning user record.
pub struct AuthenticatedUser(pub User);

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = AppError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let api_key = extract_api_key(parts)?;
        let key_hash = hash_api_key(&api_key);

        let user = state
            .directory
            .find_by_api_key_hash(&key_hash)
            .await
            .map_err(|e| AppError::Internal(format!("Database error: {e}")))?;

        match user {
            Some(user) => {
                // Update last_seen_at (best effort, don't fail the request)
                if let Err(e) = state.directory.touch_last_seen(&user.id).await {
                    tracing::warn!(user_id = %user.id, error = %e, "Failed to update last_seen_at");
                }
                Ok(AuthenticatedUser(user))
            }
            None => Err(AppError::Unauthorized(
                "Invalid API key. Provide a valid key via 'Authorization: Bearer <key>' or 'X-API-Key: <key>' header.".to_string(),
            )),
        }
    }
}

/// Extract the API key from request headers.
fn extract_api_key(parts: &Parts) -> Result<String, AppError> {
    // Try Authorization: Bearer <key>
    if let Some(auth) = parts.headers.get("authorization") {
        let auth_str = auth.to_str().map_err(|_| {
            AppError::Unauthorized("Invalid Authorization header encoding".to_string())
        })?;
        if let Some(key) = auth_str.strip_prefix("Bearer ") {
            return Ok(key.trim().to_string());
        }
    }

    // Try X-API-Key header
    if let Some(key) = parts.headers.get("x-api-key") {
        let key_str = key
            .to_str()
            .map_err(|_| AppError::Unauthorized("Invalid X-API-Key header encoding".to_string()))?;
        return Ok(key_str.trim().to_string());
    }

    Err(AppError::Unauthorized(
        "Missing API key. Provide via 'Authorization: Bearer <key>' or 'X-API-Key: <key>' header."
            .to_string(),
    ))
}

/// Compute SHA-256 hash of an API key (lowercase hex).
pub fn hash_api_key(key: &str) -> String {
    let digest = Sha256::digest(key.as_bytes());
    format!("{:x}", digest)
}

/// Ensure a bootstrap staff user with an API key exists.
///
/// Returns the plaintext key (shown once) when a new user was created.
pub async fn ensure_bootstrap_user(state: &AppState) -> anyhow::Result<Option<String>> {
    let existing = sqlx::query_scalar::<_, i64>(
        "SELECT COUNT(*) FROM users WHERE api_key_hash IS NOT NULL",
    )
    .fetch_one(&state.db_pool.reader)
    .await?;

    if existing > 0 {
        return Ok(None);
    }

    let plaintext_key = format!(
        "ldsk_{}{}",
        uuid::Uuid::now_v7().simple(),
        uuid::Uuid::now_v7().simple()
    );
    let key_hash = hash_api_key(&plaintext_key);

    let user = User {
        id: uuid::Uuid::now_v7(),
        display_name: "admin".to_string(),
        email: None,
        can_manage_chats: true,
        created_at: chrono::Utc::now(),
        last_seen_at: None,
    };
    state.directory.create_user(&user, Some(&key_hash)).await?;

    Ok(Some(plaintext_key))
}
