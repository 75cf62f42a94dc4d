//! SQLite-backed user directory and capability check.
//!
//! The `users` table doubles as the API-key registry for the HTTP surface:
//! keys are stored as SHA-256 hex digests, never in the clear.

use chrono::{DateTime, Utc};
use livedesk_core::directory::{CapabilityCheck, Directory, MANAGE_CHATS};
use livedesk_types::error::RepositoryError;
use livedesk_types::user::User;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `Directory` and `CapabilityCheck`.
#[derive(Clone)]
pub struct SqliteUserDirectory {
    pool: DatabasePool,
}

struct UserRow {
    id: String,
    display_name: String,
    email: Option<String>,
    can_manage_chats: i64,
    created_at: String,
    last_seen_at: Option<String>,
}

impl UserRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            display_name: row.try_get("display_name")?,
            email: row.try_get("email")?,
            can_manage_chats: row.try_get("can_manage_chats")?,
            created_at: row.try_get("created_at")?,
            last_seen_at: row.try_get("last_seen_at")?,
        })
    }

    fn into_user(self) -> Result<User, RepositoryError> {
        let id = Uuid::parse_str(&self.id)
            .map_err(|e| RepositoryError::Query(format!("invalid user id: {e}")))?;
        Ok(User {
            id,
            display_name: self.display_name,
            email: self.email,
            can_manage_chats: self.can_manage_chats != 0,
            created_at: parse_datetime(&self.created_at)?,
            last_seen_at: self.last_seen_at.as_deref().map(parse_datetime).transpose()?,
        })
    }
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

impl SqliteUserDirectory {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// Insert a user record with an optional API key hash.
    pub async fn create_user(
        &self,
        user: &User,
        api_key_hash: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r#"INSERT INTO users (id, display_name, email, api_key_hash, can_manage_chats, created_at, last_seen_at)
               VALUES (?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(user.id.to_string())
        .bind(&user.display_name)
        .bind(&user.email)
        .bind(api_key_hash)
        .bind(user.can_manage_chats as i64)
        .bind(user.created_at.to_rfc3339())
        .bind(user.last_seen_at.map(|dt| dt.to_rfc3339()))
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }

    pub async fn get_user(&self, user_id: &Uuid) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM users WHERE id = ?")
            .bind(user_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let user_row =
                    UserRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(user_row.into_user()?))
            }
            None => Ok(None),
        }
    }

    /// Look up a user by the SHA-256 hex digest of their API key.
    pub async fn find_by_api_key_hash(
        &self,
        api_key_hash: &str,
    ) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM users WHERE api_key_hash = ?")
            .bind(api_key_hash)
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let user_row =
                    UserRow::from_row(&row).map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(user_row.into_user()?))
            }
            None => Ok(None),
        }
    }

    /// Best-effort last-seen bump after a successful key check.
    pub async fn touch_last_seen(&self, user_id: &Uuid) -> Result<(), RepositoryError> {
        sqlx::query("UPDATE users SET last_seen_at = ? WHERE id = ?")
            .bind(Utc::now().to_rfc3339())
            .bind(user_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;
        Ok(())
    }
}

impl Directory for SqliteUserDirectory {
    async fn get_display_name(&self, user_id: &Uuid) -> Result<Option<String>, RepositoryError> {
        Ok(self.get_user(user_id).await?.map(|u| u.display_name))
    }
}

impl CapabilityCheck for SqliteUserDirectory {
    async fn has_permission(
        &self,
        user_id: &Uuid,
        capability: &str,
    ) -> Result<bool, RepositoryError> {
        if capability != MANAGE_CHATS {
            return Ok(false);
        }
        Ok(self
            .get_user(user_id)
            .await?
            .map(|u| u.can_manage_chats)
            .unwrap_or(false))
    }
}
