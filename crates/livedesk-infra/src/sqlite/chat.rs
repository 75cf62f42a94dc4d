//! SQLite chat repository implementation.
//!
//! Implements `ChatRepository` from `livedesk-core` using sqlx with split
//! read/write pools: raw queries, private Row structs, reader pool for
//! fetches, writer pool for mutations.
//!
//! The two concurrency-sensitive operations are single guarded statements:
//! claim is `UPDATE ... WHERE status = 'waiting'` (first writer wins) and
//! append is `INSERT ... SELECT ... WHERE` the session is still open, so a
//! message racing a close is accepted exactly until the close commits.
//! Message ids come from the AUTOINCREMENT rowid: globally monotonic and
//! never reused.

use chrono::{DateTime, Utc};
use livedesk_core::chat::repository::ChatRepository;
use livedesk_types::chat::{ChatMessage, ChatSession, SenderType, SessionStatus};
use livedesk_types::error::RepositoryError;
use sqlx::Row;
use uuid::Uuid;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ChatRepository`.
#[derive(Clone)]
pub struct SqliteChatRepository {
    pool: DatabasePool,
}

impl SqliteChatRepository {
    /// Create a new repository backed by the given database pool.
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }
}

// ---------------------------------------------------------------------------
// Private Row types for SQLite-to-domain mapping
// ---------------------------------------------------------------------------

/// Internal row type for mapping SQLite rows to domain ChatSession.
struct ChatSessionRow {
    id: String,
    customer_user_id: String,
    account_id: Option<String>,
    subject: Option<String>,
    status: String,
    admin_user_id: Option<String>,
    started_at: String,
    last_message_at: String,
    ended_at: Option<String>,
    is_forwarded_to_customer: i64,
}

impl ChatSessionRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            customer_user_id: row.try_get("customer_user_id")?,
            account_id: row.try_get("account_id")?,
            subject: row.try_get("subject")?,
            status: row.try_get("status")?,
            admin_user_id: row.try_get("admin_user_id")?,
            started_at: row.try_get("started_at")?,
            last_message_at: row.try_get("last_message_at")?,
            ended_at: row.try_get("ended_at")?,
            is_forwarded_to_customer: row.try_get("is_forwarded_to_customer")?,
        })
    }

    fn into_session(self) -> Result<ChatSession, RepositoryError> {
        let id = parse_uuid(&self.id, "session id")?;
        let customer_user_id = parse_uuid(&self.customer_user_id, "customer_user_id")?;
        let account_id = self
            .account_id
            .as_deref()
            .map(|s| parse_uuid(s, "account_id"))
            .transpose()?;
        let admin_user_id = self
            .admin_user_id
            .as_deref()
            .map(|s| parse_uuid(s, "admin_user_id"))
            .transpose()?;
        let status: SessionStatus = self
            .status
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let started_at = parse_datetime(&self.started_at)?;
        let last_message_at = parse_datetime(&self.last_message_at)?;
        let ended_at = self.ended_at.as_deref().map(parse_datetime).transpose()?;

        Ok(ChatSession {
            id,
            customer_user_id,
            account_id,
            subject: self.subject,
            status,
            admin_user_id,
            started_at,
            last_message_at,
            ended_at,
            is_forwarded_to_customer: self.is_forwarded_to_customer != 0,
        })
    }
}

/// Internal row type for mapping SQLite rows to domain ChatMessage.
struct ChatMessageRow {
    id: i64,
    chat_session_id: String,
    sender_type: String,
    sender_user_id: String,
    body: String,
    created_at: String,
}

impl ChatMessageRow {
    fn from_row(row: &sqlx::sqlite::SqliteRow) -> Result<Self, sqlx::Error> {
        Ok(Self {
            id: row.try_get("id")?,
            chat_session_id: row.try_get("chat_session_id")?,
            sender_type: row.try_get("sender_type")?,
            sender_user_id: row.try_get("sender_user_id")?,
            body: row.try_get("body")?,
            created_at: row.try_get("created_at")?,
        })
    }

    fn into_message(self) -> Result<ChatMessage, RepositoryError> {
        let chat_session_id = parse_uuid(&self.chat_session_id, "chat_session_id")?;
        let sender_user_id = parse_uuid(&self.sender_user_id, "sender_user_id")?;
        let sender_type: SenderType = self
            .sender_type
            .parse()
            .map_err(|e: String| RepositoryError::Query(e))?;
        let created_at = parse_datetime(&self.created_at)?;

        Ok(ChatMessage {
            id: self.id,
            chat_session_id,
            sender_type,
            sender_user_id,
            body: self.body,
            created_at,
        })
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn parse_uuid(s: &str, field: &str) -> Result<Uuid, RepositoryError> {
    Uuid::parse_str(s).map_err(|e| RepositoryError::Query(format!("invalid {field}: {e}")))
}

fn parse_datetime(s: &str) -> Result<DateTime<Utc>, RepositoryError> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| RepositoryError::Query(format!("invalid datetime: {e}")))
}

fn format_datetime(dt: &DateTime<Utc>) -> String {
    dt.to_rfc3339()
}

// ---------------------------------------------------------------------------
// ChatRepository implementation
// ---------------------------------------------------------------------------

impl ChatRepository for SqliteChatRepository {
    async fn create_session(&self, session: &ChatSession) -> Result<ChatSession, RepositoryError> {
        sqlx::query(
            r#"INSERT INTO chat_sessions (id, customer_user_id, account_id, subject, status, admin_user_id, started_at, last_message_at, ended_at, is_forwarded_to_customer)
               VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)"#,
        )
        .bind(session.id.to_string())
        .bind(session.customer_user_id.to_string())
        .bind(session.account_id.map(|id| id.to_string()))
        .bind(&session.subject)
        .bind(session.status.to_string())
        .bind(session.admin_user_id.map(|id| id.to_string()))
        .bind(format_datetime(&session.started_at))
        .bind(format_datetime(&session.last_message_at))
        .bind(session.ended_at.as_ref().map(format_datetime))
        .bind(session.is_forwarded_to_customer as i64)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(session.clone())
    }

    async fn get_session(&self, session_id: &Uuid) -> Result<Option<ChatSession>, RepositoryError> {
        let row = sqlx::query("SELECT * FROM chat_sessions WHERE id = ?")
            .bind(session_id.to_string())
            .fetch_optional(&self.pool.reader)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let session_row = ChatSessionRow::from_row(&row)
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(session_row.into_session()?))
            }
            None => Ok(None),
        }
    }

    async fn claim_session(
        &self,
        session_id: &Uuid,
        staff_user_id: &Uuid,
    ) -> Result<bool, RepositoryError> {
        // Single conditional update: the status guard closes the race window
        // between two staff members claiming the same waiting session.
        let result = sqlx::query(
            r#"UPDATE chat_sessions
               SET status = 'active', admin_user_id = ?
               WHERE id = ? AND status = 'waiting'"#,
        )
        .bind(staff_user_id.to_string())
        .bind(session_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn close_session(
        &self,
        session_id: &Uuid,
        ended_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            r#"UPDATE chat_sessions
               SET status = 'closed', ended_at = ?
               WHERE id = ? AND status != 'closed'"#,
        )
        .bind(format_datetime(&ended_at))
        .bind(session_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(result.rows_affected() == 1)
    }

    async fn append_message(
        &self,
        session_id: &Uuid,
        sender_type: SenderType,
        sender_user_id: &Uuid,
        body: &str,
    ) -> Result<Option<ChatMessage>, RepositoryError> {
        let created_at = Utc::now();

        // Guarded insert: matches only while the owning session is open, so
        // a message racing a close is accepted until the close commits.
        let result = sqlx::query(
            r#"INSERT INTO chat_messages (chat_session_id, sender_type, sender_user_id, body, created_at)
               SELECT ?, ?, ?, ?, ?
               WHERE EXISTS (SELECT 1 FROM chat_sessions WHERE id = ? AND status != 'closed')"#,
        )
        .bind(session_id.to_string())
        .bind(sender_type.to_string())
        .bind(sender_user_id.to_string())
        .bind(body)
        .bind(format_datetime(&created_at))
        .bind(session_id.to_string())
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return match self.get_session(session_id).await? {
                None => Err(RepositoryError::NotFound),
                Some(_) => Ok(None),
            };
        }

        let id = result.last_insert_rowid();

        sqlx::query("UPDATE chat_sessions SET last_message_at = ? WHERE id = ?")
            .bind(format_datetime(&created_at))
            .bind(session_id.to_string())
            .execute(&self.pool.writer)
            .await
            .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(Some(ChatMessage {
            id,
            chat_session_id: *session_id,
            sender_type,
            sender_user_id: *sender_user_id,
            body: body.to_string(),
            created_at,
        }))
    }

    async fn fetch_since(
        &self,
        session_id: &Uuid,
        since_id: i64,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT * FROM chat_messages WHERE chat_session_id = ? AND id > ? ORDER BY id ASC",
        )
        .bind(session_id.to_string())
        .bind(since_id)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut messages = Vec::with_capacity(rows.len());
        for row in &rows {
            let msg_row =
                ChatMessageRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
            messages.push(msg_row.into_message()?);
        }

        Ok(messages)
    }

    async fn list_sessions_for_admin(
        &self,
        admin_user_id: &Uuid,
        status: Option<SessionStatus>,
    ) -> Result<Vec<ChatSession>, RepositoryError> {
        let rows = match status {
            Some(status) => sqlx::query(
                "SELECT * FROM chat_sessions WHERE admin_user_id = ? AND status = ? ORDER BY started_at DESC",
            )
            .bind(admin_user_id.to_string())
            .bind(status.to_string())
            .fetch_all(&self.pool.reader)
            .await,
            None => sqlx::query(
                "SELECT * FROM chat_sessions WHERE admin_user_id = ? ORDER BY started_at DESC",
            )
            .bind(admin_user_id.to_string())
            .fetch_all(&self.pool.reader)
            .await,
        }
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        collect_sessions(&rows)
    }

    async fn list_all_sessions(
        &self,
        status: Option<SessionStatus>,
    ) -> Result<Vec<ChatSession>, RepositoryError> {
        let rows = match status {
            Some(status) => sqlx::query(
                "SELECT * FROM chat_sessions WHERE status = ? ORDER BY started_at DESC",
            )
            .bind(status.to_string())
            .fetch_all(&self.pool.reader)
            .await,
            None => {
                sqlx::query("SELECT * FROM chat_sessions ORDER BY started_at DESC")
                    .fetch_all(&self.pool.reader)
                    .await
            }
        }
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        collect_sessions(&rows)
    }

    async fn mark_forwarded(&self, session_id: &Uuid) -> Result<(), RepositoryError> {
        let result =
            sqlx::query("UPDATE chat_sessions SET is_forwarded_to_customer = 1 WHERE id = ?")
                .bind(session_id.to_string())
                .execute(&self.pool.writer)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

        if result.rows_affected() == 0 {
            return Err(RepositoryError::NotFound);
        }

        Ok(())
    }
}

fn collect_sessions(rows: &[sqlx::sqlite::SqliteRow]) -> Result<Vec<ChatSession>, RepositoryError> {
    let mut sessions = Vec::with_capacity(rows.len());
    for row in rows {
        let session_row =
            ChatSessionRow::from_row(row).map_err(|e| RepositoryError::Query(e.to_string()))?;
        sessions.push(session_row.into_session()?);
    }
    Ok(sessions)
}
