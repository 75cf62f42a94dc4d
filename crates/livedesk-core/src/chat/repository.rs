//! ChatRepository trait definition.
//!
//! Storage port for chat sessions and the append-only message log.
//! Implementations live in livedesk-infra (e.g., `SqliteChatRepository`).
//! Uses native async fn in traits (RPITIT, Rust 2024 edition).
//!
//! Two operations carry the subsystem's concurrency contract and MUST be a
//! single atomic statement in any implementation:
//! - `claim_session`: conditional update guarded on `status = waiting`, so
//!   exactly one of N racing claimers wins.
//! - `append_message`: insert guarded on `status != closed`, so a message
//!   racing a close is accepted until the close transition commits, never
//!   after.

use chrono::{DateTime, Utc};
use livedesk_types::chat::{ChatMessage, ChatSession, SenderType, SessionStatus};
use livedesk_types::error::RepositoryError;
use uuid::Uuid;

/// Repository trait for chat session and message persistence.
pub trait ChatRepository: Send + Sync {
    /// Persist a freshly created session.
    fn create_session(
        &self,
        session: &ChatSession,
    ) -> impl std::future::Future<Output = Result<ChatSession, RepositoryError>> + Send;

    /// Get a session by its unique ID.
    fn get_session(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<ChatSession>, RepositoryError>> + Send;

    /// Atomically claim a `waiting` session for a staff member.
    ///
    /// Single conditional update: sets `status = active` and binds
    /// `admin_user_id` only where `status` is still `waiting`. Returns true
    /// iff this call performed the transition (first writer wins).
    fn claim_session(
        &self,
        session_id: &Uuid,
        staff_user_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Atomically close a session from `waiting` or `active`.
    ///
    /// Conditional update guarded on `status != closed`. Returns true iff
    /// this call performed the transition; false means the session was
    /// already closed (or does not exist -- callers disambiguate via
    /// `get_session`).
    fn close_session(
        &self,
        session_id: &Uuid,
        ended_at: DateTime<Utc>,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;

    /// Append a message to an open session and bump `last_message_at`.
    ///
    /// The id is assigned here, from the store's global monotonic counter.
    /// Returns `Ok(None)` when the session is already closed (the guarded
    /// insert matched no open session); `Err(NotFound)` when the session
    /// does not exist at all.
    fn append_message(
        &self,
        session_id: &Uuid,
        sender_type: SenderType,
        sender_user_id: &Uuid,
        body: &str,
    ) -> impl std::future::Future<Output = Result<Option<ChatMessage>, RepositoryError>> + Send;

    /// Messages with id strictly greater than `since_id`, ascending by id.
    ///
    /// Empty result is the normal "nothing new" case, never an error.
    fn fetch_since(
        &self,
        session_id: &Uuid,
        since_id: i64,
    ) -> impl std::future::Future<Output = Result<Vec<ChatMessage>, RepositoryError>> + Send;

    /// Sessions owned by a staff member, newest first.
    fn list_sessions_for_admin(
        &self,
        admin_user_id: &Uuid,
        status: Option<SessionStatus>,
    ) -> impl std::future::Future<Output = Result<Vec<ChatSession>, RepositoryError>> + Send;

    /// All sessions (manage-all view), newest first.
    fn list_all_sessions(
        &self,
        status: Option<SessionStatus>,
    ) -> impl std::future::Future<Output = Result<Vec<ChatSession>, RepositoryError>> + Send;

    /// Record a successful transcript forward.
    fn mark_forwarded(
        &self,
        session_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}

// The lifecycle manager and the forwarding workflow share one repository.
impl<T: ChatRepository> ChatRepository for std::sync::Arc<T> {
    async fn create_session(&self, session: &ChatSession) -> Result<ChatSession, RepositoryError> {
        (**self).create_session(session).await
    }

    async fn get_session(&self, session_id: &Uuid) -> Result<Option<ChatSession>, RepositoryError> {
        (**self).get_session(session_id).await
    }

    async fn claim_session(
        &self,
        session_id: &Uuid,
        staff_user_id: &Uuid,
    ) -> Result<bool, RepositoryError> {
        (**self).claim_session(session_id, staff_user_id).await
    }

    async fn close_session(
        &self,
        session_id: &Uuid,
        ended_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        (**self).close_session(session_id, ended_at).await
    }

    async fn append_message(
        &self,
        session_id: &Uuid,
        sender_type: SenderType,
        sender_user_id: &Uuid,
        body: &str,
    ) -> Result<Option<ChatMessage>, RepositoryError> {
        (**self)
            .append_message(session_id, sender_type, sender_user_id, body)
            .await
    }

    async fn fetch_since(
        &self,
        session_id: &Uuid,
        since_id: i64,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        (**self).fetch_since(session_id, since_id).await
    }

    async fn list_sessions_for_admin(
        &self,
        admin_user_id: &Uuid,
        status: Option<SessionStatus>,
    ) -> Result<Vec<ChatSession>, RepositoryError> {
        (**self)
            .list_sessions_for_admin(admin_user_id, status)
            .await
    }

    async fn list_all_sessions(
        &self,
        status: Option<SessionStatus>,
    ) -> Result<Vec<ChatSession>, RepositoryError> {
        (**self).list_all_sessions(status).await
    }

    async fn mark_forwarded(&self, session_id: &Uuid) -> Result<(), RepositoryError> {
        (**self).mark_forwarded(session_id).await
    }
}
