//! In-memory test doubles for the chat ports.
//!
//! `MemoryChatRepository` mirrors the atomicity contract of the SQLite
//! implementation: claim and append are each performed under one lock
//! acquisition, so racing callers observe first-writer-wins.

use std::collections::HashMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};

use chrono::{DateTime, Utc};
use livedesk_types::chat::{ChatMessage, ChatSession, SenderType, SessionStatus};
use livedesk_types::error::RepositoryError;
use uuid::Uuid;

use crate::chat::forward::{DeliveryError, TranscriptDelivery};
use crate::chat::repository::ChatRepository;
use crate::directory::CapabilityCheck;

#[derive(Default)]
pub struct MemoryChatRepository {
    state: Mutex<MemoryState>,
    next_id: AtomicI64,
}

#[derive(Default)]
struct MemoryState {
    sessions: HashMap<Uuid, ChatSession>,
    messages: Vec<ChatMessage>,
}

impl MemoryChatRepository {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MemoryState::default()),
            next_id: AtomicI64::new(1),
        }
    }
}

impl ChatRepository for MemoryChatRepository {
    async fn create_session(&self, session: &ChatSession) -> Result<ChatSession, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        state.sessions.insert(session.id, session.clone());
        Ok(session.clone())
    }

    async fn get_session(&self, session_id: &Uuid) -> Result<Option<ChatSession>, RepositoryError> {
        let state = self.state.lock().unwrap();
        Ok(state.sessions.get(session_id).cloned())
    }

    async fn claim_session(
        &self,
        session_id: &Uuid,
        staff_user_id: &Uuid,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        match state.sessions.get_mut(session_id) {
            Some(session) if session.status == SessionStatus::Waiting => {
                session.status = SessionStatus::Active;
                session.admin_user_id = Some(*staff_user_id);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn close_session(
        &self,
        session_id: &Uuid,
        ended_at: DateTime<Utc>,
    ) -> Result<bool, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        match state.sessions.get_mut(session_id) {
            Some(session) if session.status != SessionStatus::Closed => {
                session.status = SessionStatus::Closed;
                session.ended_at = Some(ended_at);
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn append_message(
        &self,
        session_id: &Uuid,
        sender_type: SenderType,
        sender_user_id: &Uuid,
        body: &str,
    ) -> Result<Option<ChatMessage>, RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or(RepositoryError::NotFound)?;
        if session.status == SessionStatus::Closed {
            return Ok(None);
        }

        let now = Utc::now();
        session.last_message_at = now;
        let message = ChatMessage {
            id: self.next_id.fetch_add(1, Ordering::SeqCst),
            chat_session_id: *session_id,
            sender_type,
            sender_user_id: *sender_user_id,
            body: body.to_string(),
            created_at: now,
        };
        state.messages.push(message.clone());
        Ok(Some(message))
    }

    async fn fetch_since(
        &self,
        session_id: &Uuid,
        since_id: i64,
    ) -> Result<Vec<ChatMessage>, RepositoryError> {
        let state = self.state.lock().unwrap();
        let mut messages: Vec<ChatMessage> = state
            .messages
            .iter()
            .filter(|m| m.chat_session_id == *session_id && m.id > since_id)
            .cloned()
            .collect();
        messages.sort_by_key(|m| m.id);
        Ok(messages)
    }

    async fn list_sessions_for_admin(
        &self,
        admin_user_id: &Uuid,
        status: Option<SessionStatus>,
    ) -> Result<Vec<ChatSession>, RepositoryError> {
        let state = self.state.lock().unwrap();
        let mut sessions: Vec<ChatSession> = state
            .sessions
            .values()
            .filter(|s| s.admin_user_id == Some(*admin_user_id))
            .filter(|s| status.is_none_or(|want| s.status == want))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(sessions)
    }

    async fn list_all_sessions(
        &self,
        status: Option<SessionStatus>,
    ) -> Result<Vec<ChatSession>, RepositoryError> {
        let state = self.state.lock().unwrap();
        let mut sessions: Vec<ChatSession> = state
            .sessions
            .values()
            .filter(|s| status.is_none_or(|want| s.status == want))
            .cloned()
            .collect();
        sessions.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        Ok(sessions)
    }

    async fn mark_forwarded(&self, session_id: &Uuid) -> Result<(), RepositoryError> {
        let mut state = self.state.lock().unwrap();
        let session = state
            .sessions
            .get_mut(session_id)
            .ok_or(RepositoryError::NotFound)?;
        session.is_forwarded_to_customer = true;
        Ok(())
    }
}

/// Capability check granting `manage_chats` to a fixed set of users.
#[derive(Default)]
pub struct StaticCaps {
    pub managers: Vec<Uuid>,
}

impl CapabilityCheck for StaticCaps {
    async fn has_permission(
        &self,
        user_id: &Uuid,
        capability: &str,
    ) -> Result<bool, RepositoryError> {
        Ok(capability == crate::directory::MANAGE_CHATS && self.managers.contains(user_id))
    }
}

/// Transcript delivery double recording calls, optionally failing.
#[derive(Default)]
pub struct RecordingDelivery {
    pub sent: Mutex<Vec<(Uuid, usize)>>,
    pub fail: AtomicBool,
}

impl TranscriptDelivery for RecordingDelivery {
    async fn send_transcript(
        &self,
        session: &ChatSession,
        transcript: &[ChatMessage],
    ) -> Result<(), DeliveryError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(DeliveryError("smtp relay unavailable".to_string()));
        }
        self.sent
            .lock()
            .unwrap()
            .push((session.id, transcript.len()));
        Ok(())
    }
}
