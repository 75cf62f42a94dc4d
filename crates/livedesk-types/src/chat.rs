//! Chat session and message types for Livedesk.
//!
//! These types model a live support interaction between a customer and an
//! assigned staff member: the session record with its lifecycle status, and
//! the append-only messages exchanged within it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use std::fmt;
use std::str::FromStr;

/// Lifecycle status of a support-chat session.
///
/// Transitions only move forward: `waiting -> active -> closed`, with
/// `waiting -> closed` allowed for sessions that were never claimed.
/// Maps to the CHECK constraint in the SQLite schema:
/// `CHECK (status IN ('waiting', 'active', 'closed'))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionStatus {
    Waiting,
    Active,
    Closed,
}

impl SessionStatus {
    /// Whether a transition from `self` to `next` is legal.
    pub fn can_transition_to(self, next: SessionStatus) -> bool {
        matches!(
            (self, next),
            (SessionStatus::Waiting, SessionStatus::Active)
                | (SessionStatus::Waiting, SessionStatus::Closed)
                | (SessionStatus::Active, SessionStatus::Closed)
        )
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Waiting => write!(f, "waiting"),
            SessionStatus::Active => write!(f, "active"),
            SessionStatus::Closed => write!(f, "closed"),
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "waiting" => Ok(SessionStatus::Waiting),
            "active" => Ok(SessionStatus::Active),
            "closed" => Ok(SessionStatus::Closed),
            other => Err(format!("invalid session status: '{other}'")),
        }
    }
}

/// Which side of the conversation sent a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SenderType {
    Customer,
    Admin,
}

impl fmt::Display for SenderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SenderType::Customer => write!(f, "customer"),
            SenderType::Admin => write!(f, "admin"),
        }
    }
}

impl FromStr for SenderType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "customer" => Ok(SenderType::Customer),
            "admin" => Ok(SenderType::Admin),
            other => Err(format!("invalid sender type: '{other}'")),
        }
    }
}

/// A support-chat session between a customer and (once claimed) one staff
/// member.
///
/// `admin_user_id` is set exactly once per lifetime, by the claim operation.
/// A session closed directly from `waiting` keeps it null. Re-opening a
/// conversation always creates a new session id; ids are never reused.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    pub customer_user_id: Uuid,
    pub account_id: Option<Uuid>,
    pub subject: Option<String>,
    pub status: SessionStatus,
    pub admin_user_id: Option<Uuid>,
    pub started_at: DateTime<Utc>,
    pub last_message_at: DateTime<Utc>,
    /// Set iff `status == Closed`.
    pub ended_at: Option<DateTime<Utc>>,
    /// True only after the transcript was successfully delivered.
    pub is_forwarded_to_customer: bool,
}

impl ChatSession {
    /// Create a fresh session in `Waiting` with a time-sortable v7 id.
    pub fn new(customer_user_id: Uuid, account_id: Option<Uuid>, subject: Option<String>) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::now_v7(),
            customer_user_id,
            account_id,
            subject,
            status: SessionStatus::Waiting,
            admin_user_id: None,
            started_at: now,
            last_message_at: now,
            ended_at: None,
            is_forwarded_to_customer: false,
        }
    }
}

/// A single message within a session.
///
/// The `id` is assigned by the message store at append time from a global
/// monotonic counter: strictly increasing, never reused, never reordered.
/// It is the authoritative order -- `created_at` agrees with it per session
/// but is informational. Messages are immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: i64,
    pub chat_session_id: Uuid,
    pub sender_type: SenderType,
    pub sender_user_id: Uuid,
    /// Raw text body; rendering/escaping is a presentation concern.
    pub body: String,
    pub created_at: DateTime<Utc>,
}
