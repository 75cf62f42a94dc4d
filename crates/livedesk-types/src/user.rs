//! User directory types.
//!
//! The account directory itself is an external collaborator; this type is
//! the narrow projection the chat subsystem consumes for rendering and
//! capability checks.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A directory entry for a customer or staff user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: Uuid,
    pub display_name: String,
    pub email: Option<String>,
    /// Grants the claim-all/view-all behavior in session listings.
    pub can_manage_chats: bool,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: Option<DateTime<Utc>>,
}
