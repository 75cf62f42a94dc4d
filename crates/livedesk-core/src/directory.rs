//! Ports for the external user directory and permission system.
//!
//! Both are consumed collaborators: the directory only feeds rendering
//! (display names are never an authorization input), the capability check
//! gates the manage-all listing behavior.

use livedesk_types::error::RepositoryError;
use uuid::Uuid;

/// Capability gating claim-all/view-all session visibility.
pub const MANAGE_CHATS: &str = "manage_chats";

/// Display-name lookup against the account directory.
pub trait Directory: Send + Sync {
    /// Resolve a user's display name; `None` for unknown ids.
    fn get_display_name(
        &self,
        user_id: &Uuid,
    ) -> impl std::future::Future<Output = Result<Option<String>, RepositoryError>> + Send;
}

/// Permission check against the external authorization system.
pub trait CapabilityCheck: Send + Sync {
    /// Whether the user holds the named capability. Unknown users hold none.
    fn has_permission(
        &self,
        user_id: &Uuid,
        capability: &str,
    ) -> impl std::future::Future<Output = Result<bool, RepositoryError>> + Send;
}
