//! Post-close transcript forwarding workflow.
//!
//! After a session closes, its transcript may be shipped to the customer via
//! the external delivery collaborator. Policy comes from the chat settings:
//! confirmation-gated (`ask_before_forward`), delayed automatic
//! (`auto_forward_chat` + `forward_delay_minutes`), or off.
//!
//! Delivery failure is non-fatal: the session stays unforwarded so a later
//! retry can pick it up. There is no retry scheduler here -- only the
//! queryable `is_forwarded_to_customer` state.

use std::sync::Arc;
use std::time::Duration;

use livedesk_types::chat::{ChatMessage, ChatSession, SessionStatus};
use livedesk_types::config::ChatSettings;
use livedesk_types::error::ChatError;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::chat::repository::ChatRepository;

/// Failure reported by the external transcript delivery collaborator.
#[derive(Debug, Error)]
#[error("{0}")]
pub struct DeliveryError(pub String);

/// Outbound transcript delivery port (email/notification send).
pub trait TranscriptDelivery: Send + Sync {
    fn send_transcript(
        &self,
        session: &ChatSession,
        transcript: &[ChatMessage],
    ) -> impl std::future::Future<Output = Result<(), DeliveryError>> + Send;
}

/// What happened to forwarding when a session closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ForwardDisposition {
    /// Waiting for an explicit staff `forward` call.
    PendingConfirmation,
    /// An automatic forward was scheduled (possibly with zero delay).
    Scheduled,
    /// Forwarding is not configured.
    Off,
}

/// Runs transcript forwarding against the message store and the delivery
/// collaborator. Cheap to clone; scheduled forwards run on spawned tasks
/// that outlive the triggering request.
pub struct ForwardingWorkflow<R, D> {
    repo: Arc<R>,
    delivery: Arc<D>,
}

impl<R, D> Clone for ForwardingWorkflow<R, D> {
    fn clone(&self) -> Self {
        Self {
            repo: Arc::clone(&self.repo),
            delivery: Arc::clone(&self.delivery),
        }
    }
}

impl<R, D> ForwardingWorkflow<R, D>
where
    R: ChatRepository + 'static,
    D: TranscriptDelivery + 'static,
{
    pub fn new(repo: Arc<R>, delivery: Arc<D>) -> Self {
        Self { repo, delivery }
    }

    /// Apply the forwarding policy to a session that just closed.
    ///
    /// Never blocks the close: the automatic path is handed to a spawned
    /// task. A repeated close on an already-closed session must not
    /// re-trigger scheduling; callers pass `already_closed` from the close
    /// outcome.
    pub fn on_close(
        &self,
        settings: &ChatSettings,
        session: &ChatSession,
        already_closed: bool,
    ) -> ForwardDisposition {
        if already_closed || session.is_forwarded_to_customer {
            return ForwardDisposition::Off;
        }
        if settings.ask_before_forward {
            return ForwardDisposition::PendingConfirmation;
        }
        if settings.auto_forward_chat {
            let delay = Duration::from_secs(settings.forward_delay_minutes.saturating_mul(60));
            self.auto_forward_after(session.id, delay);
            return ForwardDisposition::Scheduled;
        }
        ForwardDisposition::Off
    }

    /// Spawn a deferred forward for a closed session.
    ///
    /// Failures are logged as warnings; the session remains unforwarded.
    pub fn auto_forward_after(&self, session_id: Uuid, delay: Duration) {
        let workflow = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            if let Err(e) = workflow.forward(&session_id, None).await {
                warn!(session_id = %session_id, error = %e, "Automatic transcript forward failed");
            }
        });
    }

    /// Deliver the transcript of a closed session to its customer.
    ///
    /// Idempotent: a session that was already forwarded is a no-op success.
    /// On delivery failure, `is_forwarded_to_customer` stays false and the
    /// typed `DeliveryFailed` error signals a retryable warning, not a fatal
    /// operation failure.
    pub async fn forward(
        &self,
        session_id: &Uuid,
        staff_user_id: Option<&Uuid>,
    ) -> Result<ChatSession, ChatError> {
        let session = self
            .repo
            .get_session(session_id)
            .await?
            .ok_or(ChatError::NotFound)?;

        if session.status != SessionStatus::Closed {
            return Err(ChatError::InvalidTransition(
                "cannot forward a session that is not closed".to_string(),
            ));
        }
        if session.is_forwarded_to_customer {
            return Ok(session);
        }

        let transcript = self.repo.fetch_since(session_id, 0).await?;
        self.delivery
            .send_transcript(&session, &transcript)
            .await
            .map_err(|e| {
                warn!(session_id = %session_id, error = %e, "Transcript delivery failed");
                ChatError::DeliveryFailed(e.to_string())
            })?;

        self.repo.mark_forwarded(session_id).await?;
        info!(
            session_id = %session_id,
            staff = ?staff_user_id,
            messages = transcript.len(),
            "Transcript forwarded to customer"
        );

        let mut session = session;
        session.is_forwarded_to_customer = true;
        Ok(session)
    }
}
