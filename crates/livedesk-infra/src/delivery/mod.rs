//! Outbound transcript delivery backends.
//!
//! Two implementations of the `TranscriptDelivery` port: a webhook backend
//! that POSTs the transcript as JSON to a configured endpoint, and a log
//! backend for deployments without an outbound channel. The backend enum
//! lets the API layer pick one at startup without boxing.

use livedesk_core::chat::forward::{DeliveryError, TranscriptDelivery};
use livedesk_types::chat::{ChatMessage, ChatSession};
use serde_json::{json, Value};
use tracing::info;

/// Build the JSON payload shipped to the customer-facing delivery endpoint.
pub fn transcript_payload(session: &ChatSession, transcript: &[ChatMessage]) -> Value {
    json!({
        "session": {
            "id": session.id,
            "customer_user_id": session.customer_user_id,
            "subject": session.subject,
            "started_at": session.started_at,
            "ended_at": session.ended_at,
        },
        "messages": transcript
            .iter()
            .map(|m| {
                json!({
                    "id": m.id,
                    "sender_type": m.sender_type,
                    "sender_user_id": m.sender_user_id,
                    "body": m.body,
                    "created_at": m.created_at,
                })
            })
            .collect::<Vec<_>>(),
    })
}

/// Delivers transcripts by POSTing JSON to an external webhook.
pub struct WebhookTranscriptDelivery {
    client: reqwest::Client,
    endpoint: String,
}

impl WebhookTranscriptDelivery {
    pub fn new(endpoint: String) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint,
        }
    }
}

impl TranscriptDelivery for WebhookTranscriptDelivery {
    async fn send_transcript(
        &self,
        session: &ChatSession,
        transcript: &[ChatMessage],
    ) -> Result<(), DeliveryError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(&transcript_payload(session, transcript))
            .send()
            .await
            .map_err(|e| DeliveryError(format!("webhook request failed: {e}")))?;

        if !response.status().is_success() {
            return Err(DeliveryError(format!(
                "webhook returned status {}",
                response.status()
            )));
        }

        Ok(())
    }
}

/// No-op delivery that records the forward in the log stream.
pub struct LogTranscriptDelivery;

impl TranscriptDelivery for LogTranscriptDelivery {
    async fn send_transcript(
        &self,
        session: &ChatSession,
        transcript: &[ChatMessage],
    ) -> Result<(), DeliveryError> {
        info!(
            session_id = %session.id,
            messages = transcript.len(),
            "Transcript delivery (log backend)"
        );
        Ok(())
    }
}

/// Startup-selected delivery backend.
pub enum TranscriptDeliveryBackend {
    Webhook(WebhookTranscriptDelivery),
    Log(LogTranscriptDelivery),
}

impl TranscriptDeliveryBackend {
    /// Webhook when an endpoint is configured, log backend otherwise.
    pub fn from_endpoint(endpoint: Option<String>) -> Self {
        match endpoint {
            Some(endpoint) => Self::Webhook(WebhookTranscriptDelivery::new(endpoint)),
            None => Self::Log(LogTranscriptDelivery),
        }
    }
}

impl TranscriptDelivery for TranscriptDeliveryBackend {
    async fn send_transcript(
        &self,
        session: &ChatSession,
        transcript: &[ChatMessage],
    ) -> Result<(), DeliveryError> {
        match self {
            Self::Webhook(backend) => backend.send_transcript(session, transcript).await,
            Self::Log(backend) => backend.send_transcript(session, transcript).await,
        }
    }
}
