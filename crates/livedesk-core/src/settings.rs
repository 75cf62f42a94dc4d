//! Parameter store port and chat settings loading.
//!
//! Configuration is externally owned key/value state, read at call time so
//! that a settings change (e.g., flipping `auto_forward_chat`) takes effect
//! on the next close without a restart.

use livedesk_types::config::ChatSettings;
use livedesk_types::error::RepositoryError;

/// Namespaced key/value parameter store port.
pub trait ParameterStore: Send + Sync {
    /// Read a parameter; `None` when unset.
    fn get_parameter(
        &self,
        namespace: &str,
        key: &str,
    ) -> impl std::future::Future<Output = Result<Option<String>, RepositoryError>> + Send;

    /// Write (upsert) a parameter.
    fn set_parameter(
        &self,
        namespace: &str,
        key: &str,
        value: &str,
    ) -> impl std::future::Future<Output = Result<(), RepositoryError>> + Send;
}

/// Load effective chat settings from the `Chat` namespace.
///
/// Unset keys keep their defaults; set keys are parsed and range-clamped by
/// [`ChatSettings::apply_raw`].
pub async fn load_chat_settings<P: ParameterStore>(
    store: &P,
) -> Result<ChatSettings, RepositoryError> {
    let mut settings = ChatSettings::default();
    for key in ChatSettings::KEYS {
        if let Some(raw) = store.get_parameter(ChatSettings::NAMESPACE, key).await? {
            settings.apply_raw(key, &raw);
        }
    }
    Ok(settings)
}
