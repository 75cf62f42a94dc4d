//! SQLite-backed system parameter store.
//!
//! Parameters live in the `system_parameters` table, keyed by
//! `(namespace, key)`. Values are stored as raw strings; parsing and range
//! clamping happen in `livedesk-types` when settings are loaded.

use chrono::Utc;
use livedesk_core::settings::ParameterStore;
use livedesk_types::error::RepositoryError;
use sqlx::Row;

use super::pool::DatabasePool;

/// SQLite-backed implementation of `ParameterStore`.
#[derive(Clone)]
pub struct SqliteParameterStore {
    pool: DatabasePool,
}

impl SqliteParameterStore {
    pub fn new(pool: DatabasePool) -> Self {
        Self { pool }
    }

    /// List all parameters in a namespace as `(key, value)` pairs.
    pub async fn list_namespace(
        &self,
        namespace: &str,
    ) -> Result<Vec<(String, String)>, RepositoryError> {
        let rows = sqlx::query(
            "SELECT key, value FROM system_parameters WHERE namespace = ? ORDER BY key ASC",
        )
        .bind(namespace)
        .fetch_all(&self.pool.reader)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        let mut params = Vec::with_capacity(rows.len());
        for row in &rows {
            let key: String = row
                .try_get("key")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            let value: String = row
                .try_get("value")
                .map_err(|e| RepositoryError::Query(e.to_string()))?;
            params.push((key, value));
        }
        Ok(params)
    }
}

impl ParameterStore for SqliteParameterStore {
    async fn get_parameter(
        &self,
        namespace: &str,
        key: &str,
    ) -> Result<Option<String>, RepositoryError> {
        let row =
            sqlx::query("SELECT value FROM system_parameters WHERE namespace = ? AND key = ?")
                .bind(namespace)
                .bind(key)
                .fetch_optional(&self.pool.reader)
                .await
                .map_err(|e| RepositoryError::Query(e.to_string()))?;

        match row {
            Some(row) => {
                let value: String = row
                    .try_get("value")
                    .map_err(|e| RepositoryError::Query(e.to_string()))?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set_parameter(
        &self,
        namespace: &str,
        key: &str,
        value: &str,
    ) -> Result<(), RepositoryError> {
        let now = Utc::now().to_rfc3339();
        sqlx::query(
            r#"INSERT INTO system_parameters (namespace, key, value, created_at, updated_at)
               VALUES (?, ?, ?, ?, ?)
               ON CONFLICT(namespace, key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at"#,
        )
        .bind(namespace)
        .bind(key)
        .bind(value)
        .bind(&now)
        .bind(&now)
        .execute(&self.pool.writer)
        .await
        .map_err(|e| RepositoryError::Query(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use livedesk_core::settings::load_chat_settings;
    use livedesk_types::config::ChatSettings;

    async fn test_store() -> SqliteParameterStore {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("test.db");
        let url = format!("sqlite://{}?mode=rwc", db_path.display());
        std::mem::forget(dir);
        SqliteParameterStore::new(DatabasePool::new(&url).await.unwrap())
    }

    #[tokio::test]
    async fn test_get_unset_parameter_is_none() {
        let store = test_store().await;
        assert!(store.get_parameter("Chat", "missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_then_get() {
        let store = test_store().await;
        store
            .set_parameter("Chat", "poll_interval_seconds", "5")
            .await
            .unwrap();
        assert_eq!(
            store
                .get_parameter("Chat", "poll_interval_seconds")
                .await
                .unwrap()
                .as_deref(),
            Some("5")
        );
    }

    #[tokio::test]
    async fn test_set_overwrites_existing_value() {
        let store = test_store().await;
        store.set_parameter("Chat", "auto_forward_chat", "no").await.unwrap();
        store.set_parameter("Chat", "auto_forward_chat", "yes").await.unwrap();
        assert_eq!(
            store
                .get_parameter("Chat", "auto_forward_chat")
                .await
                .unwrap()
                .as_deref(),
            Some("yes")
        );
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let store = test_store().await;
        store.set_parameter("Chat", "forward_delay_minutes", "2").await.unwrap();
        store.set_parameter("Ticket", "forward_delay_minutes", "9").await.unwrap();

        assert_eq!(
            store
                .get_parameter("Chat", "forward_delay_minutes")
                .await
                .unwrap()
                .as_deref(),
            Some("2")
        );
    }

    #[tokio::test]
    async fn test_list_namespace_sorted_by_key() {
        let store = test_store().await;
        store.set_parameter("Chat", "poll_interval_seconds", "5").await.unwrap();
        store.set_parameter("Chat", "ask_before_forward", "yes").await.unwrap();
        store.set_parameter("Other", "unrelated", "1").await.unwrap();

        let params = store.list_namespace("Chat").await.unwrap();
        assert_eq!(
            params,
            vec![
                ("ask_before_forward".to_string(), "yes".to_string()),
                ("poll_interval_seconds".to_string(), "5".to_string()),
            ]
        );
    }

    #[tokio::test]
    async fn test_load_chat_settings_from_sqlite() {
        let store = test_store().await;
        store.set_parameter("Chat", "long_poll_timeout_seconds", "99").await.unwrap();
        store.set_parameter("Chat", "auto_forward_chat", "yes").await.unwrap();

        let settings = load_chat_settings(&store).await.unwrap();
        // 99 is clamped into the 5..=30 range.
        assert_eq!(settings.long_poll_timeout_seconds, 30);
        assert!(settings.auto_forward_chat);
        assert_eq!(settings.poll_interval_seconds, ChatSettings::default().poll_interval_seconds);
    }
}
