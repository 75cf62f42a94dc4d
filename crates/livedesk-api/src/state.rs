//! Application state wiring the chat services together.
//!
//! AppState holds the concrete service instances used by both CLI and REST
//! API. The lifecycle and forwarding workflow are generic over the
//! repository/directory/delivery ports; AppState pins them to the SQLite
//! and webhook implementations.

use std::path::PathBuf;
use std::sync::Arc;

use livedesk_core::chat::forward::ForwardingWorkflow;
use livedesk_core::chat::lifecycle::ChatLifecycle;
use livedesk_infra::delivery::TranscriptDeliveryBackend;
use livedesk_infra::sqlite::params::SqliteParameterStore;
use livedesk_infra::sqlite::pool::{resolve_data_dir, DatabasePool};
use livedesk_infra::sqlite::chat::SqliteChatRepository;
use livedesk_infra::sqlite::user::SqliteUserDirectory;

/// Concrete type aliases for the service generics pinned to infra implementations.
pub type ConcreteLifecycle = ChatLifecycle<Arc<SqliteChatRepository>, SqliteUserDirectory>;

pub type ConcreteForwarding = ForwardingWorkflow<SqliteChatRepository, TranscriptDeliveryBackend>;

/// Shared application state holding all services.
///
/// Used by both CLI commands and REST API handlers.
#[derive(Clone)]
pub struct AppState {
    pub lifecycle: Arc<ConcreteLifecycle>,
    pub forwarding: ConcreteForwarding,
    pub params: SqliteParameterStore,
    pub directory: SqliteUserDirectory,
    pub data_dir: PathBuf,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state: connect to DB, wire services.
    pub async fn init() -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();

        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir).await?;

        let db_url = format!(
            "sqlite://{}?mode=rwc",
            data_dir.join("livedesk.db").display()
        );
        let db_pool = DatabasePool::new(&db_url).await?;

        let repo = Arc::new(SqliteChatRepository::new(db_pool.clone()));
        let directory = SqliteUserDirectory::new(db_pool.clone());
        let params = SqliteParameterStore::new(db_pool.clone());

        // Transcript delivery: webhook when configured, log backend otherwise.
        let delivery = TranscriptDeliveryBackend::from_endpoint(
            std::env::var("LIVEDESK_FORWARD_WEBHOOK").ok(),
        );

        let lifecycle = ChatLifecycle::new(Arc::clone(&repo), directory.clone());
        let forwarding = ForwardingWorkflow::new(repo, Arc::new(delivery));

        Ok(Self {
            lifecycle: Arc::new(lifecycle),
            forwarding,
            params,
            directory,
            data_dir,
            db_pool,
        })
    }
}
