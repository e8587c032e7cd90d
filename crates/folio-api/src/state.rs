//! Application state wiring all services together.
//!
//! AppState holds the concrete service instances used by the HTTP handlers
//! and WebSocket sessions. Services are generic over the repository traits,
//! but AppState pins them to the concrete SQLite implementations.

use std::path::PathBuf;
use std::sync::Arc;

use folio_core::chat::registry::ConnectionRegistry;
use folio_core::chat::service::ChatService;
use folio_infra::sqlite::auth::SqliteAuthProvider;
use folio_infra::sqlite::conversation::SqliteConversationRepository;
use folio_infra::sqlite::pool::{DatabasePool, default_data_dir};

/// Fan-out buffer per channel. Per-conversation channels hold two parties;
/// the admin channel sees every conversation, so give it headroom.
const REGISTRY_CAPACITY: usize = 256;

/// Concrete type alias for the service generics pinned to the SQLite
/// implementations.
pub type ConcreteChatService = ChatService<SqliteConversationRepository>;

/// Shared application state holding all services.
#[derive(Clone)]
pub struct AppState {
    pub chat: Arc<ConcreteChatService>,
    pub auth: Arc<SqliteAuthProvider>,
    pub registry: Arc<ConnectionRegistry>,
    pub db_pool: DatabasePool,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Initialize the application state: connect to the database, wire the
    /// registry and services.
    pub async fn init(data_dir: Option<PathBuf>) -> anyhow::Result<Self> {
        let data_dir = data_dir.unwrap_or_else(default_data_dir);

        // Ensure data directory exists
        tokio::fs::create_dir_all(&data_dir).await?;

        let db_url = format!("sqlite://{}?mode=rwc", data_dir.join("folio.db").display());
        let db_pool = DatabasePool::new(&db_url).await?;

        let registry = Arc::new(ConnectionRegistry::new(REGISTRY_CAPACITY));

        let conversation_repo = SqliteConversationRepository::new(db_pool.clone());
        let chat = ChatService::new(conversation_repo, registry.clone());

        let auth = SqliteAuthProvider::new(db_pool.clone());

        Ok(Self {
            chat: Arc::new(chat),
            auth: Arc::new(auth),
            registry,
            db_pool,
            data_dir,
        })
    }
}
