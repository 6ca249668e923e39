//! Application state wiring all services together.
//!
//! `AppState` pins the generic core services to the concrete infra
//! implementations: SQLite repositories behind one shared pool, the REST
//! platform client, and the Anthropic completion client. Created once at
//! startup, torn down at shutdown -- no ambient singletons.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use corvid_core::conversation::ConversationService;
use corvid_core::dedup::Deduplicator;
use corvid_core::event::EventBus;
use corvid_core::memory::MemoryEngine;
use corvid_core::orchestrator::ResponseOrchestrator;
use corvid_core::platform::PlatformClient;
use corvid_core::profile::ProfileCache;
use corvid_core::tools::platform::builtin_tools;
use corvid_core::tools::registry::ToolRegistry;
use corvid_infra::config::Secrets;
use corvid_infra::llm::AnthropicCompletionClient;
use corvid_infra::platform::RestPlatformClient;
use corvid_infra::sqlite::{
    DatabasePool, SqliteConversationRepository, SqliteMemoryRepository,
    SqliteProcessedEventRepository,
};
use corvid_types::config::BotConfig;

/// Profile snapshots stay fresh for this long.
const PROFILE_TTL: Duration = Duration::from_secs(600);

/// Concrete orchestrator type pinned to the SQLite repositories.
pub type ConcreteOrchestrator = ResponseOrchestrator<
    SqliteConversationRepository,
    SqliteProcessedEventRepository,
    SqliteMemoryRepository,
>;

/// Shared application state for the run loop.
pub struct AppState {
    pub config: BotConfig,
    pub data_dir: PathBuf,
    pub bus: EventBus,
    pub platform: Arc<dyn PlatformClient>,
    pub orchestrator: Arc<ConcreteOrchestrator>,
    /// Shared with the orchestrator; used by the periodic eviction pass.
    pub memories: Arc<MemoryEngine<SqliteMemoryRepository>>,
    /// Dedicated deduplicator instance for the retention sweep.
    pub sweeper: Deduplicator<SqliteProcessedEventRepository>,
    pub db_pool: DatabasePool,
}

impl AppState {
    /// Initialize the application state: connect to the database, wire
    /// repositories, clients, and the orchestrator.
    pub async fn init(
        data_dir: PathBuf,
        config: BotConfig,
        secrets: &Secrets,
    ) -> anyhow::Result<Self> {
        tokio::fs::create_dir_all(&data_dir).await?;

        let db_url = format!("sqlite://{}?mode=rwc", data_dir.join("corvid.db").display());
        let db_pool = DatabasePool::new(&db_url).await?;

        let platform: Arc<dyn PlatformClient> = Arc::new(RestPlatformClient::new(
            config.platform.api_base.clone(),
            secrets.platform_token.clone(),
        ));

        let completion = Arc::new(AnthropicCompletionClient::new(
            secrets.llm_api_key.clone(),
            config.llm.api_base.clone(),
            config.llm.model.clone(),
        ));

        let memories = Arc::new(MemoryEngine::new(
            SqliteMemoryRepository::new(db_pool.clone()),
            config.memory.clone(),
        ));

        let mut registry = ToolRegistry::new();
        for tool in builtin_tools(platform.clone()) {
            registry.register(tool);
        }

        let orchestrator = Arc::new(ResponseOrchestrator::new(
            ConversationService::new(
                SqliteConversationRepository::new(db_pool.clone()),
                config.rate.clone(),
                config.persona.seed_message.clone(),
            ),
            Deduplicator::new(SqliteProcessedEventRepository::new(db_pool.clone())),
            memories.clone(),
            platform.clone(),
            completion,
            ProfileCache::new(platform.clone(), PROFILE_TTL),
            registry,
            &config,
        ));

        let sweeper = Deduplicator::new(SqliteProcessedEventRepository::new(db_pool.clone()));

        Ok(Self {
            config,
            data_dir,
            bus: EventBus::new(256),
            platform,
            orchestrator,
            memories,
            sweeper,
            db_pool,
        })
    }
}
