//! Admin key panel
//!
//! A small service for issuing, validating and revoking opaque API keys.
//! Two key flavors share one lifecycle: long-lived server keys for
//! infrastructure and short-lived user keys for end-user devices.

pub mod api;
pub mod cli;
pub mod config;
pub mod domain;
pub mod infrastructure;

pub use config::AppConfig;

use std::sync::Arc;

use tracing::info;

use api::state::AppState;
use domain::admin::AdminRepository;
use domain::key::KeyStore;
use infrastructure::admin::{
    AdminService, Argon2Hasher, InMemoryAdminRepository, PostgresAdminRepository,
};
use infrastructure::auth::SessionService;
use infrastructure::key::{
    EnginePolicy, InMemoryKeyStore, KeyService, PostgresKeyStore, TokenGenerator,
};

/// Create the application state with all services initialized.
///
/// An unreachable storage backend is fatal; serving validation answers
/// without the store behind them would be worse than not starting.
pub async fn create_app_state(config: &AppConfig) -> anyhow::Result<AppState> {
    let (key_store, admin_repository): (Arc<dyn KeyStore>, Arc<dyn AdminRepository>) =
        match config.storage.backend.as_str() {
            "postgres" => {
                let database_url = std::env::var("DATABASE_URL")
                    .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

                info!("Connecting to PostgreSQL...");
                let key_store = PostgresKeyStore::connect(&database_url).await?;
                let admin_repository = PostgresAdminRepository::new(key_store.pool().clone());
                admin_repository.init_schema().await?;
                info!("PostgreSQL connection established");

                (Arc::new(key_store), Arc::new(admin_repository))
            }
            "memory" => {
                info!("Using in-memory storage, keys will not survive a restart");
                (
                    Arc::new(InMemoryKeyStore::new()),
                    Arc::new(InMemoryAdminRepository::new()),
                )
            }
            other => {
                anyhow::bail!("unknown storage backend '{}', expected 'memory' or 'postgres'", other)
            }
        };

    let policy = EnginePolicy {
        lockout_on_limit_exceeded: config.engine.lockout_on_limit_exceeded,
        auto_expire_on_observe: config.engine.auto_expire_on_observe,
    };

    let key_service = Arc::new(KeyService::new(key_store, TokenGenerator::new(), policy));

    let hasher = Arc::new(Argon2Hasher::new());
    let admin_service = Arc::new(AdminService::new(admin_repository, hasher));
    admin_service.ensure_default_admin().await?;

    Ok(AppState::new(key_service, admin_service, SessionService::new()))
}
