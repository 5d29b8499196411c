use std::sync::Arc;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use common::cache::{RedisConfig, RedisPool};
use common::database::{DatabaseConfig, init_pool};
use community::actions::Services;
use community::config::{ServiceConfig, StoreBackend};
use community::routes;
use community::session::SessionVerifier;
use community::state::AppState;
use community::store::CommunityStore;
use community::store::memory::MemoryStore;
use community::store::postgres::PgStore;
use community::views::RedisViewCache;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting community service");

    let config = ServiceConfig::load()?;

    let store: Arc<dyn CommunityStore> = match config.store_backend {
        StoreBackend::Postgres => {
            let db_config = DatabaseConfig::from_env()?;
            let pool = init_pool(&db_config).await?;
            if !common::database::health_check(&pool).await? {
                anyhow::bail!("Failed to connect to database");
            }
            info!("Database connection successful");

            let store = PgStore::new(pool);
            if !config.skip_migrations {
                store.migrate().await?;
                info!("Database migrations applied");
            }
            Arc::new(store)
        }
        StoreBackend::Memory => {
            info!("Using in-memory store; data is lost on restart");
            Arc::new(MemoryStore::new())
        }
    };

    let redis = RedisPool::new(&RedisConfig::from_env())?;
    let views = Arc::new(RedisViewCache::new(redis, config.view_cache_ttl_secs));

    let sessions = SessionVerifier::from_env()?;
    let state = AppState::new(Services::new(store, views), sessions);

    let app = routes::create_router(state);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("Community service listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
