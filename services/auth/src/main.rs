use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use common::cache::{RedisConfig, RedisPool};
use common::database::{self, DatabaseConfig};

mod config;
mod error;
mod jwt;
mod magic_link;
mod rate_limiter;
mod routes;
mod users;
mod validation;

use crate::config::{AuthConfig, AuthorizedEmails};
use crate::jwt::{JwtConfig, TokenIssuer};
use crate::magic_link::{LinkStore, LogMailer, Mailer, RedisLinkStore};
use crate::rate_limiter::{RateLimiter, RateLimiterConfig};
use crate::users::{PgUserDirectory, UserDirectory};

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub links: Arc<dyn LinkStore>,
    pub users: Arc<dyn UserDirectory>,
    pub mailer: Arc<dyn Mailer>,
    pub issuer: Arc<TokenIssuer>,
    pub limiter: RateLimiter,
    pub authorized: Arc<AuthorizedEmails>,
    pub config: Arc<AuthConfig>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("Starting authentication service");

    let config = AuthConfig::from_env()?;

    let db_config = DatabaseConfig::from_env()?;
    let pool = database::init_pool(&db_config).await?;
    if database::health_check(&pool).await? {
        info!("Database connection successful");
    } else {
        anyhow::bail!("Failed to connect to database");
    }

    let redis = RedisPool::new(&RedisConfig::from_env())?;
    let issuer = TokenIssuer::new(&JwtConfig::from_env()?)?;

    let state = AppState {
        links: Arc::new(RedisLinkStore::new(redis)),
        users: Arc::new(PgUserDirectory::new(pool)),
        mailer: Arc::new(LogMailer),
        issuer: Arc::new(issuer),
        limiter: RateLimiter::new(RateLimiterConfig {
            max_requests: config.magic_link_max_requests,
            window: Duration::from_secs(config.magic_link_window_secs),
        }),
        authorized: Arc::new(config.authorized_emails()),
        config: Arc::new(config.clone()),
    };

    let app = routes::create_router(state);

    let listener = TcpListener::bind(&config.bind_addr).await?;
    info!("Authentication service listening on {}", config.bind_addr);

    axum::serve(listener, app).await?;

    Ok(())
}
