//! Service configuration
//!
//! Read from an optional `config/community.toml`, then from `COMMUNITY_*`
//! environment variables. Database, Redis and key settings keep their own
//! `from_env` constructors in `common`.

use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,

    /// `postgres` for production, `memory` for local runs without a database
    #[serde(default = "default_store_backend")]
    pub store_backend: StoreBackend,

    /// Lifetime of a cached public view when nothing invalidates it
    #[serde(default = "default_view_cache_ttl_secs")]
    pub view_cache_ttl_secs: u64,

    /// Skip applying migrations at start-up
    #[serde(default)]
    pub skip_migrations: bool,
}

fn default_bind_addr() -> String {
    "0.0.0.0:3001".to_string()
}

fn default_store_backend() -> StoreBackend {
    StoreBackend::Postgres
}

fn default_view_cache_ttl_secs() -> u64 {
    300
}

impl ServiceConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(File::with_name("config/community").required(false))
            .add_source(Environment::with_prefix("COMMUNITY"))
            .build()?
            .try_deserialize()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    fn clear() {
        for var in [
            "COMMUNITY_BIND_ADDR",
            "COMMUNITY_STORE_BACKEND",
            "COMMUNITY_VIEW_CACHE_TTL_SECS",
            "COMMUNITY_SKIP_MIGRATIONS",
        ] {
            unsafe { std::env::remove_var(var) };
        }
    }

    #[test]
    #[serial]
    fn test_defaults() {
        clear();
        let config = ServiceConfig::load().unwrap();
        assert_eq!(config.bind_addr, "0.0.0.0:3001");
        assert_eq!(config.store_backend, StoreBackend::Postgres);
        assert_eq!(config.view_cache_ttl_secs, 300);
        assert!(!config.skip_migrations);
    }

    #[test]
    #[serial]
    fn test_environment_overrides() {
        clear();
        unsafe {
            std::env::set_var("COMMUNITY_BIND_ADDR", "127.0.0.1:8080");
            std::env::set_var("COMMUNITY_STORE_BACKEND", "memory");
            std::env::set_var("COMMUNITY_VIEW_CACHE_TTL_SECS", "60");
        }

        let config = ServiceConfig::load().unwrap();
        assert_eq!(config.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.view_cache_ttl_secs, 60);
        clear();
    }
}
