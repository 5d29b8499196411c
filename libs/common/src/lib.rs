//! Common library for the community platform
//!
//! This crate provides the infrastructure shared by the community and
//! authentication services: PostgreSQL pooling, the Redis client wrapper
//! used for the view cache and one-time sign-in tokens, and the error types
//! those layers raise.
//!
//! ```rust,no_run
//! use common::database::{DatabaseConfig, init_pool, health_check};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = DatabaseConfig::from_env()?;
//!     let pool = init_pool(&config).await?;
//!     println!("Database reachable: {}", health_check(&pool).await?);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod database;
pub mod error;
pub mod token;
