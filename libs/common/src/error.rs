//! Custom error types for the common library
//!
//! Infrastructure failures are typed here so that services can decide which
//! of them surface to callers and which are only logged.

use redis::RedisError;
use sqlx::Error as SqlxError;
use thiserror::Error;

/// Custom error type for database operations
#[derive(Error, Debug)]
pub enum DatabaseError {
    /// Error occurred during database connection
    #[error("Database connection error: {0}")]
    Connection(#[source] SqlxError),

    /// Configuration error
    #[error("Database configuration error: {0}")]
    Configuration(String),
}

/// Type alias for Result with DatabaseError
pub type DatabaseResult<T> = Result<T, DatabaseError>;

/// Error type for Redis operations
#[derive(Error, Debug)]
pub enum CacheError {
    /// The Redis URL could not be parsed or the client could not be built
    #[error("Cache configuration error: {0}")]
    Configuration(#[source] RedisError),

    /// A command failed or the connection dropped
    #[error("Cache command error: {0}")]
    Command(#[from] RedisError),
}

/// Type alias for Result with CacheError
pub type CacheResult<T> = Result<T, CacheError>;

/// Error raised while loading signing or verification keys
#[derive(Error, Debug)]
pub enum KeyError {
    /// The environment variable holding the key (or its path) is not set
    #[error("{0} environment variable not set")]
    Missing(String),

    /// The value looked like a path but the file could not be read
    #[error("Failed to read key file {path}: {source}")]
    Unreadable {
        path: String,
        #[source]
        source: std::io::Error,
    },
}
