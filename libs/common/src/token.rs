//! Access-token claims shared by the services
//!
//! The authentication service signs these claims with its RSA private key;
//! the community service verifies them with the matching public key.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use uuid::Uuid;

use crate::error::KeyError;

/// Claims carried by every access token
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User ID
    pub sub: Uuid,
    /// Platform role at issue time; services re-read it from the store
    pub role: String,
    /// Issued at (seconds since the epoch)
    pub iat: u64,
    /// Expiration (seconds since the epoch)
    pub exp: u64,
}

/// Load PEM key material from the environment variable `var`.
///
/// The variable holds either the PEM text itself or a path to it. Relative
/// paths are tried against the working directory first, then the workspace
/// root.
pub fn load_key(var: &str) -> Result<String, KeyError> {
    let value = std::env::var(var).map_err(|_| KeyError::Missing(var.to_string()))?;
    if value.trim_start().starts_with("-----BEGIN") {
        return Ok(value);
    }

    std::fs::read_to_string(&value)
        .or_else(|_| {
            let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));
            path.push("../..");
            path.push(&value);
            std::fs::read_to_string(path)
        })
        .map(|pem| pem.trim().to_string())
        .map_err(|source| KeyError::Unreadable {
            path: value,
            source,
        })
}
