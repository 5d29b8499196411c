//! Access-token issuing
//!
//! Tokens are RS256-signed [`AccessClaims`]; the community service verifies
//! them with the matching public key.

use chrono::Utc;
use common::error::KeyError;
use common::token::{AccessClaims, load_key};
use jsonwebtoken::{Algorithm, EncodingKey, Header, encode};

use crate::error::AuthResult;
use crate::users::User;

/// JWT configuration
#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// Private key for signing tokens (PEM)
    pub private_key: String,
    /// Access token lifetime in seconds (default: 1 day)
    pub access_token_expiry: u64,
}

impl JwtConfig {
    /// Read `JWT_PRIVATE_KEY` (PEM text or a path to it) and
    /// `JWT_ACCESS_TOKEN_EXPIRY`.
    pub fn from_env() -> Result<Self, KeyError> {
        let private_key = load_key("JWT_PRIVATE_KEY")?;
        let access_token_expiry = std::env::var("JWT_ACCESS_TOKEN_EXPIRY")
            .ok()
            .and_then(|value| value.parse().ok())
            .unwrap_or(86_400);

        Ok(Self {
            private_key,
            access_token_expiry,
        })
    }
}

/// A signed token and its lifetime
#[derive(Debug, Clone)]
pub struct IssuedToken {
    pub access_token: String,
    pub expires_in: u64,
}

/// Signs access tokens for signed-in users
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    expiry: u64,
}

impl TokenIssuer {
    pub fn new(config: &JwtConfig) -> AuthResult<Self> {
        Ok(Self {
            encoding_key: EncodingKey::from_rsa_pem(config.private_key.as_bytes())?,
            expiry: config.access_token_expiry,
        })
    }

    pub fn issue(&self, user: &User) -> AuthResult<IssuedToken> {
        let now = Utc::now().timestamp().max(0) as u64;
        let claims = AccessClaims {
            sub: user.id,
            role: user.role.clone(),
            iat: now,
            exp: now + self.expiry,
        };
        let access_token = encode(&Header::new(Algorithm::RS256), &claims, &self.encoding_key)?;

        Ok(IssuedToken {
            access_token,
            expires_in: self.expiry,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{DecodingKey, Validation, decode};
    use uuid::Uuid;

    const PRIVATE_KEY: &str = include_str!("../../../testdata/jwt_test_private.pem");
    const PUBLIC_KEY: &str = include_str!("../../../testdata/jwt_test_public.pem");

    fn user(role: &str) -> User {
        User {
            id: Uuid::new_v4(),
            name: "Ada".into(),
            email: "ada@example.com".into(),
            image: None,
            role: role.into(),
        }
    }

    #[test]
    fn test_issued_token_verifies_with_public_key() {
        let issuer = TokenIssuer::new(&JwtConfig {
            private_key: PRIVATE_KEY.to_string(),
            access_token_expiry: 600,
        })
        .unwrap();
        let user = user("superadmin");

        let issued = issuer.issue(&user).unwrap();
        assert_eq!(issued.expires_in, 600);

        let key = DecodingKey::from_rsa_pem(PUBLIC_KEY.as_bytes()).unwrap();
        let claims = decode::<AccessClaims>(
            &issued.access_token,
            &key,
            &Validation::new(Algorithm::RS256),
        )
        .unwrap()
        .claims;
        assert_eq!(claims.sub, user.id);
        assert_eq!(claims.role, "superadmin");
        assert_eq!(claims.exp - claims.iat, 600);
    }

    #[test]
    fn test_rejects_malformed_private_key() {
        let result = TokenIssuer::new(&JwtConfig {
            private_key: "not a key".into(),
            access_token_expiry: 600,
        });
        assert!(result.is_err());
    }
}
