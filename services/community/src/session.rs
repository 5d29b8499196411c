//! Session resolution: bearer token in, optional [`Actor`] out.
//!
//! A request without a usable token is anonymous, never an error; the
//! action's policy decides whether anonymous callers may proceed.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::request::Parts,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
};
use common::token::{AccessClaims, load_key};
use jsonwebtoken::{Algorithm, DecodingKey, Validation, decode};
use std::convert::Infallible;
use tracing::{debug, warn};

use crate::roles::Actor;
use crate::state::AppState;
use crate::store::CommunityStore;

/// Verifies access tokens issued by the authentication service
#[derive(Clone)]
pub struct SessionVerifier {
    decoding_key: DecodingKey,
    validation: Validation,
}

impl SessionVerifier {
    pub fn new(public_key_pem: &str) -> anyhow::Result<Self> {
        let decoding_key = DecodingKey::from_rsa_pem(public_key_pem.as_bytes())?;
        let mut validation = Validation::new(Algorithm::RS256);
        validation.validate_exp = true;
        Ok(Self {
            decoding_key,
            validation,
        })
    }

    /// Build from `JWT_PUBLIC_KEY` (PEM text or a path to it).
    pub fn from_env() -> anyhow::Result<Self> {
        Self::new(&load_key("JWT_PUBLIC_KEY")?)
    }

    /// Claims of a valid, unexpired token.
    pub fn verify(&self, token: &str) -> Option<AccessClaims> {
        match decode::<AccessClaims>(token, &self.decoding_key, &self.validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                debug!("Rejected access token: {}", e);
                None
            }
        }
    }
}

/// Resolve the acting user for a bearer token.
///
/// The role comes from the user record, not the token, so a role change
/// applies from the next request on. Unknown users resolve to `None`.
pub async fn resolve_actor(
    verifier: &SessionVerifier,
    store: &dyn CommunityStore,
    token: Option<&str>,
) -> Option<Actor> {
    let claims = verifier.verify(token?)?;
    match store.find_user(claims.sub).await {
        Ok(Some(user)) => Some(Actor::new(user.id, user.role)),
        Ok(None) => {
            debug!(user_id = %claims.sub, "Token subject no longer exists");
            None
        }
        Err(e) => {
            warn!(user_id = %claims.sub, "Failed to load session user: {}", e);
            None
        }
    }
}

/// The caller, if the request carried a valid session
#[derive(Debug, Clone)]
pub struct MaybeActor(pub Option<Actor>);

impl MaybeActor {
    pub fn actor(&self) -> Option<&Actor> {
        self.0.as_ref()
    }
}

#[async_trait]
impl FromRequestParts<AppState> for MaybeActor {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let bearer = TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
            .await
            .ok();
        let token = bearer.as_ref().map(|TypedHeader(auth)| auth.token());
        let actor = resolve_actor(&state.sessions, state.services.store.as_ref(), token).await;
        Ok(MaybeActor(actor))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::users::User;
    use crate::roles::Role;
    use crate::store::memory::MemoryStore;
    use chrono::Utc;
    use jsonwebtoken::{EncodingKey, Header, encode};
    use uuid::Uuid;

    const PRIVATE_KEY: &str = include_str!("../../../testdata/jwt_test_private.pem");
    const PUBLIC_KEY: &str = include_str!("../../../testdata/jwt_test_public.pem");

    fn token_for(sub: Uuid, role: &str, ttl: i64) -> String {
        let now = Utc::now().timestamp();
        let claims = AccessClaims {
            sub,
            role: role.to_string(),
            iat: now as u64,
            exp: (now + ttl) as u64,
        };
        let key = EncodingKey::from_rsa_pem(PRIVATE_KEY.as_bytes()).unwrap();
        encode(&Header::new(Algorithm::RS256), &claims, &key).unwrap()
    }

    async fn store_with(role: Role) -> (MemoryStore, Uuid) {
        let store = MemoryStore::new();
        let now = Utc::now();
        let id = Uuid::new_v4();
        store
            .insert_user(User {
                id,
                name: "Grace".into(),
                email: "grace@example.com".into(),
                image: None,
                role,
                created_at: now,
                updated_at: now,
            })
            .await;
        (store, id)
    }

    #[tokio::test]
    async fn test_role_is_read_from_the_store() {
        let verifier = SessionVerifier::new(PUBLIC_KEY).unwrap();
        let (store, id) = store_with(Role::Admin).await;
        // The token still claims the old role.
        let token = token_for(id, "user", 600);

        let actor = resolve_actor(&verifier, &store, Some(&token)).await.unwrap();
        assert_eq!(actor.id, id);
        assert_eq!(actor.role, Role::Admin);
    }

    #[tokio::test]
    async fn test_missing_or_invalid_tokens_are_anonymous() {
        let verifier = SessionVerifier::new(PUBLIC_KEY).unwrap();
        let (store, id) = store_with(Role::User).await;

        assert!(resolve_actor(&verifier, &store, None).await.is_none());
        assert!(resolve_actor(&verifier, &store, Some("garbage")).await.is_none());

        let expired = token_for(id, "user", -3600);
        assert!(resolve_actor(&verifier, &store, Some(&expired)).await.is_none());
    }

    #[tokio::test]
    async fn test_unknown_subject_is_anonymous() {
        let verifier = SessionVerifier::new(PUBLIC_KEY).unwrap();
        let (store, _) = store_with(Role::User).await;
        let token = token_for(Uuid::new_v4(), "admin", 600);
        assert!(resolve_actor(&verifier, &store, Some(&token)).await.is_none());
    }
}
