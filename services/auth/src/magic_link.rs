//! One-time sign-in links
//!
//! A link carries a random token. The pending sign-in it stands for lives in
//! Redis under `magic_link:{token}` until it expires or is consumed; reading
//! it deletes it, so every link works once.

use async_trait::async_trait;
use common::cache::RedisPool;
use rand::{Rng, distributions::Alphanumeric};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::AuthResult;

const KEY_PREFIX: &str = "magic_link:";
const TOKEN_LENGTH: usize = 48;

/// What a sign-in link resolves to once it is used
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingSignIn {
    pub email: String,
    pub name: Option<String>,
    pub callback_url: Option<String>,
}

/// Random URL-safe token for a new link
pub fn generate_token() -> String {
    rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(TOKEN_LENGTH)
        .map(char::from)
        .collect()
}

/// Link the user follows to finish signing in
pub fn sign_in_url(base_url: &str, token: &str) -> String {
    format!("{}/auth/verify?token={}", base_url.trim_end_matches('/'), token)
}

#[async_trait]
pub trait LinkStore: Send + Sync {
    async fn put(&self, token: &str, pending: &PendingSignIn, ttl_seconds: u64) -> AuthResult<()>;

    /// Remove and return the pending sign-in for `token`, if it is still live.
    async fn take(&self, token: &str) -> AuthResult<Option<PendingSignIn>>;
}

pub struct RedisLinkStore {
    redis: RedisPool,
}

impl RedisLinkStore {
    pub fn new(redis: RedisPool) -> Self {
        Self { redis }
    }
}

#[async_trait]
impl LinkStore for RedisLinkStore {
    async fn put(&self, token: &str, pending: &PendingSignIn, ttl_seconds: u64) -> AuthResult<()> {
        let value = serde_json::to_string(pending)?;
        self.redis
            .set(&format!("{KEY_PREFIX}{token}"), &value, Some(ttl_seconds))
            .await?;
        Ok(())
    }

    async fn take(&self, token: &str) -> AuthResult<Option<PendingSignIn>> {
        match self.redis.take(&format!("{KEY_PREFIX}{token}")).await? {
            Some(value) => Ok(Some(serde_json::from_str(&value)?)),
            None => Ok(None),
        }
    }
}

/// Delivers sign-in links
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_sign_in_link(&self, email: &str, url: &str) -> AuthResult<()>;
}

/// Writes links to the log instead of sending mail
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send_sign_in_link(&self, email: &str, url: &str) -> AuthResult<()> {
        info!(email, url, "Sign-in link issued");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    pub struct MemoryLinkStore {
        links: Mutex<HashMap<String, PendingSignIn>>,
    }

    #[async_trait]
    impl LinkStore for MemoryLinkStore {
        async fn put(&self, token: &str, pending: &PendingSignIn, _ttl: u64) -> AuthResult<()> {
            self.links
                .lock()
                .await
                .insert(token.to_string(), pending.clone());
            Ok(())
        }

        async fn take(&self, token: &str) -> AuthResult<Option<PendingSignIn>> {
            Ok(self.links.lock().await.remove(token))
        }
    }

    /// Keeps every link it is asked to send
    #[derive(Default)]
    pub struct OutboxMailer {
        pub sent: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl Mailer for OutboxMailer {
        async fn send_sign_in_link(&self, email: &str, url: &str) -> AuthResult<()> {
            self.sent
                .lock()
                .await
                .push((email.to_string(), url.to_string()));
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::cache::RedisConfig;

    #[test]
    fn test_tokens_are_long_and_distinct() {
        let a = generate_token();
        let b = generate_token();
        assert_eq!(a.len(), TOKEN_LENGTH);
        assert!(a.chars().all(|c| c.is_ascii_alphanumeric()));
        assert_ne!(a, b);
    }

    #[test]
    fn test_sign_in_url() {
        assert_eq!(
            sign_in_url("https://community.example.com/", "abc"),
            "https://community.example.com/auth/verify?token=abc"
        );
    }

    #[tokio::test]
    async fn test_memory_links_are_single_use() {
        let store = testing::MemoryLinkStore::default();
        let pending = PendingSignIn {
            email: "ada@example.com".into(),
            name: None,
            callback_url: Some("/events".into()),
        };
        store.put("t1", &pending, 60).await.unwrap();
        assert_eq!(store.take("t1").await.unwrap(), Some(pending));
        assert_eq!(store.take("t1").await.unwrap(), None);
    }

    #[tokio::test]
    #[ignore = "requires a running Redis"]
    async fn test_redis_links_are_single_use() {
        let redis = RedisPool::new(&RedisConfig::from_env()).unwrap();
        let store = RedisLinkStore::new(redis);
        let token = generate_token();
        let pending = PendingSignIn {
            email: "ada@example.com".into(),
            name: Some("Ada".into()),
            callback_url: None,
        };
        store.put(&token, &pending, 60).await.unwrap();
        assert_eq!(store.take(&token).await.unwrap(), Some(pending));
        assert_eq!(store.take(&token).await.unwrap(), None);
    }
}
