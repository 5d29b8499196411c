//! User records as seen by the authentication service

use async_trait::async_trait;
use serde::Serialize;
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::error::AuthResult;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    pub role: String,
}

/// Display name used when a new user did not supply one
pub fn default_name(email: &str) -> String {
    email.split('@').next().unwrap_or(email).to_string()
}

#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// Find or create the user for `email` in one step. `superadmin` promotes
    /// the user; otherwise an existing role is left alone.
    async fn sign_in(&self, email: &str, name: &str, superadmin: bool) -> AuthResult<User>;
}

pub struct PgUserDirectory {
    pool: PgPool,
}

impl PgUserDirectory {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl UserDirectory for PgUserDirectory {
    async fn sign_in(&self, email: &str, name: &str, superadmin: bool) -> AuthResult<User> {
        let user = sqlx::query_as::<_, User>(
            r#"
            INSERT INTO users (id, name, email, role)
            VALUES ($1, $2, $3, CASE WHEN $4 THEN 'superadmin' ELSE 'user' END)
            ON CONFLICT (email) DO UPDATE
            SET role = CASE WHEN $4 THEN 'superadmin' ELSE users.role END,
                updated_at = NOW()
            RETURNING id, name, email, image, role
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(name)
        .bind(email)
        .bind(superadmin)
        .fetch_one(&self.pool)
        .await?;

        Ok(user)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use std::collections::HashMap;
    use tokio::sync::Mutex;

    #[derive(Default)]
    pub struct MemoryUserDirectory {
        pub users: Mutex<HashMap<String, User>>,
    }

    #[async_trait]
    impl UserDirectory for MemoryUserDirectory {
        async fn sign_in(&self, email: &str, name: &str, superadmin: bool) -> AuthResult<User> {
            let mut users = self.users.lock().await;
            let user = users.entry(email.to_string()).or_insert_with(|| User {
                id: Uuid::new_v4(),
                name: name.to_string(),
                email: email.to_string(),
                image: None,
                role: "user".to_string(),
            });
            if superadmin {
                user.role = "superadmin".to_string();
            }
            Ok(user.clone())
        }
    }
}
