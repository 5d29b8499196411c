//! User records as seen by the community service

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::roles::Role;

/// User entity; rows are created by the authentication service
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub image: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: Role,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public projection of a user shown next to content they wrote
#[derive(Debug, Clone, PartialEq, Eq, Serialize, FromRow)]
pub struct AuthorProjection {
    pub id: Uuid,
    pub name: String,
    pub avatar_url: Option<String>,
}

impl From<&User> for AuthorProjection {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            name: user.name.clone(),
            avatar_url: user.image.clone(),
        }
    }
}

/// Request to change a user's platform role
#[derive(Debug, Clone, Deserialize)]
pub struct UpdateUserRoleRequest {
    pub role: String,
}

/// Entity counts for the admin dashboard
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, FromRow)]
pub struct DashboardStats {
    pub posts: i64,
    pub published_posts: i64,
    pub events: i64,
    pub programs: i64,
    pub users: i64,
}
