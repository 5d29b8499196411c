//! Community roles, permissions and contributor profiles

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::ActionResult;
use crate::validation::Validator;

/// A named community role; distinct from the platform [`crate::roles::Role`]
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct CommunityRole {
    pub id: i32,
    pub name: String,
    pub description: Option<String>,
    pub is_system: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCommunityRole {
    pub name: String,
    pub description: Option<String>,
}

impl NewCommunityRole {
    pub fn validate(&self) -> ActionResult<()> {
        Validator::new()
            .required("name", &self.name, 80)
            .optional("description", self.description.as_deref(), 500)
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateCommunityRole {
    pub name: Option<String>,
    pub description: Option<String>,
}

impl UpdateCommunityRole {
    pub fn validate(&self) -> ActionResult<()> {
        Validator::new()
            .optional("name", self.name.as_deref(), 80)
            .optional("description", self.description.as_deref(), 500)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Permission {
    pub id: i32,
    pub code: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewPermission {
    pub code: String,
    pub description: Option<String>,
}

impl NewPermission {
    pub fn validate(&self) -> ActionResult<()> {
        Validator::new()
            .required("code", &self.code, 100)
            .key("code", &self.code)
            .optional("description", self.description.as_deref(), 500)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserRoleAssignment {
    pub user_id: Uuid,
    pub role_id: i32,
    pub assigned_at: DateTime<Utc>,
    pub assigned_by: Option<Uuid>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ContributorProfile {
    pub id: i32,
    pub user_id: Uuid,
    pub bio: Option<String>,
    pub skills: Vec<String>,
    pub github_profile: Option<String>,
    pub linkedin_profile: Option<String>,
    pub website: Option<String>,
    pub contribution_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateContributorProfile {
    pub bio: Option<String>,
    pub skills: Option<Vec<String>>,
    pub github_profile: Option<String>,
    pub linkedin_profile: Option<String>,
    pub website: Option<String>,
}

impl UpdateContributorProfile {
    pub fn validate(&self) -> ActionResult<()> {
        let mut v = Validator::new();
        v.optional("bio", self.bio.as_deref(), 2_000)
            .url("github_profile", self.github_profile.as_deref())
            .url("linkedin_profile", self.linkedin_profile.as_deref())
            .url("website", self.website.as_deref());
        for skill in self.skills.iter().flatten() {
            v.required("skills", skill, 50);
        }
        v.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permission_code_must_be_identifier() {
        let ok = NewPermission {
            code: "blog:publish".into(),
            description: None,
        };
        assert!(ok.validate().is_ok());

        let bad = NewPermission {
            code: "Blog Publish".into(),
            description: None,
        };
        assert!(bad.validate().is_err());
    }

    #[test]
    fn test_profile_rejects_non_http_links() {
        let patch = UpdateContributorProfile {
            github_profile: Some("ftp://example.com".into()),
            ..Default::default()
        };
        assert!(patch.validate().is_err());
    }
}
