//! Programs, the projects under them, leads and members

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::ActionResult;
use crate::validation::Validator;

/// Lifecycle shared by programs and projects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "program_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ProgramStatus {
    Active,
    Completed,
    OnHold,
    Cancelled,
    #[default]
    Draft,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Program {
    pub id: i32,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub status: ProgramStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProgram {
    pub title: String,
    pub slug: String,
    pub description: String,
    #[serde(default)]
    pub status: ProgramStatus,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
}

fn dates_ordered(start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> bool {
    match (start, end) {
        (Some(start), Some(end)) => end >= start,
        _ => true,
    }
}

impl NewProgram {
    pub fn validate(&self) -> ActionResult<()> {
        Validator::new()
            .required("title", &self.title, 200)
            .slug("slug", &self.slug)
            .required("description", &self.description, 20_000)
            .check(
                dates_ordered(self.start_date, self.end_date),
                "end_date",
                "End date must not precede start date",
            )
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProgram {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub status: Option<ProgramStatus>,
    pub start_date: Option<DateTime<Utc>>,
    pub end_date: Option<DateTime<Utc>>,
    /// Recorded in the status history when `status` changes
    pub status_reason: Option<String>,
}

impl UpdateProgram {
    pub fn validate(&self, current: &Program) -> ActionResult<()> {
        Validator::new()
            .optional("title", self.title.as_deref(), 200)
            .optional_slug("slug", self.slug.as_deref())
            .optional("description", self.description.as_deref(), 20_000)
            .optional("status_reason", self.status_reason.as_deref(), 500)
            .check(
                dates_ordered(
                    self.start_date.or(current.start_date),
                    self.end_date.or(current.end_date),
                ),
                "end_date",
                "End date must not precede start date",
            )
            .finish()
    }

    /// The new status, if this patch changes it.
    pub fn status_change(&self, current: &Program) -> Option<ProgramStatus> {
        self.status.filter(|status| *status != current.status)
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProgramStatusChange {
    pub id: i32,
    pub program_id: i32,
    pub status: ProgramStatus,
    pub changed_by: Option<Uuid>,
    pub reason: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProgramLead {
    pub program_id: i32,
    pub user_id: Uuid,
    pub assigned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct Project {
    pub id: i32,
    pub program_id: Option<i32>,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub repository_url: Option<String>,
    pub status: ProgramStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewProject {
    pub program_id: Option<i32>,
    pub title: String,
    pub slug: String,
    pub description: String,
    pub repository_url: Option<String>,
    #[serde(default)]
    pub status: ProgramStatus,
}

impl NewProject {
    pub fn validate(&self) -> ActionResult<()> {
        Validator::new()
            .required("title", &self.title, 200)
            .slug("slug", &self.slug)
            .required("description", &self.description, 20_000)
            .url("repository_url", self.repository_url.as_deref())
            .finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateProject {
    pub program_id: Option<i32>,
    pub title: Option<String>,
    pub slug: Option<String>,
    pub description: Option<String>,
    pub repository_url: Option<String>,
    pub status: Option<ProgramStatus>,
}

impl UpdateProject {
    pub fn validate(&self) -> ActionResult<()> {
        Validator::new()
            .optional("title", self.title.as_deref(), 200)
            .optional_slug("slug", self.slug.as_deref())
            .optional("description", self.description.as_deref(), 20_000)
            .url("repository_url", self.repository_url.as_deref())
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct ProjectMember {
    pub project_id: i32,
    pub user_id: Uuid,
    pub role: String,
    pub joined_at: DateTime<Utc>,
}

pub const DEFAULT_MEMBER_ROLE: &str = "contributor";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct JoinProjectRequest {
    pub role: Option<String>,
}
