//! Persistence seam for the community service
//!
//! Actions only see [`CommunityStore`]. [`postgres::PgStore`] is the durable
//! backend; [`memory::MemoryStore`] backs tests and local runs.

use async_trait::async_trait;
use thiserror::Error;
use uuid::Uuid;

use crate::models::blog::{
    BlogCategory, BlogComment, BlogPost, BlogPostView, NewBlogPost, NewBlogView, NewCategory,
    NewComment, PostStatus, UpdateBlogPost,
};
use crate::models::events::{
    CommunityEvent, EventDetail, NewEvent, RegistrationOutcome, UpdateEvent,
};
use crate::models::governance::{
    CommunityRole, ContributorProfile, NewCommunityRole, NewPermission, Permission,
    UpdateCommunityRole, UpdateContributorProfile, UserRoleAssignment,
};
use crate::models::platform::{
    AuditLog, NewAuditLog, NewNotification, Notification, NotificationPreference, SystemSetting,
    UpdatePreferenceRequest, UpdateSettingRequest,
};
use crate::models::programs::{
    NewProgram, NewProject, Program, ProgramLead, ProgramStatusChange, Project, ProjectMember,
    UpdateProgram, UpdateProject,
};
use crate::models::users::{AuthorProjection, DashboardStats, User};
use crate::roles::Role;

pub mod memory;
pub mod postgres;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Conflict(String),
    #[error("{0}")]
    Database(String),
}

impl From<sqlx::Error> for StoreError {
    fn from(err: sqlx::Error) -> Self {
        match &err {
            sqlx::Error::RowNotFound => StoreError::NotFound("Record not found".to_string()),
            sqlx::Error::Database(db_err) => match db_err.code().as_deref() {
                Some("23505") => StoreError::Conflict(db_err.message().to_string()),
                Some("23503") => StoreError::NotFound("Referenced record not found".to_string()),
                _ => StoreError::Database(err.to_string()),
            },
            _ => StoreError::Database(err.to_string()),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[async_trait]
pub trait CommunityStore: Send + Sync {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>>;
    async fn list_users(&self) -> StoreResult<Vec<User>>;
    async fn update_user_role(&self, id: Uuid, role: Role) -> StoreResult<User>;
    /// Author projections for the given ids; unknown ids are skipped.
    async fn authors(&self, ids: &[Uuid]) -> StoreResult<Vec<AuthorProjection>>;
    async fn dashboard_stats(&self) -> StoreResult<DashboardStats>;

    /// Posts newest first; `None` lists every status.
    async fn list_posts(&self, status: Option<PostStatus>) -> StoreResult<Vec<BlogPostView>>;
    async fn find_post(&self, id: i32) -> StoreResult<Option<BlogPost>>;
    async fn find_post_by_slug(&self, slug: &str) -> StoreResult<Option<BlogPostView>>;
    /// Insert the post and upsert its tags in one transaction.
    async fn create_post(&self, author_id: Uuid, post: NewBlogPost) -> StoreResult<BlogPost>;
    async fn update_post(&self, id: i32, patch: UpdateBlogPost) -> StoreResult<BlogPost>;
    async fn delete_post(&self, id: i32) -> StoreResult<()>;
    async fn list_categories(&self) -> StoreResult<Vec<BlogCategory>>;
    async fn create_category(&self, category: NewCategory) -> StoreResult<BlogCategory>;
    async fn find_comment(&self, id: i32) -> StoreResult<Option<BlogComment>>;
    async fn create_comment(&self, comment: NewComment) -> StoreResult<BlogComment>;
    /// Approved top-level comments of a post, newest first.
    async fn root_comments(&self, post_id: i32) -> StoreResult<Vec<BlogComment>>;
    /// Approved direct replies to any of `parent_ids`, newest first.
    async fn replies_to(&self, parent_ids: &[i32]) -> StoreResult<Vec<BlogComment>>;
    async fn record_view(&self, view: NewBlogView) -> StoreResult<()>;

    /// Events by date descending.
    async fn list_events(&self, published_only: bool) -> StoreResult<Vec<CommunityEvent>>;
    async fn find_event(&self, id: i32) -> StoreResult<Option<CommunityEvent>>;
    async fn find_event_by_slug(&self, slug: &str) -> StoreResult<Option<EventDetail>>;
    async fn create_event(&self, created_by: Uuid, event: NewEvent) -> StoreResult<CommunityEvent>;
    async fn update_event(&self, id: i32, patch: UpdateEvent) -> StoreResult<CommunityEvent>;
    async fn delete_event(&self, id: i32) -> StoreResult<()>;
    /// Atomic register-or-reinstate keyed on `(event_id, user_id)`.
    async fn register_for_event(
        &self,
        event_id: i32,
        user_id: Uuid,
    ) -> StoreResult<RegistrationOutcome>;
    /// Returns whether an active registration was cancelled.
    async fn cancel_registration(&self, event_id: i32, user_id: Uuid) -> StoreResult<bool>;

    async fn list_programs(&self) -> StoreResult<Vec<Program>>;
    async fn find_program(&self, id: i32) -> StoreResult<Option<Program>>;
    async fn find_program_by_slug(&self, slug: &str) -> StoreResult<Option<Program>>;
    async fn create_program(&self, program: NewProgram) -> StoreResult<Program>;
    /// Apply the patch and, when the status changes, append a history row in
    /// the same transaction.
    async fn update_program(
        &self,
        id: i32,
        patch: UpdateProgram,
        changed_by: Uuid,
    ) -> StoreResult<Program>;
    async fn delete_program(&self, id: i32) -> StoreResult<()>;
    async fn program_status_history(&self, program_id: i32)
    -> StoreResult<Vec<ProgramStatusChange>>;
    async fn add_program_lead(&self, program_id: i32, user_id: Uuid) -> StoreResult<ProgramLead>;
    async fn remove_program_lead(&self, program_id: i32, user_id: Uuid) -> StoreResult<bool>;

    async fn list_projects(&self, program_id: Option<i32>) -> StoreResult<Vec<Project>>;
    async fn find_project(&self, id: i32) -> StoreResult<Option<Project>>;
    async fn create_project(&self, project: NewProject) -> StoreResult<Project>;
    async fn update_project(&self, id: i32, patch: UpdateProject) -> StoreResult<Project>;
    async fn delete_project(&self, id: i32) -> StoreResult<()>;
    /// Idempotent; an existing membership is returned unchanged.
    async fn join_project(
        &self,
        project_id: i32,
        user_id: Uuid,
        role: &str,
    ) -> StoreResult<ProjectMember>;
    async fn leave_project(&self, project_id: i32, user_id: Uuid) -> StoreResult<bool>;

    async fn list_roles(&self) -> StoreResult<Vec<CommunityRole>>;
    async fn find_role(&self, id: i32) -> StoreResult<Option<CommunityRole>>;
    async fn create_role(&self, role: NewCommunityRole) -> StoreResult<CommunityRole>;
    async fn update_role(&self, id: i32, patch: UpdateCommunityRole)
    -> StoreResult<CommunityRole>;
    async fn delete_role(&self, id: i32) -> StoreResult<()>;
    async fn list_permissions(&self) -> StoreResult<Vec<Permission>>;
    async fn create_permission(&self, permission: NewPermission) -> StoreResult<Permission>;
    async fn grant_permission(&self, role_id: i32, permission_id: i32) -> StoreResult<()>;
    async fn revoke_permission(&self, role_id: i32, permission_id: i32) -> StoreResult<bool>;
    async fn role_permissions(&self, role_id: i32) -> StoreResult<Vec<Permission>>;
    async fn assign_user_role(
        &self,
        user_id: Uuid,
        role_id: i32,
        assigned_by: Uuid,
    ) -> StoreResult<UserRoleAssignment>;
    async fn remove_user_role(&self, user_id: Uuid, role_id: i32) -> StoreResult<bool>;
    async fn find_contributor_profile(&self, user_id: Uuid)
    -> StoreResult<Option<ContributorProfile>>;
    async fn upsert_contributor_profile(
        &self,
        user_id: Uuid,
        patch: UpdateContributorProfile,
    ) -> StoreResult<ContributorProfile>;

    async fn find_setting(&self, key: &str) -> StoreResult<Option<SystemSetting>>;
    async fn upsert_setting(
        &self,
        key: &str,
        update: UpdateSettingRequest,
        updated_by: Uuid,
    ) -> StoreResult<SystemSetting>;
    async fn list_notifications(&self, user_id: Uuid) -> StoreResult<Vec<Notification>>;
    async fn create_notification(&self, notification: NewNotification)
    -> StoreResult<Notification>;
    /// Marks the notification read if it belongs to `user_id`; returns whether
    /// it was found.
    async fn mark_notification_read(&self, id: i32, user_id: Uuid) -> StoreResult<bool>;
    async fn mark_all_notifications_read(&self, user_id: Uuid) -> StoreResult<u64>;
    async fn list_preferences(&self, user_id: Uuid) -> StoreResult<Vec<NotificationPreference>>;
    async fn upsert_preference(
        &self,
        user_id: Uuid,
        preference: UpdatePreferenceRequest,
    ) -> StoreResult<NotificationPreference>;
    async fn insert_audit_log(&self, entry: NewAuditLog) -> StoreResult<()>;
    async fn list_audit_logs(&self, limit: i64) -> StoreResult<Vec<AuditLog>>;

    async fn health_check(&self) -> StoreResult<()>;
    fn backend_name(&self) -> &'static str;
}
