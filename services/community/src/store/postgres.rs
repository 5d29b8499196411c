//! Postgres implementation of [`CommunityStore`].
//!
//! Find-or-create flows are single `INSERT ... ON CONFLICT` statements, so
//! concurrent callers cannot race each other into duplicates. Writes that
//! touch several tables (a post and its tags, a program and its status
//! history) run inside one transaction.

use async_trait::async_trait;
use sqlx::{PgPool, Postgres, Transaction};
use std::collections::HashMap;
use tracing::{debug, info};
use uuid::Uuid;

use super::{CommunityStore, StoreError, StoreResult};
use crate::models::blog::{
    BlogCategory, BlogComment, BlogPost, BlogPostView, NewBlogPost, NewBlogView, NewCategory,
    NewComment, PostStatus, UpdateBlogPost,
};
use crate::models::events::{
    CommunityEvent, EventDetail, EventSession, EventSpeaker, EventSponsor, NewEvent,
    RegistrationOutcome, UpdateEvent,
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
use crate::validation::slugify;

fn missing(what: &str) -> StoreError {
    StoreError::NotFound(format!("{what} not found"))
}

fn deleted(rows: u64, what: &str) -> StoreResult<()> {
    if rows == 0 {
        Err(missing(what))
    } else {
        Ok(())
    }
}

/// Durable store backed by a `PgPool`
#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Apply the embedded schema migrations.
    pub async fn migrate(&self) -> StoreResult<()> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| StoreError::Database(e.to_string()))?;
        info!("Database migrations applied");
        Ok(())
    }

    /// Attach authors, categories and tags to a batch of posts.
    async fn hydrate(&self, posts: Vec<BlogPost>) -> StoreResult<Vec<BlogPostView>> {
        if posts.is_empty() {
            return Ok(Vec::new());
        }
        let author_ids: Vec<Uuid> = posts.iter().map(|p| p.author_id).collect();
        let post_ids: Vec<i32> = posts.iter().map(|p| p.id).collect();
        let category_ids: Vec<i32> = posts.iter().filter_map(|p| p.category_id).collect();

        let authors: HashMap<Uuid, AuthorProjection> = self
            .authors(&author_ids)
            .await?
            .into_iter()
            .map(|author| (author.id, author))
            .collect();

        let categories: HashMap<i32, BlogCategory> =
            sqlx::query_as::<_, BlogCategory>("SELECT * FROM blog_categories WHERE id = ANY($1)")
                .bind(&category_ids)
                .fetch_all(&self.pool)
                .await?
                .into_iter()
                .map(|category| (category.id, category))
                .collect();

        let tag_rows: Vec<(i32, String)> = sqlx::query_as(
            r#"
            SELECT pt.post_id, t.name
            FROM blog_post_tags pt
            JOIN blog_tags t ON t.id = pt.tag_id
            WHERE pt.post_id = ANY($1)
            ORDER BY t.name
            "#,
        )
        .bind(&post_ids)
        .fetch_all(&self.pool)
        .await?;
        let mut tags: HashMap<i32, Vec<String>> = HashMap::new();
        for (post_id, name) in tag_rows {
            tags.entry(post_id).or_default().push(name);
        }

        Ok(posts
            .into_iter()
            .map(|post| BlogPostView {
                author: authors.get(&post.author_id).cloned(),
                category: post.category_id.and_then(|id| categories.get(&id).cloned()),
                tags: tags.remove(&post.id).unwrap_or_default(),
                post,
            })
            .collect())
    }

    async fn attach_tags(
        tx: &mut Transaction<'_, Postgres>,
        post_id: i32,
        tags: &[String],
    ) -> StoreResult<()> {
        for tag in tags {
            let name = tag.trim();
            let tag_id: i32 = sqlx::query_scalar(
                r#"
                INSERT INTO blog_tags (name, slug)
                VALUES ($1, $2)
                ON CONFLICT (slug) DO UPDATE SET slug = EXCLUDED.slug
                RETURNING id
                "#,
            )
            .bind(name)
            .bind(slugify(name))
            .fetch_one(&mut **tx)
            .await?;

            sqlx::query(
                "INSERT INTO blog_post_tags (post_id, tag_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
            )
            .bind(post_id)
            .bind(tag_id)
            .execute(&mut **tx)
            .await?;
        }
        Ok(())
    }
}

#[async_trait]
impl CommunityStore for PgStore {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(user)
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let users = sqlx::query_as::<_, User>("SELECT * FROM users ORDER BY created_at DESC")
            .fetch_all(&self.pool)
            .await?;
        Ok(users)
    }

    async fn update_user_role(&self, id: Uuid, role: Role) -> StoreResult<User> {
        sqlx::query_as::<_, User>(
            "UPDATE users SET role = $2, updated_at = NOW() WHERE id = $1 RETURNING *",
        )
        .bind(id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| missing("User"))
    }

    async fn authors(&self, ids: &[Uuid]) -> StoreResult<Vec<AuthorProjection>> {
        let authors = sqlx::query_as::<_, AuthorProjection>(
            "SELECT id, name, image AS avatar_url FROM users WHERE id = ANY($1)",
        )
        .bind(ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(authors)
    }

    async fn dashboard_stats(&self) -> StoreResult<DashboardStats> {
        let stats = sqlx::query_as::<_, DashboardStats>(
            r#"
            SELECT
                (SELECT COUNT(*) FROM blog_posts) AS posts,
                (SELECT COUNT(*) FROM blog_posts WHERE status = 'published') AS published_posts,
                (SELECT COUNT(*) FROM community_events) AS events,
                (SELECT COUNT(*) FROM community_programs) AS programs,
                (SELECT COUNT(*) FROM users) AS users
            "#,
        )
        .fetch_one(&self.pool)
        .await?;
        Ok(stats)
    }

    async fn list_posts(&self, status: Option<PostStatus>) -> StoreResult<Vec<BlogPostView>> {
        let posts = sqlx::query_as::<_, BlogPost>(
            r#"
            SELECT * FROM blog_posts
            WHERE $1::blog_post_status IS NULL OR status = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(status)
        .fetch_all(&self.pool)
        .await?;
        self.hydrate(posts).await
    }

    async fn find_post(&self, id: i32) -> StoreResult<Option<BlogPost>> {
        let post = sqlx::query_as::<_, BlogPost>("SELECT * FROM blog_posts WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(post)
    }

    async fn find_post_by_slug(&self, slug: &str) -> StoreResult<Option<BlogPostView>> {
        let post = sqlx::query_as::<_, BlogPost>("SELECT * FROM blog_posts WHERE slug = $1")
            .bind(slug)
            .fetch_optional(&self.pool)
            .await?;
        match post {
            Some(post) => Ok(self.hydrate(vec![post]).await?.pop()),
            None => Ok(None),
        }
    }

    async fn create_post(&self, author_id: Uuid, post: NewBlogPost) -> StoreResult<BlogPost> {
        let mut tx = self.pool.begin().await?;
        let status = post.status.unwrap_or(PostStatus::Draft);
        let row = sqlx::query_as::<_, BlogPost>(
            r#"
            INSERT INTO blog_posts
                (author_id, category_id, title, slug, content, excerpt, cover_image_url,
                 status, published_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8,
                    CASE WHEN $8 = 'published'::blog_post_status THEN NOW() END)
            RETURNING *
            "#,
        )
        .bind(author_id)
        .bind(post.category_id)
        .bind(&post.title)
        .bind(&post.slug)
        .bind(&post.content)
        .bind(&post.excerpt)
        .bind(&post.cover_image_url)
        .bind(status)
        .fetch_one(&mut *tx)
        .await?;

        Self::attach_tags(&mut tx, row.id, &post.tags).await?;
        tx.commit().await?;
        debug!(post_id = row.id, tags = post.tags.len(), "Blog post inserted");
        Ok(row)
    }

    async fn update_post(&self, id: i32, patch: UpdateBlogPost) -> StoreResult<BlogPost> {
        sqlx::query_as::<_, BlogPost>(
            r#"
            UPDATE blog_posts SET
                title = COALESCE($2, title),
                slug = COALESCE($3, slug),
                content = COALESCE($4, content),
                excerpt = COALESCE($5, excerpt),
                cover_image_url = COALESCE($6, cover_image_url),
                category_id = COALESCE($7, category_id),
                status = COALESCE($8, status),
                published_at = CASE
                    WHEN COALESCE($8, status) = 'published' AND published_at IS NULL THEN NOW()
                    ELSE published_at
                END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.title)
        .bind(patch.slug)
        .bind(patch.content)
        .bind(patch.excerpt)
        .bind(patch.cover_image_url)
        .bind(patch.category_id)
        .bind(patch.status)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| missing("Post"))
    }

    async fn delete_post(&self, id: i32) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM blog_posts WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        deleted(result.rows_affected(), "Post")
    }

    async fn list_categories(&self) -> StoreResult<Vec<BlogCategory>> {
        let categories =
            sqlx::query_as::<_, BlogCategory>("SELECT * FROM blog_categories ORDER BY name")
                .fetch_all(&self.pool)
                .await?;
        Ok(categories)
    }

    async fn create_category(&self, category: NewCategory) -> StoreResult<BlogCategory> {
        let row = sqlx::query_as::<_, BlogCategory>(
            "INSERT INTO blog_categories (name, slug, description) VALUES ($1, $2, $3) RETURNING *",
        )
        .bind(category.name)
        .bind(category.slug)
        .bind(category.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn find_comment(&self, id: i32) -> StoreResult<Option<BlogComment>> {
        let comment = sqlx::query_as::<_, BlogComment>("SELECT * FROM blog_comments WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(comment)
    }

    async fn create_comment(&self, comment: NewComment) -> StoreResult<BlogComment> {
        let row = sqlx::query_as::<_, BlogComment>(
            r#"
            INSERT INTO blog_comments (post_id, user_id, parent_id, content)
            VALUES ($1, $2, $3, $4)
            RETURNING *
            "#,
        )
        .bind(comment.post_id)
        .bind(comment.user_id)
        .bind(comment.parent_id)
        .bind(comment.content)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn root_comments(&self, post_id: i32) -> StoreResult<Vec<BlogComment>> {
        let comments = sqlx::query_as::<_, BlogComment>(
            r#"
            SELECT * FROM blog_comments
            WHERE post_id = $1 AND parent_id IS NULL AND is_approved
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(post_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn replies_to(&self, parent_ids: &[i32]) -> StoreResult<Vec<BlogComment>> {
        let comments = sqlx::query_as::<_, BlogComment>(
            r#"
            SELECT * FROM blog_comments
            WHERE parent_id = ANY($1) AND is_approved
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(parent_ids)
        .fetch_all(&self.pool)
        .await?;
        Ok(comments)
    }

    async fn record_view(&self, view: NewBlogView) -> StoreResult<()> {
        sqlx::query(
            "INSERT INTO blog_views (post_id, user_id, ip_address, user_agent) VALUES ($1, $2, $3, $4)",
        )
        .bind(view.post_id)
        .bind(view.user_id)
        .bind(view.ip_address)
        .bind(view.user_agent)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_events(&self, published_only: bool) -> StoreResult<Vec<CommunityEvent>> {
        let events = sqlx::query_as::<_, CommunityEvent>(
            r#"
            SELECT * FROM community_events
            WHERE NOT $1 OR published
            ORDER BY date DESC, id DESC
            "#,
        )
        .bind(published_only)
        .fetch_all(&self.pool)
        .await?;
        Ok(events)
    }

    async fn find_event(&self, id: i32) -> StoreResult<Option<CommunityEvent>> {
        let event = sqlx::query_as::<_, CommunityEvent>("SELECT * FROM community_events WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(event)
    }

    async fn find_event_by_slug(&self, slug: &str) -> StoreResult<Option<EventDetail>> {
        let Some(event) =
            sqlx::query_as::<_, CommunityEvent>("SELECT * FROM community_events WHERE slug = $1")
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?
        else {
            return Ok(None);
        };

        let sessions = sqlx::query_as::<_, EventSession>(
            "SELECT * FROM event_sessions WHERE event_id = $1 ORDER BY start_at",
        )
        .bind(event.id)
        .fetch_all(&self.pool)
        .await?;
        let speakers = sqlx::query_as::<_, EventSpeaker>(
            "SELECT * FROM event_speakers WHERE event_id = $1 ORDER BY name",
        )
        .bind(event.id)
        .fetch_all(&self.pool)
        .await?;
        let sponsors = sqlx::query_as::<_, EventSponsor>(
            "SELECT * FROM event_sponsors WHERE event_id = $1 ORDER BY name",
        )
        .bind(event.id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(EventDetail {
            event,
            sessions,
            speakers,
            sponsors,
        }))
    }

    async fn create_event(&self, created_by: Uuid, event: NewEvent) -> StoreResult<CommunityEvent> {
        let row = sqlx::query_as::<_, CommunityEvent>(
            r#"
            INSERT INTO community_events
                (created_by, title, description, slug, date, capacity, registration_required,
                 start_at, end_at, timezone, visibility, cover_image_url, published, location,
                 location_type, flagship)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
            RETURNING *
            "#,
        )
        .bind(created_by)
        .bind(event.title)
        .bind(event.description)
        .bind(event.slug)
        .bind(event.date)
        .bind(event.capacity)
        .bind(event.registration_required)
        .bind(event.start_at)
        .bind(event.end_at)
        .bind(event.timezone)
        .bind(event.visibility)
        .bind(event.cover_image_url)
        .bind(event.published)
        .bind(event.location)
        .bind(event.location_type)
        .bind(event.flagship)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_event(&self, id: i32, patch: UpdateEvent) -> StoreResult<CommunityEvent> {
        sqlx::query_as::<_, CommunityEvent>(
            r#"
            UPDATE community_events SET
                title = COALESCE($2, title),
                description = COALESCE($3, description),
                slug = COALESCE($4, slug),
                date = COALESCE($5, date),
                capacity = COALESCE($6, capacity),
                registration_required = COALESCE($7, registration_required),
                start_at = COALESCE($8, start_at),
                end_at = COALESCE($9, end_at),
                timezone = COALESCE($10, timezone),
                cancelled = COALESCE($11, cancelled),
                visibility = COALESCE($12, visibility),
                cover_image_url = COALESCE($13, cover_image_url),
                published = COALESCE($14, published),
                location = COALESCE($15, location),
                location_type = COALESCE($16, location_type),
                flagship = COALESCE($17, flagship),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.title)
        .bind(patch.description)
        .bind(patch.slug)
        .bind(patch.date)
        .bind(patch.capacity)
        .bind(patch.registration_required)
        .bind(patch.start_at)
        .bind(patch.end_at)
        .bind(patch.timezone)
        .bind(patch.cancelled)
        .bind(patch.visibility)
        .bind(patch.cover_image_url)
        .bind(patch.published)
        .bind(patch.location)
        .bind(patch.location_type)
        .bind(patch.flagship)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| missing("Event"))
    }

    async fn delete_event(&self, id: i32) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM community_events WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        deleted(result.rows_affected(), "Event")
    }

    async fn register_for_event(
        &self,
        event_id: i32,
        user_id: Uuid,
    ) -> StoreResult<RegistrationOutcome> {
        // No row comes back when an active registration already exists.
        let inserted: Option<bool> = sqlx::query_scalar(
            r#"
            INSERT INTO community_event_registrations (event_id, user_id, status)
            VALUES ($1, $2, 'confirmed')
            ON CONFLICT (event_id, user_id) DO UPDATE
                SET status = 'confirmed', registered_at = NOW()
                WHERE community_event_registrations.status = 'cancelled'
            RETURNING (xmax = 0) AS inserted
            "#,
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(match inserted {
            Some(true) => RegistrationOutcome::Registered,
            Some(false) => RegistrationOutcome::Reinstated,
            None => RegistrationOutcome::AlreadyRegistered,
        })
    }

    async fn cancel_registration(&self, event_id: i32, user_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            r#"
            UPDATE community_event_registrations
            SET status = 'cancelled'
            WHERE event_id = $1 AND user_id = $2 AND status <> 'cancelled'
            "#,
        )
        .bind(event_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_programs(&self) -> StoreResult<Vec<Program>> {
        let programs = sqlx::query_as::<_, Program>(
            "SELECT * FROM community_programs ORDER BY created_at DESC, id DESC",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(programs)
    }

    async fn find_program(&self, id: i32) -> StoreResult<Option<Program>> {
        let program = sqlx::query_as::<_, Program>("SELECT * FROM community_programs WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(program)
    }

    async fn find_program_by_slug(&self, slug: &str) -> StoreResult<Option<Program>> {
        let program =
            sqlx::query_as::<_, Program>("SELECT * FROM community_programs WHERE slug = $1")
                .bind(slug)
                .fetch_optional(&self.pool)
                .await?;
        Ok(program)
    }

    async fn create_program(&self, program: NewProgram) -> StoreResult<Program> {
        let row = sqlx::query_as::<_, Program>(
            r#"
            INSERT INTO community_programs (title, slug, description, status, start_date, end_date)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(program.title)
        .bind(program.slug)
        .bind(program.description)
        .bind(program.status)
        .bind(program.start_date)
        .bind(program.end_date)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_program(
        &self,
        id: i32,
        patch: UpdateProgram,
        changed_by: Uuid,
    ) -> StoreResult<Program> {
        let mut tx = self.pool.begin().await?;
        let current = sqlx::query_as::<_, Program>(
            "SELECT * FROM community_programs WHERE id = $1 FOR UPDATE",
        )
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or_else(|| missing("Program"))?;
        let status_change = patch.status_change(&current);

        let updated = sqlx::query_as::<_, Program>(
            r#"
            UPDATE community_programs SET
                title = COALESCE($2, title),
                slug = COALESCE($3, slug),
                description = COALESCE($4, description),
                status = COALESCE($5, status),
                start_date = COALESCE($6, start_date),
                end_date = COALESCE($7, end_date),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.title)
        .bind(patch.slug)
        .bind(patch.description)
        .bind(patch.status)
        .bind(patch.start_date)
        .bind(patch.end_date)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(status) = status_change {
            sqlx::query(
                r#"
                INSERT INTO community_program_status_history (program_id, status, changed_by, reason)
                VALUES ($1, $2, $3, $4)
                "#,
            )
            .bind(id)
            .bind(status)
            .bind(changed_by)
            .bind(patch.status_reason)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(updated)
    }

    async fn delete_program(&self, id: i32) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM community_programs WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        deleted(result.rows_affected(), "Program")
    }

    async fn program_status_history(
        &self,
        program_id: i32,
    ) -> StoreResult<Vec<ProgramStatusChange>> {
        let history = sqlx::query_as::<_, ProgramStatusChange>(
            r#"
            SELECT * FROM community_program_status_history
            WHERE program_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(program_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(history)
    }

    async fn add_program_lead(&self, program_id: i32, user_id: Uuid) -> StoreResult<ProgramLead> {
        let lead = sqlx::query_as::<_, ProgramLead>(
            r#"
            INSERT INTO community_program_leads (program_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (program_id, user_id) DO UPDATE SET program_id = EXCLUDED.program_id
            RETURNING *
            "#,
        )
        .bind(program_id)
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;
        Ok(lead)
    }

    async fn remove_program_lead(&self, program_id: i32, user_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            "DELETE FROM community_program_leads WHERE program_id = $1 AND user_id = $2",
        )
        .bind(program_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_projects(&self, program_id: Option<i32>) -> StoreResult<Vec<Project>> {
        let projects = sqlx::query_as::<_, Project>(
            r#"
            SELECT * FROM community_projects
            WHERE $1::INTEGER IS NULL OR program_id = $1
            ORDER BY created_at DESC, id DESC
            "#,
        )
        .bind(program_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(projects)
    }

    async fn find_project(&self, id: i32) -> StoreResult<Option<Project>> {
        let project = sqlx::query_as::<_, Project>("SELECT * FROM community_projects WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(project)
    }

    async fn create_project(&self, project: NewProject) -> StoreResult<Project> {
        let row = sqlx::query_as::<_, Project>(
            r#"
            INSERT INTO community_projects
                (program_id, title, slug, description, repository_url, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING *
            "#,
        )
        .bind(project.program_id)
        .bind(project.title)
        .bind(project.slug)
        .bind(project.description)
        .bind(project.repository_url)
        .bind(project.status)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_project(&self, id: i32, patch: UpdateProject) -> StoreResult<Project> {
        sqlx::query_as::<_, Project>(
            r#"
            UPDATE community_projects SET
                program_id = COALESCE($2, program_id),
                title = COALESCE($3, title),
                slug = COALESCE($4, slug),
                description = COALESCE($5, description),
                repository_url = COALESCE($6, repository_url),
                status = COALESCE($7, status),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.program_id)
        .bind(patch.title)
        .bind(patch.slug)
        .bind(patch.description)
        .bind(patch.repository_url)
        .bind(patch.status)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| missing("Project"))
    }

    async fn delete_project(&self, id: i32) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM community_projects WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        deleted(result.rows_affected(), "Project")
    }

    async fn join_project(
        &self,
        project_id: i32,
        user_id: Uuid,
        role: &str,
    ) -> StoreResult<ProjectMember> {
        let member = sqlx::query_as::<_, ProjectMember>(
            r#"
            INSERT INTO community_project_members (project_id, user_id, role)
            VALUES ($1, $2, $3)
            ON CONFLICT (project_id, user_id) DO UPDATE SET project_id = EXCLUDED.project_id
            RETURNING *
            "#,
        )
        .bind(project_id)
        .bind(user_id)
        .bind(role)
        .fetch_one(&self.pool)
        .await?;
        Ok(member)
    }

    async fn leave_project(&self, project_id: i32, user_id: Uuid) -> StoreResult<bool> {
        let result = sqlx::query(
            "DELETE FROM community_project_members WHERE project_id = $1 AND user_id = $2",
        )
        .bind(project_id)
        .bind(user_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_roles(&self) -> StoreResult<Vec<CommunityRole>> {
        let roles = sqlx::query_as::<_, CommunityRole>("SELECT * FROM community_roles ORDER BY name")
            .fetch_all(&self.pool)
            .await?;
        Ok(roles)
    }

    async fn find_role(&self, id: i32) -> StoreResult<Option<CommunityRole>> {
        let role = sqlx::query_as::<_, CommunityRole>("SELECT * FROM community_roles WHERE id = $1")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        Ok(role)
    }

    async fn create_role(&self, role: NewCommunityRole) -> StoreResult<CommunityRole> {
        let row = sqlx::query_as::<_, CommunityRole>(
            "INSERT INTO community_roles (name, description) VALUES ($1, $2) RETURNING *",
        )
        .bind(role.name)
        .bind(role.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn update_role(&self, id: i32, patch: UpdateCommunityRole) -> StoreResult<CommunityRole> {
        sqlx::query_as::<_, CommunityRole>(
            r#"
            UPDATE community_roles SET
                name = COALESCE($2, name),
                description = COALESCE($3, description),
                updated_at = NOW()
            WHERE id = $1
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(patch.name)
        .bind(patch.description)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| missing("Role"))
    }

    async fn delete_role(&self, id: i32) -> StoreResult<()> {
        let result = sqlx::query("DELETE FROM community_roles WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        deleted(result.rows_affected(), "Role")
    }

    async fn list_permissions(&self) -> StoreResult<Vec<Permission>> {
        let permissions =
            sqlx::query_as::<_, Permission>("SELECT * FROM community_permissions ORDER BY code")
                .fetch_all(&self.pool)
                .await?;
        Ok(permissions)
    }

    async fn create_permission(&self, permission: NewPermission) -> StoreResult<Permission> {
        let row = sqlx::query_as::<_, Permission>(
            "INSERT INTO community_permissions (code, description) VALUES ($1, $2) RETURNING *",
        )
        .bind(permission.code)
        .bind(permission.description)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn grant_permission(&self, role_id: i32, permission_id: i32) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO community_role_permissions (role_id, permission_id)
            VALUES ($1, $2)
            ON CONFLICT DO NOTHING
            "#,
        )
        .bind(role_id)
        .bind(permission_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn revoke_permission(&self, role_id: i32, permission_id: i32) -> StoreResult<bool> {
        let result = sqlx::query(
            "DELETE FROM community_role_permissions WHERE role_id = $1 AND permission_id = $2",
        )
        .bind(role_id)
        .bind(permission_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn role_permissions(&self, role_id: i32) -> StoreResult<Vec<Permission>> {
        let permissions = sqlx::query_as::<_, Permission>(
            r#"
            SELECT p.* FROM community_permissions p
            JOIN community_role_permissions rp ON rp.permission_id = p.id
            WHERE rp.role_id = $1
            ORDER BY p.code
            "#,
        )
        .bind(role_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(permissions)
    }

    async fn assign_user_role(
        &self,
        user_id: Uuid,
        role_id: i32,
        assigned_by: Uuid,
    ) -> StoreResult<UserRoleAssignment> {
        let assignment = sqlx::query_as::<_, UserRoleAssignment>(
            r#"
            INSERT INTO community_user_roles (user_id, role_id, assigned_by)
            VALUES ($1, $2, $3)
            ON CONFLICT (user_id, role_id) DO UPDATE SET user_id = EXCLUDED.user_id
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(role_id)
        .bind(assigned_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(assignment)
    }

    async fn remove_user_role(&self, user_id: Uuid, role_id: i32) -> StoreResult<bool> {
        let result =
            sqlx::query("DELETE FROM community_user_roles WHERE user_id = $1 AND role_id = $2")
                .bind(user_id)
                .bind(role_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn find_contributor_profile(
        &self,
        user_id: Uuid,
    ) -> StoreResult<Option<ContributorProfile>> {
        let profile = sqlx::query_as::<_, ContributorProfile>(
            "SELECT * FROM community_contributor_profiles WHERE user_id = $1",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn upsert_contributor_profile(
        &self,
        user_id: Uuid,
        patch: UpdateContributorProfile,
    ) -> StoreResult<ContributorProfile> {
        let profile = sqlx::query_as::<_, ContributorProfile>(
            r#"
            INSERT INTO community_contributor_profiles
                (user_id, bio, skills, github_profile, linkedin_profile, website)
            VALUES ($1, $2, COALESCE($3, '{}'::TEXT[]), $4, $5, $6)
            ON CONFLICT (user_id) DO UPDATE SET
                bio = COALESCE(EXCLUDED.bio, community_contributor_profiles.bio),
                skills = COALESCE($3, community_contributor_profiles.skills),
                github_profile = COALESCE(EXCLUDED.github_profile, community_contributor_profiles.github_profile),
                linkedin_profile = COALESCE(EXCLUDED.linkedin_profile, community_contributor_profiles.linkedin_profile),
                website = COALESCE(EXCLUDED.website, community_contributor_profiles.website),
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(patch.bio)
        .bind(patch.skills)
        .bind(patch.github_profile)
        .bind(patch.linkedin_profile)
        .bind(patch.website)
        .fetch_one(&self.pool)
        .await?;
        Ok(profile)
    }

    async fn find_setting(&self, key: &str) -> StoreResult<Option<SystemSetting>> {
        let setting =
            sqlx::query_as::<_, SystemSetting>("SELECT * FROM system_settings WHERE key = $1")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;
        Ok(setting)
    }

    async fn upsert_setting(
        &self,
        key: &str,
        update: UpdateSettingRequest,
        updated_by: Uuid,
    ) -> StoreResult<SystemSetting> {
        let setting = sqlx::query_as::<_, SystemSetting>(
            r#"
            INSERT INTO system_settings (key, value, description, updated_by)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (key) DO UPDATE SET
                value = EXCLUDED.value,
                description = COALESCE(EXCLUDED.description, system_settings.description),
                updated_by = EXCLUDED.updated_by,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(key)
        .bind(update.value)
        .bind(update.description)
        .bind(updated_by)
        .fetch_one(&self.pool)
        .await?;
        Ok(setting)
    }

    async fn list_notifications(&self, user_id: Uuid) -> StoreResult<Vec<Notification>> {
        let notifications = sqlx::query_as::<_, Notification>(
            "SELECT * FROM notifications WHERE user_id = $1 ORDER BY created_at DESC, id DESC",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(notifications)
    }

    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> StoreResult<Notification> {
        let row = sqlx::query_as::<_, Notification>(
            r#"
            INSERT INTO notifications (user_id, title, message, kind, link)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING *
            "#,
        )
        .bind(notification.user_id)
        .bind(notification.title)
        .bind(notification.message)
        .bind(notification.kind)
        .bind(notification.link)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn mark_notification_read(&self, id: i32, user_id: Uuid) -> StoreResult<bool> {
        let result =
            sqlx::query("UPDATE notifications SET read = TRUE WHERE id = $1 AND user_id = $2")
                .bind(id)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn mark_all_notifications_read(&self, user_id: Uuid) -> StoreResult<u64> {
        let result =
            sqlx::query("UPDATE notifications SET read = TRUE WHERE user_id = $1 AND NOT read")
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn list_preferences(&self, user_id: Uuid) -> StoreResult<Vec<NotificationPreference>> {
        let preferences = sqlx::query_as::<_, NotificationPreference>(
            "SELECT * FROM notification_preferences WHERE user_id = $1 ORDER BY id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(preferences)
    }

    async fn upsert_preference(
        &self,
        user_id: Uuid,
        preference: UpdatePreferenceRequest,
    ) -> StoreResult<NotificationPreference> {
        let row = sqlx::query_as::<_, NotificationPreference>(
            r#"
            INSERT INTO notification_preferences (user_id, channel, category, enabled)
            VALUES ($1, $2, $3, $4)
            ON CONFLICT (user_id, channel, category) DO UPDATE SET
                enabled = EXCLUDED.enabled,
                updated_at = NOW()
            RETURNING *
            "#,
        )
        .bind(user_id)
        .bind(preference.channel)
        .bind(preference.category)
        .bind(preference.enabled)
        .fetch_one(&self.pool)
        .await?;
        Ok(row)
    }

    async fn insert_audit_log(&self, entry: NewAuditLog) -> StoreResult<()> {
        sqlx::query(
            r#"
            INSERT INTO audit_logs (user_id, action, entity_type, entity_id, details, ip_address)
            VALUES ($1, $2, $3, $4, $5, $6)
            "#,
        )
        .bind(entry.user_id)
        .bind(entry.action)
        .bind(entry.entity_type)
        .bind(entry.entity_id)
        .bind(entry.details)
        .bind(entry.ip_address)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_audit_logs(&self, limit: i64) -> StoreResult<Vec<AuditLog>> {
        let logs = sqlx::query_as::<_, AuditLog>(
            "SELECT * FROM audit_logs ORDER BY created_at DESC, id DESC LIMIT $1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(logs)
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "postgres"
    }
}
