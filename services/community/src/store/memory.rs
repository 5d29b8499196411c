//! In-memory implementation of [`CommunityStore`].
//!
//! All tables live behind one `tokio::sync::RwLock`, so every operation is
//! atomic with respect to the others. Unique columns and cascading deletes
//! mirror the SQL schema so actions behave the same against either backend.
//!
//! Each mutating call bumps a counter readable through
//! [`MemoryStore::mutation_count`]; tests use it to prove that denied or
//! invalid requests never reach persistence.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

use super::{CommunityStore, StoreError, StoreResult};
use crate::models::blog::{
    BlogCategory, BlogComment, BlogPost, BlogPostView, NewBlogPost, NewBlogView, NewCategory,
    NewComment, PostStatus, UpdateBlogPost,
};
use crate::models::events::{
    CommunityEvent, EventDetail, EventRegistration, NewEvent, RegistrationOutcome,
    RegistrationStatus, UpdateEvent,
};
use crate::models::governance::{
    CommunityRole, ContributorProfile, NewCommunityRole, NewPermission, Permission,
    UpdateCommunityRole, UpdateContributorProfile, UserRoleAssignment,
};
use crate::models::platform::{
    AuditLog, NewAuditLog, NewNotification, Notification, NotificationChannel,
    NotificationPreference, SystemSetting, UpdatePreferenceRequest, UpdateSettingRequest,
};
use crate::models::programs::{
    NewProgram, NewProject, Program, ProgramLead, ProgramStatusChange, Project, ProjectMember,
    UpdateProgram, UpdateProject,
};
use crate::models::users::{AuthorProjection, DashboardStats, User};
use crate::roles::Role;

#[derive(Default)]
struct Tables {
    /// Last id handed out per table, like the `SERIAL` sequences
    sequences: HashMap<&'static str, i32>,
    users: HashMap<Uuid, User>,
    posts: BTreeMap<i32, BlogPost>,
    post_tags: HashMap<i32, Vec<String>>,
    categories: BTreeMap<i32, BlogCategory>,
    comments: BTreeMap<i32, BlogComment>,
    views: Vec<NewBlogView>,
    events: BTreeMap<i32, CommunityEvent>,
    registrations: HashMap<(i32, Uuid), EventRegistration>,
    programs: BTreeMap<i32, Program>,
    status_history: Vec<ProgramStatusChange>,
    leads: HashMap<(i32, Uuid), ProgramLead>,
    projects: BTreeMap<i32, Project>,
    members: HashMap<(i32, Uuid), ProjectMember>,
    roles: BTreeMap<i32, CommunityRole>,
    permissions: BTreeMap<i32, Permission>,
    role_permissions: HashSet<(i32, i32)>,
    user_roles: HashMap<(Uuid, i32), UserRoleAssignment>,
    profiles: HashMap<Uuid, ContributorProfile>,
    settings: HashMap<String, SystemSetting>,
    notifications: BTreeMap<i32, Notification>,
    preferences: HashMap<(Uuid, NotificationChannel, String), NotificationPreference>,
    audit_logs: Vec<AuditLog>,
}

impl Tables {
    fn next_id(&mut self, table: &'static str) -> i32 {
        let last = self.sequences.entry(table).or_default();
        *last += 1;
        *last
    }

    fn peek_id(&self, table: &'static str) -> i32 {
        self.sequences.get(table).copied().unwrap_or_default() + 1
    }

    fn claim_id(&mut self, table: &'static str, id: i32) {
        let last = self.sequences.entry(table).or_default();
        *last = (*last).max(id);
    }

    fn post_view(&self, post: &BlogPost) -> BlogPostView {
        BlogPostView {
            author: self.users.get(&post.author_id).map(AuthorProjection::from),
            category: post
                .category_id
                .and_then(|id| self.categories.get(&id))
                .cloned(),
            tags: self.post_tags.get(&post.id).cloned().unwrap_or_default(),
            post: post.clone(),
        }
    }

    fn require_user(&self, id: Uuid) -> StoreResult<()> {
        if self.users.contains_key(&id) {
            Ok(())
        } else {
            Err(StoreError::NotFound("User not found".to_string()))
        }
    }
}

/// Whether `candidate` is used by any `(id, slug)` row other than `except`.
fn slug_taken<'a>(
    mut rows: impl Iterator<Item = (i32, &'a str)>,
    candidate: &str,
    except: Option<i32>,
) -> bool {
    rows.any(|(id, slug)| slug == candidate && Some(id) != except)
}

fn duplicate(what: &str) -> StoreError {
    StoreError::Conflict(format!("{what} already exists"))
}

fn missing(what: &str) -> StoreError {
    StoreError::NotFound(format!("{what} not found"))
}

/// Newest first, ties broken by id so ordering is total.
fn newest_first(comments: &mut [BlogComment]) {
    comments.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
    mutations: AtomicUsize,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of mutating calls made against this store so far.
    pub fn mutation_count(&self) -> usize {
        self.mutations.load(Ordering::SeqCst)
    }

    /// Add a user row directly; users are normally created by the auth service.
    pub async fn insert_user(&self, user: User) {
        self.tables.write().await.users.insert(user.id, user);
    }

    /// Insert a comment as-is, keeping its id, timestamps and approval flag.
    pub async fn seed_comment(&self, comment: BlogComment) {
        let mut tables = self.tables.write().await;
        tables.claim_id("blog_comments", comment.id);
        tables.comments.insert(comment.id, comment);
    }

    /// Insert a role as-is; the only way to create a system role here.
    pub async fn seed_role(&self, role: CommunityRole) {
        let mut tables = self.tables.write().await;
        tables.claim_id("community_roles", role.id);
        tables.roles.insert(role.id, role);
    }

    /// Recorded page views for a post.
    pub async fn view_count(&self, post_id: i32) -> usize {
        self.tables
            .read()
            .await
            .views
            .iter()
            .filter(|view| view.post_id == post_id)
            .count()
    }

    fn mutated(&self) {
        self.mutations.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl CommunityStore for MemoryStore {
    async fn find_user(&self, id: Uuid) -> StoreResult<Option<User>> {
        Ok(self.tables.read().await.users.get(&id).cloned())
    }

    async fn list_users(&self) -> StoreResult<Vec<User>> {
        let mut users: Vec<User> = self.tables.read().await.users.values().cloned().collect();
        users.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(users)
    }

    async fn update_user_role(&self, id: Uuid, role: Role) -> StoreResult<User> {
        self.mutated();
        let mut tables = self.tables.write().await;
        let user = tables.users.get_mut(&id).ok_or_else(|| missing("User"))?;
        user.role = role;
        user.updated_at = Utc::now();
        Ok(user.clone())
    }

    async fn authors(&self, ids: &[Uuid]) -> StoreResult<Vec<AuthorProjection>> {
        let tables = self.tables.read().await;
        Ok(ids
            .iter()
            .filter_map(|id| tables.users.get(id))
            .map(AuthorProjection::from)
            .collect())
    }

    async fn dashboard_stats(&self) -> StoreResult<DashboardStats> {
        let tables = self.tables.read().await;
        Ok(DashboardStats {
            posts: tables.posts.len() as i64,
            published_posts: tables
                .posts
                .values()
                .filter(|post| post.status == PostStatus::Published)
                .count() as i64,
            events: tables.events.len() as i64,
            programs: tables.programs.len() as i64,
            users: tables.users.len() as i64,
        })
    }

    async fn list_posts(&self, status: Option<PostStatus>) -> StoreResult<Vec<BlogPostView>> {
        let tables = self.tables.read().await;
        let mut posts: Vec<&BlogPost> = tables
            .posts
            .values()
            .filter(|post| status.is_none_or(|status| post.status == status))
            .collect();
        posts.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(posts.into_iter().map(|post| tables.post_view(post)).collect())
    }

    async fn find_post(&self, id: i32) -> StoreResult<Option<BlogPost>> {
        Ok(self.tables.read().await.posts.get(&id).cloned())
    }

    async fn find_post_by_slug(&self, slug: &str) -> StoreResult<Option<BlogPostView>> {
        let tables = self.tables.read().await;
        Ok(tables
            .posts
            .values()
            .find(|post| post.slug == slug)
            .map(|post| tables.post_view(post)))
    }

    async fn create_post(&self, author_id: Uuid, post: NewBlogPost) -> StoreResult<BlogPost> {
        self.mutated();
        let mut tables = self.tables.write().await;
        tables.require_user(author_id)?;
        if slug_taken(tables.posts.values().map(|p| (p.id, p.slug.as_str())), &post.slug, None) {
            return Err(duplicate("Post slug"));
        }
        if let Some(category_id) = post.category_id {
            if !tables.categories.contains_key(&category_id) {
                return Err(missing("Category"));
            }
        }
        let id = tables.next_id("blog_posts");
        let now = Utc::now();
        let status = post.status.unwrap_or(PostStatus::Draft);
        let row = BlogPost {
            id,
            author_id,
            category_id: post.category_id,
            title: post.title,
            slug: post.slug,
            content: post.content,
            excerpt: post.excerpt,
            cover_image_url: post.cover_image_url,
            status,
            published_at: (status == PostStatus::Published).then_some(now),
            created_at: now,
            updated_at: now,
        };
        let mut tags: Vec<String> = Vec::new();
        for tag in post.tags {
            let tag = tag.trim().to_string();
            if !tags.contains(&tag) {
                tags.push(tag);
            }
        }
        tables.post_tags.insert(id, tags);
        tables.posts.insert(id, row.clone());
        Ok(row)
    }

    async fn update_post(&self, id: i32, patch: UpdateBlogPost) -> StoreResult<BlogPost> {
        self.mutated();
        let mut tables = self.tables.write().await;
        if let Some(slug) = &patch.slug {
            if slug_taken(tables.posts.values().map(|p| (p.id, p.slug.as_str())), slug, Some(id)) {
                return Err(duplicate("Post slug"));
            }
        }
        let post = tables.posts.get_mut(&id).ok_or_else(|| missing("Post"))?;
        let now = Utc::now();
        if let Some(title) = patch.title {
            post.title = title;
        }
        if let Some(slug) = patch.slug {
            post.slug = slug;
        }
        if let Some(content) = patch.content {
            post.content = content;
        }
        if patch.excerpt.is_some() {
            post.excerpt = patch.excerpt;
        }
        if patch.cover_image_url.is_some() {
            post.cover_image_url = patch.cover_image_url;
        }
        if patch.category_id.is_some() {
            post.category_id = patch.category_id;
        }
        if let Some(status) = patch.status {
            if status == PostStatus::Published && post.published_at.is_none() {
                post.published_at = Some(now);
            }
            post.status = status;
        }
        post.updated_at = now;
        Ok(post.clone())
    }

    async fn delete_post(&self, id: i32) -> StoreResult<()> {
        self.mutated();
        let mut tables = self.tables.write().await;
        tables.posts.remove(&id).ok_or_else(|| missing("Post"))?;
        tables.post_tags.remove(&id);
        tables.comments.retain(|_, comment| comment.post_id != id);
        tables.views.retain(|view| view.post_id != id);
        Ok(())
    }

    async fn list_categories(&self) -> StoreResult<Vec<BlogCategory>> {
        let mut categories: Vec<BlogCategory> =
            self.tables.read().await.categories.values().cloned().collect();
        categories.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(categories)
    }

    async fn create_category(&self, category: NewCategory) -> StoreResult<BlogCategory> {
        self.mutated();
        let mut tables = self.tables.write().await;
        let rows = tables.categories.values().map(|c| (c.id, c.slug.as_str()));
        if slug_taken(rows, &category.slug, None) {
            return Err(duplicate("Category slug"));
        }
        let id = tables.next_id("blog_categories");
        let now = Utc::now();
        let row = BlogCategory {
            id,
            name: category.name,
            slug: category.slug,
            description: category.description,
            created_at: now,
            updated_at: now,
        };
        tables.categories.insert(id, row.clone());
        Ok(row)
    }

    async fn find_comment(&self, id: i32) -> StoreResult<Option<BlogComment>> {
        Ok(self.tables.read().await.comments.get(&id).cloned())
    }

    async fn create_comment(&self, comment: NewComment) -> StoreResult<BlogComment> {
        self.mutated();
        let mut tables = self.tables.write().await;
        tables.require_user(comment.user_id)?;
        if !tables.posts.contains_key(&comment.post_id) {
            return Err(missing("Post"));
        }
        let id = tables.next_id("blog_comments");
        let now = Utc::now();
        let row = BlogComment {
            id,
            post_id: comment.post_id,
            user_id: comment.user_id,
            parent_id: comment.parent_id,
            content: comment.content,
            is_approved: true,
            created_at: now,
            updated_at: now,
        };
        tables.comments.insert(id, row.clone());
        Ok(row)
    }

    async fn root_comments(&self, post_id: i32) -> StoreResult<Vec<BlogComment>> {
        let mut roots: Vec<BlogComment> = self
            .tables
            .read()
            .await
            .comments
            .values()
            .filter(|c| c.post_id == post_id && c.parent_id.is_none() && c.is_approved)
            .cloned()
            .collect();
        newest_first(&mut roots);
        Ok(roots)
    }

    async fn replies_to(&self, parent_ids: &[i32]) -> StoreResult<Vec<BlogComment>> {
        let mut replies: Vec<BlogComment> = self
            .tables
            .read()
            .await
            .comments
            .values()
            .filter(|c| c.is_approved && c.parent_id.is_some_and(|p| parent_ids.contains(&p)))
            .cloned()
            .collect();
        newest_first(&mut replies);
        Ok(replies)
    }

    async fn record_view(&self, view: NewBlogView) -> StoreResult<()> {
        self.mutated();
        let mut tables = self.tables.write().await;
        if !tables.posts.contains_key(&view.post_id) {
            return Err(missing("Post"));
        }
        tables.views.push(view);
        Ok(())
    }

    async fn list_events(&self, published_only: bool) -> StoreResult<Vec<CommunityEvent>> {
        let mut events: Vec<CommunityEvent> = self
            .tables
            .read()
            .await
            .events
            .values()
            .filter(|event| !published_only || event.published)
            .cloned()
            .collect();
        events.sort_by(|a, b| b.date.cmp(&a.date).then(b.id.cmp(&a.id)));
        Ok(events)
    }

    async fn find_event(&self, id: i32) -> StoreResult<Option<CommunityEvent>> {
        Ok(self.tables.read().await.events.get(&id).cloned())
    }

    async fn find_event_by_slug(&self, slug: &str) -> StoreResult<Option<EventDetail>> {
        let tables = self.tables.read().await;
        Ok(tables
            .events
            .values()
            .find(|event| event.slug == slug)
            .map(|event| EventDetail {
                event: event.clone(),
                sessions: Vec::new(),
                speakers: Vec::new(),
                sponsors: Vec::new(),
            }))
    }

    async fn create_event(&self, created_by: Uuid, event: NewEvent) -> StoreResult<CommunityEvent> {
        self.mutated();
        let mut tables = self.tables.write().await;
        tables.require_user(created_by)?;
        if slug_taken(tables.events.values().map(|e| (e.id, e.slug.as_str())), &event.slug, None) {
            return Err(duplicate("Event slug"));
        }
        let id = tables.next_id("events");
        let now = Utc::now();
        let row = CommunityEvent {
            id,
            created_by,
            title: event.title,
            description: event.description,
            slug: event.slug,
            date: event.date,
            capacity: event.capacity,
            registration_required: event.registration_required,
            start_at: event.start_at,
            end_at: event.end_at,
            timezone: event.timezone,
            cancelled: false,
            visibility: event.visibility,
            cover_image_url: event.cover_image_url,
            published: event.published,
            location: event.location,
            location_type: event.location_type,
            flagship: event.flagship,
            created_at: now,
            updated_at: now,
        };
        tables.events.insert(id, row.clone());
        Ok(row)
    }

    async fn update_event(&self, id: i32, patch: UpdateEvent) -> StoreResult<CommunityEvent> {
        self.mutated();
        let mut tables = self.tables.write().await;
        if let Some(slug) = &patch.slug {
            if slug_taken(tables.events.values().map(|e| (e.id, e.slug.as_str())), slug, Some(id)) {
                return Err(duplicate("Event slug"));
            }
        }
        let event = tables.events.get_mut(&id).ok_or_else(|| missing("Event"))?;
        if let Some(title) = patch.title {
            event.title = title;
        }
        if let Some(description) = patch.description {
            event.description = description;
        }
        if let Some(slug) = patch.slug {
            event.slug = slug;
        }
        if let Some(date) = patch.date {
            event.date = date;
        }
        if patch.capacity.is_some() {
            event.capacity = patch.capacity;
        }
        if let Some(required) = patch.registration_required {
            event.registration_required = required;
        }
        if let Some(start_at) = patch.start_at {
            event.start_at = start_at;
        }
        if let Some(end_at) = patch.end_at {
            event.end_at = end_at;
        }
        if let Some(timezone) = patch.timezone {
            event.timezone = timezone;
        }
        if let Some(cancelled) = patch.cancelled {
            event.cancelled = cancelled;
        }
        if let Some(visibility) = patch.visibility {
            event.visibility = visibility;
        }
        if patch.cover_image_url.is_some() {
            event.cover_image_url = patch.cover_image_url;
        }
        if let Some(published) = patch.published {
            event.published = published;
        }
        if let Some(location) = patch.location {
            event.location = location;
        }
        if let Some(location_type) = patch.location_type {
            event.location_type = location_type;
        }
        if let Some(flagship) = patch.flagship {
            event.flagship = flagship;
        }
        event.updated_at = Utc::now();
        Ok(event.clone())
    }

    async fn delete_event(&self, id: i32) -> StoreResult<()> {
        self.mutated();
        let mut tables = self.tables.write().await;
        tables.events.remove(&id).ok_or_else(|| missing("Event"))?;
        tables.registrations.retain(|(event_id, _), _| *event_id != id);
        Ok(())
    }

    async fn register_for_event(
        &self,
        event_id: i32,
        user_id: Uuid,
    ) -> StoreResult<RegistrationOutcome> {
        self.mutated();
        let mut tables = self.tables.write().await;
        tables.require_user(user_id)?;
        if !tables.events.contains_key(&event_id) {
            return Err(missing("Event"));
        }
        let next_id = tables.peek_id("event_registrations");
        let now = Utc::now();
        let outcome = match tables.registrations.get_mut(&(event_id, user_id)) {
            Some(existing) if existing.status == RegistrationStatus::Cancelled => {
                existing.status = RegistrationStatus::Confirmed;
                existing.registered_at = now;
                RegistrationOutcome::Reinstated
            }
            Some(_) => RegistrationOutcome::AlreadyRegistered,
            None => {
                tables.claim_id("event_registrations", next_id);
                tables.registrations.insert(
                    (event_id, user_id),
                    EventRegistration {
                        id: next_id,
                        event_id,
                        user_id,
                        registered_at: now,
                        status: RegistrationStatus::Confirmed,
                        checked_in_at: None,
                        source: None,
                    },
                );
                RegistrationOutcome::Registered
            }
        };
        Ok(outcome)
    }

    async fn cancel_registration(&self, event_id: i32, user_id: Uuid) -> StoreResult<bool> {
        self.mutated();
        let mut tables = self.tables.write().await;
        match tables.registrations.get_mut(&(event_id, user_id)) {
            Some(registration) if registration.status != RegistrationStatus::Cancelled => {
                registration.status = RegistrationStatus::Cancelled;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn list_programs(&self) -> StoreResult<Vec<Program>> {
        let mut programs: Vec<Program> =
            self.tables.read().await.programs.values().cloned().collect();
        programs.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(programs)
    }

    async fn find_program(&self, id: i32) -> StoreResult<Option<Program>> {
        Ok(self.tables.read().await.programs.get(&id).cloned())
    }

    async fn find_program_by_slug(&self, slug: &str) -> StoreResult<Option<Program>> {
        Ok(self
            .tables
            .read()
            .await
            .programs
            .values()
            .find(|program| program.slug == slug)
            .cloned())
    }

    async fn create_program(&self, program: NewProgram) -> StoreResult<Program> {
        self.mutated();
        let mut tables = self.tables.write().await;
        let rows = tables.programs.values().map(|p| (p.id, p.slug.as_str()));
        if slug_taken(rows, &program.slug, None) {
            return Err(duplicate("Program slug"));
        }
        let id = tables.next_id("programs");
        let now = Utc::now();
        let row = Program {
            id,
            title: program.title,
            slug: program.slug,
            description: program.description,
            status: program.status,
            start_date: program.start_date,
            end_date: program.end_date,
            created_at: now,
            updated_at: now,
        };
        tables.programs.insert(id, row.clone());
        Ok(row)
    }

    async fn update_program(
        &self,
        id: i32,
        patch: UpdateProgram,
        changed_by: Uuid,
    ) -> StoreResult<Program> {
        self.mutated();
        let mut tables = self.tables.write().await;
        if let Some(slug) = &patch.slug {
            let rows = tables.programs.values().map(|p| (p.id, p.slug.as_str()));
            if slug_taken(rows, slug, Some(id)) {
                return Err(duplicate("Program slug"));
            }
        }
        let history_id = tables.peek_id("program_status_history");
        let program = tables.programs.get_mut(&id).ok_or_else(|| missing("Program"))?;
        let status_change = patch.status_change(program);
        let now = Utc::now();
        if let Some(title) = patch.title {
            program.title = title;
        }
        if let Some(slug) = patch.slug {
            program.slug = slug;
        }
        if let Some(description) = patch.description {
            program.description = description;
        }
        if let Some(status) = patch.status {
            program.status = status;
        }
        if patch.start_date.is_some() {
            program.start_date = patch.start_date;
        }
        if patch.end_date.is_some() {
            program.end_date = patch.end_date;
        }
        program.updated_at = now;
        let updated = program.clone();
        if let Some(status) = status_change {
            tables.claim_id("program_status_history", history_id);
            tables.status_history.push(ProgramStatusChange {
                id: history_id,
                program_id: id,
                status,
                changed_by: Some(changed_by),
                reason: patch.status_reason,
                created_at: now,
            });
        }
        Ok(updated)
    }

    async fn delete_program(&self, id: i32) -> StoreResult<()> {
        self.mutated();
        let mut tables = self.tables.write().await;
        tables.programs.remove(&id).ok_or_else(|| missing("Program"))?;
        tables.status_history.retain(|change| change.program_id != id);
        tables.leads.retain(|(program_id, _), _| *program_id != id);
        let orphaned: Vec<i32> = tables
            .projects
            .values()
            .filter(|project| project.program_id == Some(id))
            .map(|project| project.id)
            .collect();
        for project_id in orphaned {
            tables.projects.remove(&project_id);
            tables.members.retain(|(member_project, _), _| *member_project != project_id);
        }
        Ok(())
    }

    async fn program_status_history(
        &self,
        program_id: i32,
    ) -> StoreResult<Vec<ProgramStatusChange>> {
        let mut history: Vec<ProgramStatusChange> = self
            .tables
            .read()
            .await
            .status_history
            .iter()
            .filter(|change| change.program_id == program_id)
            .cloned()
            .collect();
        history.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(history)
    }

    async fn add_program_lead(&self, program_id: i32, user_id: Uuid) -> StoreResult<ProgramLead> {
        self.mutated();
        let mut tables = self.tables.write().await;
        tables.require_user(user_id)?;
        if !tables.programs.contains_key(&program_id) {
            return Err(missing("Program"));
        }
        let lead = tables
            .leads
            .entry((program_id, user_id))
            .or_insert_with(|| ProgramLead {
                program_id,
                user_id,
                assigned_at: Utc::now(),
            });
        Ok(lead.clone())
    }

    async fn remove_program_lead(&self, program_id: i32, user_id: Uuid) -> StoreResult<bool> {
        self.mutated();
        Ok(self
            .tables
            .write()
            .await
            .leads
            .remove(&(program_id, user_id))
            .is_some())
    }

    async fn list_projects(&self, program_id: Option<i32>) -> StoreResult<Vec<Project>> {
        let mut projects: Vec<Project> = self
            .tables
            .read()
            .await
            .projects
            .values()
            .filter(|project| program_id.is_none() || project.program_id == program_id)
            .cloned()
            .collect();
        projects.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(projects)
    }

    async fn find_project(&self, id: i32) -> StoreResult<Option<Project>> {
        Ok(self.tables.read().await.projects.get(&id).cloned())
    }

    async fn create_project(&self, project: NewProject) -> StoreResult<Project> {
        self.mutated();
        let mut tables = self.tables.write().await;
        let rows = tables.projects.values().map(|p| (p.id, p.slug.as_str()));
        if slug_taken(rows, &project.slug, None) {
            return Err(duplicate("Project slug"));
        }
        if let Some(program_id) = project.program_id {
            if !tables.programs.contains_key(&program_id) {
                return Err(missing("Program"));
            }
        }
        let id = tables.next_id("projects");
        let now = Utc::now();
        let row = Project {
            id,
            program_id: project.program_id,
            title: project.title,
            slug: project.slug,
            description: project.description,
            repository_url: project.repository_url,
            status: project.status,
            created_at: now,
            updated_at: now,
        };
        tables.projects.insert(id, row.clone());
        Ok(row)
    }

    async fn update_project(&self, id: i32, patch: UpdateProject) -> StoreResult<Project> {
        self.mutated();
        let mut tables = self.tables.write().await;
        if let Some(slug) = &patch.slug {
            let rows = tables.projects.values().map(|p| (p.id, p.slug.as_str()));
            if slug_taken(rows, slug, Some(id)) {
                return Err(duplicate("Project slug"));
            }
        }
        if let Some(program_id) = patch.program_id {
            if !tables.programs.contains_key(&program_id) {
                return Err(missing("Program"));
            }
        }
        let project = tables.projects.get_mut(&id).ok_or_else(|| missing("Project"))?;
        if patch.program_id.is_some() {
            project.program_id = patch.program_id;
        }
        if let Some(title) = patch.title {
            project.title = title;
        }
        if let Some(slug) = patch.slug {
            project.slug = slug;
        }
        if let Some(description) = patch.description {
            project.description = description;
        }
        if patch.repository_url.is_some() {
            project.repository_url = patch.repository_url;
        }
        if let Some(status) = patch.status {
            project.status = status;
        }
        project.updated_at = Utc::now();
        Ok(project.clone())
    }

    async fn delete_project(&self, id: i32) -> StoreResult<()> {
        self.mutated();
        let mut tables = self.tables.write().await;
        tables.projects.remove(&id).ok_or_else(|| missing("Project"))?;
        tables.members.retain(|(project_id, _), _| *project_id != id);
        Ok(())
    }

    async fn join_project(
        &self,
        project_id: i32,
        user_id: Uuid,
        role: &str,
    ) -> StoreResult<ProjectMember> {
        self.mutated();
        let mut tables = self.tables.write().await;
        tables.require_user(user_id)?;
        if !tables.projects.contains_key(&project_id) {
            return Err(missing("Project"));
        }
        let member = tables
            .members
            .entry((project_id, user_id))
            .or_insert_with(|| ProjectMember {
                project_id,
                user_id,
                role: role.to_string(),
                joined_at: Utc::now(),
            });
        Ok(member.clone())
    }

    async fn leave_project(&self, project_id: i32, user_id: Uuid) -> StoreResult<bool> {
        self.mutated();
        Ok(self
            .tables
            .write()
            .await
            .members
            .remove(&(project_id, user_id))
            .is_some())
    }

    async fn list_roles(&self) -> StoreResult<Vec<CommunityRole>> {
        let mut roles: Vec<CommunityRole> =
            self.tables.read().await.roles.values().cloned().collect();
        roles.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(roles)
    }

    async fn find_role(&self, id: i32) -> StoreResult<Option<CommunityRole>> {
        Ok(self.tables.read().await.roles.get(&id).cloned())
    }

    async fn create_role(&self, role: NewCommunityRole) -> StoreResult<CommunityRole> {
        self.mutated();
        let mut tables = self.tables.write().await;
        if tables.roles.values().any(|existing| existing.name == role.name) {
            return Err(duplicate("Role"));
        }
        let id = tables.next_id("community_roles");
        let now = Utc::now();
        let row = CommunityRole {
            id,
            name: role.name,
            description: role.description,
            is_system: false,
            created_at: now,
            updated_at: now,
        };
        tables.roles.insert(id, row.clone());
        Ok(row)
    }

    async fn update_role(&self, id: i32, patch: UpdateCommunityRole) -> StoreResult<CommunityRole> {
        self.mutated();
        let mut tables = self.tables.write().await;
        if let Some(name) = &patch.name {
            if tables
                .roles
                .values()
                .any(|existing| &existing.name == name && existing.id != id)
            {
                return Err(duplicate("Role"));
            }
        }
        let role = tables.roles.get_mut(&id).ok_or_else(|| missing("Role"))?;
        if let Some(name) = patch.name {
            role.name = name;
        }
        if patch.description.is_some() {
            role.description = patch.description;
        }
        role.updated_at = Utc::now();
        Ok(role.clone())
    }

    async fn delete_role(&self, id: i32) -> StoreResult<()> {
        self.mutated();
        let mut tables = self.tables.write().await;
        tables.roles.remove(&id).ok_or_else(|| missing("Role"))?;
        tables.role_permissions.retain(|(role_id, _)| *role_id != id);
        tables.user_roles.retain(|(_, role_id), _| *role_id != id);
        Ok(())
    }

    async fn list_permissions(&self) -> StoreResult<Vec<Permission>> {
        let mut permissions: Vec<Permission> =
            self.tables.read().await.permissions.values().cloned().collect();
        permissions.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(permissions)
    }

    async fn create_permission(&self, permission: NewPermission) -> StoreResult<Permission> {
        self.mutated();
        let mut tables = self.tables.write().await;
        if tables.permissions.values().any(|p| p.code == permission.code) {
            return Err(duplicate("Permission"));
        }
        let id = tables.next_id("permissions");
        let row = Permission {
            id,
            code: permission.code,
            description: permission.description,
            created_at: Utc::now(),
        };
        tables.permissions.insert(id, row.clone());
        Ok(row)
    }

    async fn grant_permission(&self, role_id: i32, permission_id: i32) -> StoreResult<()> {
        self.mutated();
        let mut tables = self.tables.write().await;
        if !tables.roles.contains_key(&role_id) {
            return Err(missing("Role"));
        }
        if !tables.permissions.contains_key(&permission_id) {
            return Err(missing("Permission"));
        }
        tables.role_permissions.insert((role_id, permission_id));
        Ok(())
    }

    async fn revoke_permission(&self, role_id: i32, permission_id: i32) -> StoreResult<bool> {
        self.mutated();
        Ok(self
            .tables
            .write()
            .await
            .role_permissions
            .remove(&(role_id, permission_id)))
    }

    async fn role_permissions(&self, role_id: i32) -> StoreResult<Vec<Permission>> {
        let tables = self.tables.read().await;
        let mut permissions: Vec<Permission> = tables
            .role_permissions
            .iter()
            .filter(|(role, _)| *role == role_id)
            .filter_map(|(_, permission)| tables.permissions.get(permission))
            .cloned()
            .collect();
        permissions.sort_by(|a, b| a.code.cmp(&b.code));
        Ok(permissions)
    }

    async fn assign_user_role(
        &self,
        user_id: Uuid,
        role_id: i32,
        assigned_by: Uuid,
    ) -> StoreResult<UserRoleAssignment> {
        self.mutated();
        let mut tables = self.tables.write().await;
        tables.require_user(user_id)?;
        if !tables.roles.contains_key(&role_id) {
            return Err(missing("Role"));
        }
        let assignment = tables
            .user_roles
            .entry((user_id, role_id))
            .or_insert_with(|| UserRoleAssignment {
                user_id,
                role_id,
                assigned_at: Utc::now(),
                assigned_by: Some(assigned_by),
            });
        Ok(assignment.clone())
    }

    async fn remove_user_role(&self, user_id: Uuid, role_id: i32) -> StoreResult<bool> {
        self.mutated();
        Ok(self
            .tables
            .write()
            .await
            .user_roles
            .remove(&(user_id, role_id))
            .is_some())
    }

    async fn find_contributor_profile(
        &self,
        user_id: Uuid,
    ) -> StoreResult<Option<ContributorProfile>> {
        Ok(self.tables.read().await.profiles.get(&user_id).cloned())
    }

    async fn upsert_contributor_profile(
        &self,
        user_id: Uuid,
        patch: UpdateContributorProfile,
    ) -> StoreResult<ContributorProfile> {
        self.mutated();
        let mut tables = self.tables.write().await;
        tables.require_user(user_id)?;
        let now = Utc::now();
        let next_id = tables.peek_id("contributor_profiles");
        let mut inserted = false;
        let profile = tables.profiles.entry(user_id).or_insert_with(|| {
            inserted = true;
            ContributorProfile {
                id: next_id,
                user_id,
                bio: None,
                skills: Vec::new(),
                github_profile: None,
                linkedin_profile: None,
                website: None,
                contribution_count: 0,
                created_at: now,
                updated_at: now,
            }
        });
        if patch.bio.is_some() {
            profile.bio = patch.bio;
        }
        if let Some(skills) = patch.skills {
            profile.skills = skills;
        }
        if patch.github_profile.is_some() {
            profile.github_profile = patch.github_profile;
        }
        if patch.linkedin_profile.is_some() {
            profile.linkedin_profile = patch.linkedin_profile;
        }
        if patch.website.is_some() {
            profile.website = patch.website;
        }
        profile.updated_at = now;
        let profile = profile.clone();
        if inserted {
            tables.claim_id("contributor_profiles", next_id);
        }
        Ok(profile)
    }

    async fn find_setting(&self, key: &str) -> StoreResult<Option<SystemSetting>> {
        Ok(self.tables.read().await.settings.get(key).cloned())
    }

    async fn upsert_setting(
        &self,
        key: &str,
        update: UpdateSettingRequest,
        updated_by: Uuid,
    ) -> StoreResult<SystemSetting> {
        self.mutated();
        let mut tables = self.tables.write().await;
        let now = Utc::now();
        let next_id = tables.peek_id("system_settings");
        let mut inserted = false;
        let setting = tables.settings.entry(key.to_string()).or_insert_with(|| {
            inserted = true;
            SystemSetting {
                id: next_id,
                key: key.to_string(),
                value: update.value.clone(),
                description: None,
                updated_at: now,
                updated_by: None,
            }
        });
        setting.value = update.value;
        if update.description.is_some() {
            setting.description = update.description;
        }
        setting.updated_at = now;
        setting.updated_by = Some(updated_by);
        let setting = setting.clone();
        if inserted {
            tables.claim_id("system_settings", next_id);
        }
        Ok(setting)
    }

    async fn list_notifications(&self, user_id: Uuid) -> StoreResult<Vec<Notification>> {
        let mut notifications: Vec<Notification> = self
            .tables
            .read()
            .await
            .notifications
            .values()
            .filter(|n| n.user_id == user_id)
            .cloned()
            .collect();
        notifications.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(notifications)
    }

    async fn create_notification(
        &self,
        notification: NewNotification,
    ) -> StoreResult<Notification> {
        self.mutated();
        let mut tables = self.tables.write().await;
        tables.require_user(notification.user_id)?;
        let id = tables.next_id("notifications");
        let row = Notification {
            id,
            user_id: notification.user_id,
            title: notification.title,
            message: notification.message,
            kind: notification.kind,
            link: notification.link,
            read: false,
            created_at: Utc::now(),
        };
        tables.notifications.insert(id, row.clone());
        Ok(row)
    }

    async fn mark_notification_read(&self, id: i32, user_id: Uuid) -> StoreResult<bool> {
        self.mutated();
        let mut tables = self.tables.write().await;
        match tables.notifications.get_mut(&id) {
            Some(notification) if notification.user_id == user_id => {
                notification.read = true;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn mark_all_notifications_read(&self, user_id: Uuid) -> StoreResult<u64> {
        self.mutated();
        let mut tables = self.tables.write().await;
        let mut marked = 0;
        for notification in tables.notifications.values_mut() {
            if notification.user_id == user_id && !notification.read {
                notification.read = true;
                marked += 1;
            }
        }
        Ok(marked)
    }

    async fn list_preferences(&self, user_id: Uuid) -> StoreResult<Vec<NotificationPreference>> {
        let mut preferences: Vec<NotificationPreference> = self
            .tables
            .read()
            .await
            .preferences
            .values()
            .filter(|p| p.user_id == user_id)
            .cloned()
            .collect();
        preferences.sort_by_key(|p| p.id);
        Ok(preferences)
    }

    async fn upsert_preference(
        &self,
        user_id: Uuid,
        preference: UpdatePreferenceRequest,
    ) -> StoreResult<NotificationPreference> {
        self.mutated();
        let mut tables = self.tables.write().await;
        tables.require_user(user_id)?;
        let now = Utc::now();
        let next_id = tables.peek_id("notification_preferences");
        let mut inserted = false;
        let key = (user_id, preference.channel, preference.category.clone());
        let row = tables.preferences.entry(key).or_insert_with(|| {
            inserted = true;
            NotificationPreference {
                id: next_id,
                user_id,
                channel: preference.channel,
                category: preference.category,
                enabled: preference.enabled,
                updated_at: now,
            }
        });
        row.enabled = preference.enabled;
        row.updated_at = now;
        let row = row.clone();
        if inserted {
            tables.claim_id("notification_preferences", next_id);
        }
        Ok(row)
    }

    async fn insert_audit_log(&self, entry: NewAuditLog) -> StoreResult<()> {
        self.mutated();
        let mut tables = self.tables.write().await;
        let id = tables.next_id("audit_logs");
        tables.audit_logs.push(AuditLog {
            id,
            user_id: entry.user_id,
            action: entry.action,
            entity_type: entry.entity_type,
            entity_id: entry.entity_id,
            details: entry.details,
            ip_address: entry.ip_address,
            created_at: Utc::now(),
        });
        Ok(())
    }

    async fn list_audit_logs(&self, limit: i64) -> StoreResult<Vec<AuditLog>> {
        let tables = self.tables.read().await;
        Ok(tables
            .audit_logs
            .iter()
            .rev()
            .take(limit.max(0) as usize)
            .cloned()
            .collect())
    }

    async fn health_check(&self) -> StoreResult<()> {
        Ok(())
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::programs::ProgramStatus;

    fn user(role: Role) -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            name: "Ada".into(),
            email: format!("{}@example.com", Uuid::new_v4()),
            image: None,
            role,
            created_at: now,
            updated_at: now,
        }
    }

    #[tokio::test]
    async fn test_each_table_has_its_own_sequence() {
        let store = MemoryStore::new();
        let first = store
            .create_category(NewCategory {
                name: "News".into(),
                slug: "news".into(),
                description: None,
            })
            .await
            .unwrap();
        let program = store
            .create_program(NewProgram {
                title: "Mentoring".into(),
                slug: "mentoring".into(),
                description: "Pairs newcomers with maintainers".into(),
                status: ProgramStatus::Active,
                start_date: None,
                end_date: None,
            })
            .await
            .unwrap();
        let second = store
            .create_category(NewCategory {
                name: "Guides".into(),
                slug: "guides".into(),
                description: None,
            })
            .await
            .unwrap();

        assert_eq!(first.id, 1);
        assert_eq!(program.id, 1);
        assert_eq!(second.id, 2);
    }

    #[tokio::test]
    async fn test_registration_upsert_transitions() {
        let store = MemoryStore::new();
        let member = user(Role::User);
        store.insert_user(member.clone()).await;
        let event = store
            .create_event(
                member.id,
                NewEvent {
                    title: "Meetup".into(),
                    description: "Monthly".into(),
                    slug: "meetup".into(),
                    date: Utc::now(),
                    capacity: None,
                    registration_required: true,
                    start_at: Utc::now(),
                    end_at: Utc::now(),
                    timezone: "UTC".into(),
                    visibility: Default::default(),
                    cover_image_url: None,
                    published: true,
                    location: "Online".into(),
                    location_type: crate::models::events::LocationType::Online,
                    flagship: false,
                },
            )
            .await
            .unwrap();

        let first = store.register_for_event(event.id, member.id).await.unwrap();
        let again = store.register_for_event(event.id, member.id).await.unwrap();
        assert_eq!(first, RegistrationOutcome::Registered);
        assert_eq!(again, RegistrationOutcome::AlreadyRegistered);

        assert!(store.cancel_registration(event.id, member.id).await.unwrap());
        assert!(!store.cancel_registration(event.id, member.id).await.unwrap());
        let back = store.register_for_event(event.id, member.id).await.unwrap();
        assert_eq!(back, RegistrationOutcome::Reinstated);
    }

    #[tokio::test]
    async fn test_program_update_records_status_change_only_when_changed() {
        let store = MemoryStore::new();
        let admin = Uuid::new_v4();
        let program = store
            .create_program(NewProgram {
                title: "Mentoring".into(),
                slug: "mentoring".into(),
                description: "Pairs".into(),
                status: ProgramStatus::Draft,
                start_date: None,
                end_date: None,
            })
            .await
            .unwrap();

        let rename = UpdateProgram {
            title: Some("Mentorship".into()),
            ..Default::default()
        };
        store.update_program(program.id, rename, admin).await.unwrap();
        assert!(store.program_status_history(program.id).await.unwrap().is_empty());

        let activate = UpdateProgram {
            status: Some(ProgramStatus::Active),
            status_reason: Some("Kick-off".into()),
            ..Default::default()
        };
        store.update_program(program.id, activate, admin).await.unwrap();
        let history = store.program_status_history(program.id).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].status, ProgramStatus::Active);
        assert_eq!(history[0].changed_by, Some(admin));
    }

    #[tokio::test]
    async fn test_duplicate_slug_is_conflict() {
        let store = MemoryStore::new();
        let category = NewCategory {
            name: "News".into(),
            slug: "news".into(),
            description: None,
        };
        store.create_category(category.clone()).await.unwrap();
        let err = store.create_category(category).await.unwrap_err();
        assert!(matches!(err, StoreError::Conflict(_)));
    }

    #[tokio::test]
    async fn test_reads_do_not_count_as_mutations() {
        let store = MemoryStore::new();
        store.list_posts(None).await.unwrap();
        store.find_setting("site.name").await.unwrap();
        assert_eq!(store.mutation_count(), 0);
    }
}
