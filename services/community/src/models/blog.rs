//! Blog posts, categories, tags, comments and views

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ActionResult;
use crate::models::users::AuthorProjection;
use crate::validation::Validator;

pub const MAX_COMMENT_LENGTH: usize = 1500;

/// Publication state of a post
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "blog_post_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum PostStatus {
    Draft,
    Published,
    Archived,
    UnderReview,
}

/// Listing filter: one status, or everything
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PostFilter {
    Status(PostStatus),
    All,
}

impl Default for PostFilter {
    fn default() -> Self {
        PostFilter::Status(PostStatus::Published)
    }
}

impl FromStr for PostFilter {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "all" => Ok(PostFilter::All),
            "draft" => Ok(PostFilter::Status(PostStatus::Draft)),
            "published" => Ok(PostFilter::Status(PostStatus::Published)),
            "archived" => Ok(PostFilter::Status(PostStatus::Archived)),
            "under_review" => Ok(PostFilter::Status(PostStatus::UnderReview)),
            other => Err(format!("unknown post status: {other}")),
        }
    }
}

impl PostFilter {
    pub fn status(self) -> Option<PostStatus> {
        match self {
            PostFilter::Status(status) => Some(status),
            PostFilter::All => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BlogCategory {
    pub id: i32,
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewCategory {
    pub name: String,
    pub slug: String,
    pub description: Option<String>,
}

impl NewCategory {
    pub fn validate(&self) -> ActionResult<()> {
        Validator::new()
            .required("name", &self.name, 80)
            .slug("slug", &self.slug)
            .optional("description", self.description.as_deref(), 500)
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BlogPost {
    pub id: i32,
    pub author_id: Uuid,
    pub category_id: Option<i32>,
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub cover_image_url: Option<String>,
    pub status: PostStatus,
    pub published_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A post together with the relations listing pages render
#[derive(Debug, Clone, Serialize)]
pub struct BlogPostView {
    #[serde(flatten)]
    pub post: BlogPost,
    pub author: Option<AuthorProjection>,
    pub category: Option<BlogCategory>,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct NewBlogPost {
    pub title: String,
    pub slug: String,
    pub content: String,
    pub excerpt: Option<String>,
    pub cover_image_url: Option<String>,
    pub category_id: Option<i32>,
    pub status: Option<PostStatus>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl NewBlogPost {
    pub fn validate(&self) -> ActionResult<()> {
        let mut v = Validator::new();
        v.required("title", &self.title, 200)
            .slug("slug", &self.slug)
            .required("content", &self.content, 100_000)
            .optional("excerpt", self.excerpt.as_deref(), 500)
            .url("cover_image_url", self.cover_image_url.as_deref());
        for tag in &self.tags {
            v.required("tags", tag, 40);
        }
        v.finish()
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct UpdateBlogPost {
    pub title: Option<String>,
    pub slug: Option<String>,
    pub content: Option<String>,
    pub excerpt: Option<String>,
    pub cover_image_url: Option<String>,
    pub category_id: Option<i32>,
    pub status: Option<PostStatus>,
}

impl UpdateBlogPost {
    pub fn validate(&self) -> ActionResult<()> {
        Validator::new()
            .optional("title", self.title.as_deref(), 200)
            .optional_slug("slug", self.slug.as_deref())
            .optional("content", self.content.as_deref(), 100_000)
            .optional("excerpt", self.excerpt.as_deref(), 500)
            .url("cover_image_url", self.cover_image_url.as_deref())
            .finish()
    }
}

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct BlogComment {
    pub id: i32,
    pub post_id: i32,
    pub user_id: Uuid,
    pub parent_id: Option<i32>,
    pub content: String,
    pub is_approved: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Comment creation payload as received over HTTP
#[derive(Debug, Clone, Deserialize)]
pub struct CreateCommentRequest {
    pub content: String,
    pub parent_id: Option<i32>,
}

/// Fully resolved comment ready to persist
#[derive(Debug, Clone)]
pub struct NewComment {
    pub post_id: i32,
    pub user_id: Uuid,
    pub parent_id: Option<i32>,
    pub content: String,
}

/// One recorded page view
#[derive(Debug, Clone, Default)]
pub struct NewBlogView {
    pub post_id: i32,
    pub user_id: Option<Uuid>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}
