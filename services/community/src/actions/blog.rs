//! Blog actions: posts, categories, comments and view tracking

use chrono::Utc;
use tracing::{info, instrument, warn};

use super::{Services, paths};
use crate::comments::{CommentNode, assemble_comment_tree};
use crate::error::{ActionError, ActionResult};
use crate::models::blog::{
    BlogCategory, BlogComment, BlogPost, BlogPostView, CreateCommentRequest, MAX_COMMENT_LENGTH,
    NewBlogPost, NewBlogView, NewCategory, NewComment, PostFilter, PostStatus, UpdateBlogPost,
};
use crate::policy::{Policy, authorize, require_actor};
use crate::roles::Actor;
use crate::validation::Validator;

/// Whether `actor` may see `post` in its current state.
fn visible(post: &BlogPost, actor: Option<&Actor>) -> bool {
    post.status == PostStatus::Published
        || Policy::OwnerOrAdmin {
            owner_id: post.author_id,
        }
        .allows(actor)
}

#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id)))]
pub async fn create_blog_post(
    services: &Services,
    actor: Option<&Actor>,
    input: NewBlogPost,
) -> ActionResult<BlogPost> {
    let actor = require_actor(actor, Policy::Authenticated)?;
    input.validate()?;

    let post = services.store.create_post(actor.id, input).await?;
    info!(post_id = post.id, slug = %post.slug, "Blog post created");

    services.invalidate([paths::BLOG]).await;
    Ok(post)
}

/// Published posts are public; any other listing is for administrators.
#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id), filter = ?filter))]
pub async fn get_blog_posts(
    services: &Services,
    actor: Option<&Actor>,
    filter: PostFilter,
) -> ActionResult<Vec<BlogPostView>> {
    let policy = match filter {
        PostFilter::Status(PostStatus::Published) => Policy::Public,
        _ => Policy::AdminOnly,
    };
    authorize(actor, policy)?;
    Ok(services.store.list_posts(filter.status()).await?)
}

#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id), slug = %slug))]
pub async fn get_blog_post_by_slug(
    services: &Services,
    actor: Option<&Actor>,
    slug: &str,
) -> ActionResult<BlogPostView> {
    authorize(actor, Policy::Public)?;
    match services.store.find_post_by_slug(slug).await? {
        Some(view) if visible(&view.post, actor) => Ok(view),
        _ => Err(ActionError::not_found("Post")),
    }
}

#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id), post_id = id))]
pub async fn update_blog_post(
    services: &Services,
    actor: Option<&Actor>,
    id: i32,
    patch: UpdateBlogPost,
) -> ActionResult<BlogPost> {
    actor.ok_or(ActionError::Unauthorized)?;
    let current = services
        .store
        .find_post(id)
        .await?
        .ok_or_else(|| ActionError::not_found("Post"))?;
    authorize(
        actor,
        Policy::OwnerOrAdmin {
            owner_id: current.author_id,
        },
    )?;
    patch.validate()?;

    let post = services.store.update_post(id, patch).await?;
    info!(post_id = id, "Blog post updated");

    services
        .invalidate(paths::renamed(paths::BLOG, &current.slug, &post.slug))
        .await;
    Ok(post)
}

#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id), post_id = id))]
pub async fn delete_blog_post(
    services: &Services,
    actor: Option<&Actor>,
    id: i32,
) -> ActionResult<()> {
    actor.ok_or(ActionError::Unauthorized)?;
    let current = services
        .store
        .find_post(id)
        .await?
        .ok_or_else(|| ActionError::not_found("Post"))?;
    authorize(
        actor,
        Policy::OwnerOrAdmin {
            owner_id: current.author_id,
        },
    )?;

    services.store.delete_post(id).await?;
    info!(post_id = id, "Blog post deleted");

    services
        .invalidate([
            paths::BLOG.to_string(),
            paths::under(paths::BLOG, &current.slug),
        ])
        .await;
    Ok(())
}

#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id), post_id = post_id))]
pub async fn create_comment(
    services: &Services,
    actor: Option<&Actor>,
    post_id: i32,
    input: CreateCommentRequest,
) -> ActionResult<BlogComment> {
    let actor = require_actor(actor, Policy::Authenticated)?;
    Validator::new()
        .required("content", &input.content, MAX_COMMENT_LENGTH)
        .finish()?;

    let post = services
        .store
        .find_post(post_id)
        .await?
        .filter(|post| visible(post, Some(actor)))
        .ok_or_else(|| ActionError::not_found("Post"))?;

    if let Some(parent_id) = input.parent_id {
        let parent = services.store.find_comment(parent_id).await?;
        if parent.is_none_or(|parent| parent.post_id != post_id) {
            return Err(ActionError::invalid(
                "parent_id",
                "Parent comment does not belong to this post",
            ));
        }
    }

    let comment = services
        .store
        .create_comment(NewComment {
            post_id,
            user_id: actor.id,
            parent_id: input.parent_id,
            content: input.content,
        })
        .await?;
    info!(comment_id = comment.id, "Comment created");

    services
        .invalidate([paths::under(paths::BLOG, &post.slug)])
        .await;
    Ok(comment)
}

#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id), post_id = post_id))]
pub async fn get_comments(
    services: &Services,
    actor: Option<&Actor>,
    post_id: i32,
) -> ActionResult<Vec<CommentNode>> {
    authorize(actor, Policy::Public)?;
    Ok(assemble_comment_tree(services.store.as_ref(), post_id, Utc::now()).await?)
}

/// Record a page view. Never fails the caller.
#[instrument(skip_all, fields(post_id = post_id))]
pub async fn increment_view(
    services: &Services,
    actor: Option<&Actor>,
    post_id: i32,
    ip_address: Option<String>,
    user_agent: Option<String>,
) {
    let view = NewBlogView {
        post_id,
        user_id: actor.map(|a| a.id),
        ip_address,
        user_agent,
    };
    if let Err(e) = services.store.record_view(view).await {
        warn!(post_id, "Failed to record blog view: {}", e);
    }
}

pub async fn get_categories(
    services: &Services,
    actor: Option<&Actor>,
) -> ActionResult<Vec<BlogCategory>> {
    authorize(actor, Policy::Public)?;
    Ok(services.store.list_categories().await?)
}

#[instrument(skip_all, fields(actor = ?actor.map(|a| a.id)))]
pub async fn create_category(
    services: &Services,
    actor: Option<&Actor>,
    input: NewCategory,
) -> ActionResult<BlogCategory> {
    authorize(actor, Policy::AdminOnly)?;
    input.validate()?;

    let category = services.store.create_category(input).await?;
    info!(category_id = category.id, "Blog category created");

    services.invalidate([paths::BLOG]).await;
    Ok(category)
}
