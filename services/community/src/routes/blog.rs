use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderMap, header},
    response::Response,
    routing::{get, post},
};
use serde::Deserialize;

use super::{created, read_through, respond};
use crate::actions::{blog, paths};
use crate::error::ActionError;
use crate::models::blog::{
    CreateCommentRequest, NewBlogPost, NewCategory, PostFilter, PostStatus, UpdateBlogPost,
};
use crate::session::MaybeActor;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/blog", get(list_posts).post(create_post))
        .route("/blog/:post", get(show_post).patch(update_post).delete(delete_post))
        .route("/blog/:post/comments", get(list_comments).post(create_comment))
        .route("/blog/:post/views", post(record_view))
        .route("/categories", get(list_categories).post(create_category))
}

#[derive(Debug, Default, Deserialize)]
struct PostsQuery {
    status: Option<String>,
}

async fn list_posts(
    State(state): State<AppState>,
    actor: MaybeActor,
    Query(query): Query<PostsQuery>,
) -> Response {
    let filter = match query.status.as_deref().map(str::parse::<PostFilter>) {
        None => PostFilter::default(),
        Some(Ok(filter)) => filter,
        Some(Err(message)) => return respond::<()>(Err(ActionError::invalid("status", &message))),
    };
    let render = blog::get_blog_posts(&state.services, actor.actor(), filter);
    if filter == PostFilter::Status(PostStatus::Published) {
        read_through(&state, &actor, paths::BLOG, render).await
    } else {
        respond(render.await)
    }
}

async fn create_post(
    State(state): State<AppState>,
    actor: MaybeActor,
    Json(input): Json<NewBlogPost>,
) -> Response {
    created(blog::create_blog_post(&state.services, actor.actor(), input).await)
}

async fn show_post(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path(slug): Path<String>,
) -> Response {
    let path = paths::under(paths::BLOG, &slug);
    let render = blog::get_blog_post_by_slug(&state.services, actor.actor(), &slug);
    read_through(&state, &actor, &path, render).await
}

async fn update_post(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path(id): Path<i32>,
    Json(patch): Json<UpdateBlogPost>,
) -> Response {
    respond(blog::update_blog_post(&state.services, actor.actor(), id, patch).await)
}

async fn delete_post(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path(id): Path<i32>,
) -> Response {
    respond(blog::delete_blog_post(&state.services, actor.actor(), id).await)
}

async fn list_comments(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path(post_id): Path<i32>,
) -> Response {
    respond(blog::get_comments(&state.services, actor.actor(), post_id).await)
}

async fn create_comment(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path(post_id): Path<i32>,
    Json(input): Json<CreateCommentRequest>,
) -> Response {
    created(blog::create_comment(&state.services, actor.actor(), post_id, input).await)
}

fn header_value(headers: &HeaderMap, name: impl header::AsHeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}

/// Always answers success; a failed write is only logged.
async fn record_view(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path(post_id): Path<i32>,
    headers: HeaderMap,
) -> Response {
    let ip_address = header_value(&headers, "x-forwarded-for")
        .and_then(|forwarded| forwarded.split(',').next().map(|ip| ip.trim().to_string()));
    let user_agent = header_value(&headers, header::USER_AGENT);
    blog::increment_view(&state.services, actor.actor(), post_id, ip_address, user_agent).await;
    respond(Ok(()))
}

async fn list_categories(State(state): State<AppState>, actor: MaybeActor) -> Response {
    respond(blog::get_categories(&state.services, actor.actor()).await)
}

async fn create_category(
    State(state): State<AppState>,
    actor: MaybeActor,
    Json(input): Json<NewCategory>,
) -> Response {
    created(blog::create_category(&state.services, actor.actor(), input).await)
}
