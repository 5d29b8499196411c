use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
};
use serde::Deserialize;

use super::{created, read_through, respond};
use crate::actions::{events, paths};
use crate::models::events::{NewEvent, UpdateEvent};
use crate::session::MaybeActor;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/events", get(list_events).post(create_event))
        .route("/events/:event", get(show_event).patch(update_event).delete(delete_event))
        .route(
            "/events/:event/registration",
            post(register).delete(cancel_registration),
        )
}

#[derive(Debug, Default, Deserialize)]
struct EventsQuery {
    #[serde(default)]
    include_unpublished: bool,
}

async fn list_events(
    State(state): State<AppState>,
    actor: MaybeActor,
    Query(query): Query<EventsQuery>,
) -> Response {
    let published_only = !query.include_unpublished;
    let render = events::get_events(&state.services, actor.actor(), published_only);
    if published_only {
        read_through(&state, &actor, paths::EVENTS, render).await
    } else {
        respond(render.await)
    }
}

async fn create_event(
    State(state): State<AppState>,
    actor: MaybeActor,
    Json(input): Json<NewEvent>,
) -> Response {
    created(events::create_event(&state.services, actor.actor(), input).await)
}

async fn show_event(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path(slug): Path<String>,
) -> Response {
    let path = paths::under(paths::EVENTS, &slug);
    let render = events::get_event_by_slug(&state.services, actor.actor(), &slug);
    read_through(&state, &actor, &path, render).await
}

async fn update_event(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path(id): Path<i32>,
    Json(patch): Json<UpdateEvent>,
) -> Response {
    respond(events::update_event(&state.services, actor.actor(), id, patch).await)
}

async fn delete_event(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path(id): Path<i32>,
) -> Response {
    respond(events::delete_event(&state.services, actor.actor(), id).await)
}

async fn register(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path(event_id): Path<i32>,
) -> Response {
    created(events::register_for_event(&state.services, actor.actor(), event_id).await)
}

async fn cancel_registration(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path(event_id): Path<i32>,
) -> Response {
    respond(events::cancel_registration(&state.services, actor.actor(), event_id).await)
}
