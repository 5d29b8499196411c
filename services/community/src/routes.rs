//! HTTP surface of the community service
//!
//! Handlers resolve the caller with [`MaybeActor`](crate::session::MaybeActor),
//! call the matching action and wrap the outcome in a
//! [`ServerResponse`]. Anonymous reads of public pages go through the view
//! cache.

use std::future::Future;

use axum::{
    Json, Router,
    extract::State,
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Serialize;
use serde_json::json;
use tracing::{error, warn};

use crate::error::{ActionError, ActionResult};
use crate::response::ServerResponse;
use crate::session::MaybeActor;
use crate::state::AppState;

mod blog;
mod events;
mod governance;
mod platform;
mod programs;
mod users;

/// Create the router for the community service
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .merge(blog::router())
        .merge(events::router())
        .merge(programs::router())
        .merge(governance::router())
        .merge(platform::router())
        .merge(users::router())
        .with_state(state)
}

/// Health check endpoint
pub async fn health_check(State(state): State<AppState>) -> Response {
    let store = state.services.store.backend_name();
    match state.services.store.health_check().await {
        Ok(()) => Json(json!({
            "status": "ok",
            "service": "community-service",
            "store": store,
        }))
        .into_response(),
        Err(e) => {
            error!("Health check failed: {}", e);
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(json!({
                    "status": "unavailable",
                    "service": "community-service",
                    "store": store,
                })),
            )
                .into_response()
        }
    }
}

fn failure(err: ActionError) -> Response {
    if let ActionError::Persistence(message) = &err {
        error!("Action failed in the store: {}", message);
    }
    err.into_response()
}

/// `200` with the action's data, or the error's status and envelope.
pub(crate) fn respond<T: Serialize>(result: ActionResult<T>) -> Response {
    match result {
        Ok(data) => Json(ServerResponse::ok(data)).into_response(),
        Err(err) => failure(err),
    }
}

/// Like [`respond`], answering `201 Created` on success.
pub(crate) fn created<T: Serialize>(result: ActionResult<T>) -> Response {
    match result {
        Ok(data) => (StatusCode::CREATED, Json(ServerResponse::ok(data))).into_response(),
        Err(err) => failure(err),
    }
}

/// Serve `path` from the view cache for anonymous callers, rendering and
/// storing it on a miss. Signed-in callers always get a fresh render.
pub(crate) async fn read_through<T, F>(
    state: &AppState,
    actor: &MaybeActor,
    path: &str,
    render: F,
) -> Response
where
    T: Serialize,
    F: Future<Output = ActionResult<T>>,
{
    let cacheable = actor.actor().is_none();
    if cacheable {
        match state.services.views.get(path).await {
            Ok(Some(body)) => {
                return ([(header::CONTENT_TYPE, "application/json")], body).into_response();
            }
            Ok(None) => {}
            Err(e) => warn!(path, "View cache read failed: {}", e),
        }
    }

    let data = match render.await {
        Ok(data) => data,
        Err(err) => return failure(err),
    };
    let body = ServerResponse::ok(data);
    if cacheable {
        match serde_json::to_string(&body) {
            Ok(rendered) => {
                if let Err(e) = state.services.views.put(path, &rendered).await {
                    warn!(path, "View cache write failed: {}", e);
                }
            }
            Err(e) => warn!(path, "Failed to render view: {}", e),
        }
    }
    Json(body).into_response()
}
