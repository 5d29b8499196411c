use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Response,
    routing::{get, post},
};
use serde::Deserialize;

use super::{created, respond};
use crate::actions::platform;
use crate::models::platform::{NewNotification, UpdatePreferenceRequest, UpdateSettingRequest};
use crate::session::MaybeActor;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/settings/:key", get(show_setting).put(update_setting))
        .route(
            "/notifications",
            get(list_notifications).post(create_notification),
        )
        .route("/notifications/read-all", post(mark_all_read))
        .route("/notifications/:notification/read", post(mark_read))
        .route(
            "/notification-preferences",
            get(list_preferences).put(update_preference),
        )
        .route("/admin/audit-logs", get(list_audit_logs))
}

async fn show_setting(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path(key): Path<String>,
) -> Response {
    respond(platform::get_system_setting(&state.services, actor.actor(), &key).await)
}

async fn update_setting(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path(key): Path<String>,
    Json(update): Json<UpdateSettingRequest>,
) -> Response {
    respond(platform::update_system_setting(&state.services, actor.actor(), &key, update).await)
}

async fn list_notifications(State(state): State<AppState>, actor: MaybeActor) -> Response {
    respond(platform::get_notifications(&state.services, actor.actor()).await)
}

async fn create_notification(
    State(state): State<AppState>,
    actor: MaybeActor,
    Json(input): Json<NewNotification>,
) -> Response {
    created(platform::create_notification(&state.services, actor.actor(), input).await)
}

async fn mark_read(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path(id): Path<i32>,
) -> Response {
    respond(platform::mark_notification_as_read(&state.services, actor.actor(), id).await)
}

async fn mark_all_read(State(state): State<AppState>, actor: MaybeActor) -> Response {
    respond(platform::mark_all_notifications_as_read(&state.services, actor.actor()).await)
}

async fn list_preferences(State(state): State<AppState>, actor: MaybeActor) -> Response {
    respond(platform::get_notification_preferences(&state.services, actor.actor()).await)
}

async fn update_preference(
    State(state): State<AppState>,
    actor: MaybeActor,
    Json(request): Json<UpdatePreferenceRequest>,
) -> Response {
    respond(platform::update_notification_preference(&state.services, actor.actor(), request).await)
}

#[derive(Debug, Deserialize)]
struct AuditQuery {
    #[serde(default = "default_audit_limit")]
    limit: i64,
}

fn default_audit_limit() -> i64 {
    100
}

async fn list_audit_logs(
    State(state): State<AppState>,
    actor: MaybeActor,
    Query(query): Query<AuditQuery>,
) -> Response {
    respond(platform::get_audit_logs(&state.services, actor.actor(), query.limit).await)
}
