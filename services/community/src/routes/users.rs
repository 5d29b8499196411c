use axum::{
    Json, Router,
    extract::{Path, State},
    response::Response,
    routing::{get, patch},
};
use uuid::Uuid;

use super::respond;
use crate::actions::{dashboard, users};
use crate::models::users::UpdateUserRoleRequest;
use crate::session::MaybeActor;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/admin/users", get(list_users))
        .route("/admin/users/:user/role", patch(update_role))
        .route("/admin/dashboard", get(dashboard_stats))
}

async fn list_users(State(state): State<AppState>, actor: MaybeActor) -> Response {
    respond(users::get_users(&state.services, actor.actor()).await)
}

async fn update_role(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path(user_id): Path<Uuid>,
    Json(request): Json<UpdateUserRoleRequest>,
) -> Response {
    respond(users::update_user_role(&state.services, actor.actor(), user_id, request).await)
}

async fn dashboard_stats(State(state): State<AppState>, actor: MaybeActor) -> Response {
    respond(dashboard::get_dashboard_stats(&state.services, actor.actor()).await)
}
