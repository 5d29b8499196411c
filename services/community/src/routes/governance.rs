use axum::{
    Json, Router,
    extract::{Path, State},
    response::Response,
    routing::{get, patch, post, put},
};
use uuid::Uuid;

use super::{created, read_through, respond};
use crate::actions::{governance, paths};
use crate::models::governance::{
    NewCommunityRole, NewPermission, UpdateCommunityRole, UpdateContributorProfile,
};
use crate::session::MaybeActor;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/roles", get(list_roles).post(create_role))
        .route("/roles/:role", patch(update_role).delete(delete_role))
        .route("/roles/:role/permissions", get(role_permissions))
        .route(
            "/roles/:role/permissions/:permission",
            post(grant_permission).delete(revoke_permission),
        )
        .route("/permissions", get(list_permissions).post(create_permission))
        .route(
            "/admin/users/:user/roles/:role",
            post(assign_role).delete(remove_role),
        )
        .route("/profile", put(update_profile))
        .route("/profile/:user", get(show_profile))
}

async fn list_roles(State(state): State<AppState>, actor: MaybeActor) -> Response {
    let render = governance::get_roles(&state.services, actor.actor());
    read_through(&state, &actor, paths::ROLES, render).await
}

async fn create_role(
    State(state): State<AppState>,
    actor: MaybeActor,
    Json(input): Json<NewCommunityRole>,
) -> Response {
    created(governance::create_role(&state.services, actor.actor(), input).await)
}

async fn update_role(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path(id): Path<i32>,
    Json(patch): Json<UpdateCommunityRole>,
) -> Response {
    respond(governance::update_role(&state.services, actor.actor(), id, patch).await)
}

async fn delete_role(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path(id): Path<i32>,
) -> Response {
    respond(governance::delete_role(&state.services, actor.actor(), id).await)
}

async fn role_permissions(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path(role_id): Path<i32>,
) -> Response {
    respond(governance::get_role_permissions(&state.services, actor.actor(), role_id).await)
}

async fn grant_permission(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path((role_id, permission_id)): Path<(i32, i32)>,
) -> Response {
    respond(
        governance::grant_permission(&state.services, actor.actor(), role_id, permission_id).await,
    )
}

async fn revoke_permission(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path((role_id, permission_id)): Path<(i32, i32)>,
) -> Response {
    respond(
        governance::revoke_permission(&state.services, actor.actor(), role_id, permission_id)
            .await,
    )
}

async fn list_permissions(State(state): State<AppState>, actor: MaybeActor) -> Response {
    respond(governance::get_permissions(&state.services, actor.actor()).await)
}

async fn create_permission(
    State(state): State<AppState>,
    actor: MaybeActor,
    Json(input): Json<NewPermission>,
) -> Response {
    created(governance::create_permission(&state.services, actor.actor(), input).await)
}

async fn assign_role(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path((user_id, role_id)): Path<(Uuid, i32)>,
) -> Response {
    created(governance::assign_role_to_user(&state.services, actor.actor(), user_id, role_id).await)
}

async fn remove_role(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path((user_id, role_id)): Path<(Uuid, i32)>,
) -> Response {
    respond(
        governance::remove_role_from_user(&state.services, actor.actor(), user_id, role_id).await,
    )
}

async fn show_profile(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path(user_id): Path<Uuid>,
) -> Response {
    let path = paths::under(paths::PROFILE, &user_id.to_string());
    let render = governance::get_contributor_profile(&state.services, actor.actor(), user_id);
    read_through(&state, &actor, &path, render).await
}

async fn update_profile(
    State(state): State<AppState>,
    actor: MaybeActor,
    Json(patch): Json<UpdateContributorProfile>,
) -> Response {
    respond(governance::update_contributor_profile(&state.services, actor.actor(), patch).await)
}
