use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Response,
    routing::{get, patch, post},
};
use serde::Deserialize;
use uuid::Uuid;

use super::{created, read_through, respond};
use crate::actions::{paths, programs};
use crate::models::programs::{
    JoinProjectRequest, NewProgram, NewProject, UpdateProgram, UpdateProject,
};
use crate::session::MaybeActor;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/programs", get(list_programs).post(create_program))
        .route(
            "/programs/:program",
            get(show_program).patch(update_program).delete(delete_program),
        )
        .route("/programs/:program/history", get(status_history))
        .route(
            "/programs/:program/leads/:user_id",
            post(add_lead).delete(remove_lead),
        )
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/:project",
            patch(update_project).delete(delete_project),
        )
        .route(
            "/projects/:project/membership",
            post(join_project).delete(leave_project),
        )
}

async fn list_programs(State(state): State<AppState>, actor: MaybeActor) -> Response {
    let render = programs::get_programs(&state.services, actor.actor());
    read_through(&state, &actor, paths::PROGRAMS, render).await
}

async fn create_program(
    State(state): State<AppState>,
    actor: MaybeActor,
    Json(input): Json<NewProgram>,
) -> Response {
    created(programs::create_program(&state.services, actor.actor(), input).await)
}

async fn show_program(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path(slug): Path<String>,
) -> Response {
    let path = paths::under(paths::PROGRAMS, &slug);
    let render = programs::get_program_by_slug(&state.services, actor.actor(), &slug);
    read_through(&state, &actor, &path, render).await
}

async fn update_program(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path(id): Path<i32>,
    Json(patch): Json<UpdateProgram>,
) -> Response {
    respond(programs::update_program(&state.services, actor.actor(), id, patch).await)
}

async fn delete_program(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path(id): Path<i32>,
) -> Response {
    respond(programs::delete_program(&state.services, actor.actor(), id).await)
}

async fn status_history(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path(id): Path<i32>,
) -> Response {
    respond(programs::get_program_status_history(&state.services, actor.actor(), id).await)
}

async fn add_lead(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path((program_id, user_id)): Path<(i32, Uuid)>,
) -> Response {
    created(programs::add_program_lead(&state.services, actor.actor(), program_id, user_id).await)
}

async fn remove_lead(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path((program_id, user_id)): Path<(i32, Uuid)>,
) -> Response {
    respond(
        programs::remove_program_lead(&state.services, actor.actor(), program_id, user_id).await,
    )
}

#[derive(Debug, Default, Deserialize)]
struct ProjectsQuery {
    program_id: Option<i32>,
}

async fn list_projects(
    State(state): State<AppState>,
    actor: MaybeActor,
    Query(query): Query<ProjectsQuery>,
) -> Response {
    let render = programs::get_projects(&state.services, actor.actor(), query.program_id);
    match query.program_id {
        None => read_through(&state, &actor, paths::PROJECTS, render).await,
        Some(_) => respond(render.await),
    }
}

async fn create_project(
    State(state): State<AppState>,
    actor: MaybeActor,
    Json(input): Json<NewProject>,
) -> Response {
    created(programs::create_project(&state.services, actor.actor(), input).await)
}

async fn update_project(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path(id): Path<i32>,
    Json(patch): Json<UpdateProject>,
) -> Response {
    respond(programs::update_project(&state.services, actor.actor(), id, patch).await)
}

async fn delete_project(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path(id): Path<i32>,
) -> Response {
    respond(programs::delete_project(&state.services, actor.actor(), id).await)
}

/// The body is optional; an empty request joins with the default role.
async fn join_project(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path(project_id): Path<i32>,
    request: Option<Json<JoinProjectRequest>>,
) -> Response {
    let request = request.map(|Json(request)| request).unwrap_or_default();
    created(programs::join_project(&state.services, actor.actor(), project_id, request).await)
}

async fn leave_project(
    State(state): State<AppState>,
    actor: MaybeActor,
    Path(project_id): Path<i32>,
) -> Response {
    respond(programs::leave_project(&state.services, actor.actor(), project_id).await)
}
