use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use tracing::instrument;
use uuid::Uuid;

use crate::{
    auth::extractors::{require_owner, AuthUser},
    error::AppError,
    state::AppState,
};

use super::{
    dto::{CreateTask, TaskFilter, TaskListResponse, UpdateTask},
    repo::Task,
};

pub fn task_routes() -> Router<AppState> {
    Router::new()
        .route("/users/:user_id/tasks", get(list_tasks).post(create_task))
        .route(
            "/users/:user_id/tasks/:task_id",
            get(get_task).put(update_task).delete(delete_task),
        )
}

#[instrument(skip(state, claims))]
pub async fn list_tasks(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(user_id): Path<Uuid>,
    Query(filter): Query<TaskFilter>,
) -> Result<Json<TaskListResponse>, AppError> {
    let owner_id = require_owner(&claims, user_id)?;
    let tasks = Task::list(&state.db, owner_id, &filter).await?;
    Ok(Json(TaskListResponse { tasks }))
}

#[instrument(skip(state, claims, payload))]
pub async fn create_task(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path(user_id): Path<Uuid>,
    Json(payload): Json<CreateTask>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    let owner_id = require_owner(&claims, user_id)?;
    let task = Task::create(&state.db, owner_id, payload).await?;
    Ok((StatusCode::CREATED, Json(task)))
}

#[instrument(skip(state, claims))]
pub async fn get_task(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path((user_id, task_id)): Path<(Uuid, Uuid)>,
) -> Result<Json<Task>, AppError> {
    let owner_id = require_owner(&claims, user_id)?;
    let task = Task::get(&state.db, owner_id, task_id).await?;
    Ok(Json(task))
}

#[instrument(skip(state, claims, payload))]
pub async fn update_task(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path((user_id, task_id)): Path<(Uuid, Uuid)>,
    Json(payload): Json<UpdateTask>,
) -> Result<Json<Task>, AppError> {
    let owner_id = require_owner(&claims, user_id)?;
    let task = Task::update(&state.db, owner_id, task_id, payload).await?;
    Ok(Json(task))
}

#[instrument(skip(state, claims))]
pub async fn delete_task(
    State(state): State<AppState>,
    AuthUser(claims): AuthUser,
    Path((user_id, task_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, AppError> {
    let owner_id = require_owner(&claims, user_id)?;
    Task::delete(&state.db, owner_id, task_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
