//! Task endpoints.
//!
//! Listing and reading are public. Creating requires a valid access token;
//! updating and deleting additionally require owning the task.

use axum::{
    Router,
    extract::{Path, State},
    response::IntoResponse,
    routing::get,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::info;

use super::error::{ApiError, ResultExt, parse_id};
use super::extract::Json;
use super::response::ApiResponse;
use crate::auth::{Auth, OwnedTask};
use crate::db::{Database, Task, TaskOwner, TaskWithOwner};
use crate::impl_has_auth_backend;
use crate::jwt::JwtConfig;

#[derive(Clone)]
pub struct TasksState {
    pub db: Database,
    pub jwt: Arc<JwtConfig>,
}

impl_has_auth_backend!(TasksState);

pub fn router(state: TasksState) -> Router {
    Router::new()
        .route("/", get(list_tasks).post(create_task))
        .route("/user/{user_id}", get(list_user_tasks))
        .route("/{id}", get(get_task).put(update_task).delete(delete_task))
        .with_state(state)
}

// --- Request/response types ---

#[derive(Deserialize)]
struct CreateTaskRequest {
    #[serde(default)]
    title: String,
    status: Option<bool>,
}

#[derive(Deserialize)]
struct UpdateTaskRequest {
    title: Option<String>,
    status: Option<bool>,
}

#[derive(Serialize)]
struct OwnerView {
    id: i64,
    name: String,
    email: String,
}

impl From<TaskOwner> for OwnerView {
    fn from(owner: TaskOwner) -> Self {
        Self {
            id: owner.id,
            name: owner.name,
            email: owner.email,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct TaskView {
    id: i64,
    title: String,
    status: bool,
    user_id: i64,
    created_at: String,
    updated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    user: Option<OwnerView>,
}

impl From<Task> for TaskView {
    fn from(task: Task) -> Self {
        Self {
            id: task.id,
            title: task.title,
            status: task.status,
            user_id: task.user_id,
            created_at: task.created_at,
            updated_at: task.updated_at,
            user: None,
        }
    }
}

impl From<TaskWithOwner> for TaskView {
    fn from(row: TaskWithOwner) -> Self {
        Self {
            user: Some(row.owner.into()),
            ..row.task.into()
        }
    }
}

// --- Handlers ---

async fn list_tasks(State(state): State<TasksState>) -> Result<impl IntoResponse, ApiError> {
    let tasks = state
        .db
        .tasks()
        .list_all()
        .await
        .db_err("Failed to list tasks")?;

    Ok(ApiResponse::ok(
        "All tasks",
        tasks.into_iter().map(TaskView::from).collect::<Vec<_>>(),
    ))
}

async fn list_user_tasks(
    State(state): State<TasksState>,
    Path(user_id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = parse_id(&user_id)?;
    let tasks = state
        .db
        .tasks()
        .list_by_user(user_id)
        .await
        .db_err("Failed to list user tasks")?;

    Ok(ApiResponse::ok(
        "User tasks",
        tasks.into_iter().map(TaskView::from).collect::<Vec<_>>(),
    ))
}

async fn get_task(
    State(state): State<TasksState>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let task = state
        .db
        .tasks()
        .get_with_owner(id)
        .await
        .db_err("Failed to get task")?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;

    Ok(ApiResponse::ok("Task", TaskView::from(task)))
}

/// Create a task owned by the caller. Any owner id in the body is ignored.
async fn create_task(
    State(state): State<TasksState>,
    Auth(auth): Auth,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = payload.title.trim();
    if title.is_empty() {
        return Err(ApiError::bad_request("Title is required"));
    }

    let id = match state
        .db
        .tasks()
        .create(auth.id(), title, payload.status.unwrap_or(false))
        .await
    {
        Ok(id) => id,
        // Valid token for an account that has since been deleted
        Err(e)
            if e.as_database_error()
                .is_some_and(|db_err| db_err.is_foreign_key_violation()) =>
        {
            return Err(ApiError::not_found("User not found"));
        }
        Err(e) => return Err(ApiError::db_error("Failed to create task", e)),
    };

    let task = state
        .db
        .tasks()
        .get_by_id(id)
        .await
        .db_err("Failed to get task")?
        .ok_or_else(|| ApiError::internal("Failed to create task"))?;

    info!(task_id = id, user_id = auth.id(), "Task created");
    Ok(ApiResponse::created(
        "Task created successfully",
        TaskView::from(task),
    ))
}

async fn update_task(
    State(state): State<TasksState>,
    OwnedTask { task, .. }: OwnedTask,
    Json(payload): Json<UpdateTaskRequest>,
) -> Result<impl IntoResponse, ApiError> {
    let title = payload.title.as_deref().map(str::trim);
    if title.is_some_and(str::is_empty) {
        return Err(ApiError::bad_request("Title is required"));
    }

    let updated = state
        .db
        .tasks()
        .update(task.id, title, payload.status)
        .await
        .db_err("Failed to update task")?
        .ok_or_else(|| ApiError::not_found("Task not found"))?;

    Ok(ApiResponse::ok(
        "Task updated successfully",
        TaskView::from(updated),
    ))
}

async fn delete_task(
    State(state): State<TasksState>,
    OwnedTask { task, user }: OwnedTask,
) -> Result<impl IntoResponse, ApiError> {
    let deleted = state
        .db
        .tasks()
        .delete(task.id)
        .await
        .db_err("Failed to delete task")?;
    if !deleted {
        return Err(ApiError::not_found("Task not found"));
    }

    info!(task_id = task.id, user_id = user.id(), "Task deleted");
    Ok(ApiResponse::message("Task deleted successfully"))
}
