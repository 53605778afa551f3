use axum::{extract::State, Json};
use chrono::Utc;
use serde::Deserialize;

use crate::access::Principal;
use crate::db::Database;
use crate::due::TodoView;
use crate::error::{ApiError, ApiResult};
use crate::extract::Input;
use crate::models::{NewTodo, Permission, Todo, TodoChanges, TodoStatus};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TodoIdInput {
    pub id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateTodoInput {
    pub id: i64,
    #[serde(flatten)]
    pub changes: TodoChanges,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusInput {
    pub id: i64,
    pub status: TodoStatus,
}

pub async fn create(
    State(state): State<AppState>,
    principal: Principal,
    Input(mut input): Input<NewTodo>,
) -> ApiResult<Json<Todo>> {
    input.title = require_title(&input.title)?;
    input.tags = normalize_tags(input.tags);

    let mut db = state.db()?;
    let todo = db.create_todo(principal.id, &input)?;
    tracing::info!(todo_id = todo.id, user_id = principal.id, "task created");
    Ok(Json(todo))
}

/// The caller's own todos, newest first.
pub async fn get_all(State(state): State<AppState>, principal: Principal) -> ApiResult<Json<Vec<TodoView>>> {
    let db = state.db()?;
    let now = Utc::now();
    let todos = db
        .list_todos_for_user(principal.id)?
        .into_iter()
        .map(|todo| TodoView::new(todo, now))
        .collect();
    Ok(Json(todos))
}

pub async fn update(
    State(state): State<AppState>,
    principal: Principal,
    Input(input): Input<UpdateTodoInput>,
) -> ApiResult<Json<Todo>> {
    let mut changes = input.changes;
    if changes.is_empty() {
        return Err(ApiError::BadRequest("Nothing to update".to_string()));
    }
    if let Some(title) = &changes.title {
        changes.title = Some(require_title(title)?);
    }
    changes.tags = changes.tags.map(normalize_tags);

    let mut db = state.db()?;
    let mut todo = load(&db, input.id)?;
    principal.authorize_todo(&todo, Permission::Edit)?;

    changes.apply(&mut todo);
    let todo = db.save_todo(&todo, principal.id, &format!("Updated task with ID: {}", todo.id))?;
    tracing::info!(todo_id = todo.id, user_id = principal.id, "task updated");
    Ok(Json(todo))
}

pub async fn delete(
    State(state): State<AppState>,
    principal: Principal,
    Input(input): Input<TodoIdInput>,
) -> ApiResult<Json<Todo>> {
    let mut db = state.db()?;
    let todo = load(&db, input.id)?;
    principal.authorize_todo(&todo, Permission::Delete)?;

    let deleted = db
        .delete_todo(todo.id, principal.id, &format!("Deleted task with ID: {}", todo.id))?
        .ok_or_else(|| ApiError::todo_not_found(input.id))?;
    tracing::info!(todo_id = deleted.id, user_id = principal.id, "task deleted");
    Ok(Json(deleted))
}

pub async fn toggle_complete(
    State(state): State<AppState>,
    principal: Principal,
    Input(input): Input<TodoIdInput>,
) -> ApiResult<Json<Todo>> {
    let mut db = state.db()?;
    let mut todo = load(&db, input.id)?;
    principal.authorize_todo(&todo, Permission::Edit)?;

    todo.toggle_complete();
    let action = format!("Marked task {} as {}", todo.id, todo.status);
    let todo = db.save_todo(&todo, principal.id, &action)?;
    tracing::info!(todo_id = todo.id, status = %todo.status, "task toggled");
    Ok(Json(todo))
}

pub async fn update_status(
    State(state): State<AppState>,
    principal: Principal,
    Input(input): Input<UpdateStatusInput>,
) -> ApiResult<Json<Todo>> {
    let mut db = state.db()?;
    let mut todo = load(&db, input.id)?;
    principal.authorize_todo(&todo, Permission::Edit)?;

    todo.set_status(input.status);
    let action = format!("Moved task {} to {}", todo.id, todo.status);
    let todo = db.save_todo(&todo, principal.id, &action)?;
    tracing::info!(todo_id = todo.id, status = %todo.status, "task status changed");
    Ok(Json(todo))
}

fn load(db: &Database, id: i64) -> ApiResult<Todo> {
    db.find_todo(id)?.ok_or_else(|| ApiError::todo_not_found(id))
}

fn require_title(title: &str) -> ApiResult<String> {
    let title = title.trim();
    if title.is_empty() {
        return Err(ApiError::BadRequest("Title is required".to_string()));
    }
    Ok(title.to_string())
}

/// Trimmed, non-empty, first occurrence wins.
fn normalize_tags(tags: Vec<String>) -> Vec<String> {
    let mut normalized: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !normalized.iter().any(|t| t == tag) {
            normalized.push(tag.to_string());
        }
    }
    normalized
}
