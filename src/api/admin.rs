use axum::{extract::State, Json};
use serde::{Deserialize, Serialize};

use crate::access::{authorize_role_change, Principal, RoleChange};
use crate::db::RoleUpdate;
use crate::error::{ApiError, ApiResult};
use crate::extract::{Input, StaffPrincipal};
use crate::models::{ActivityLog, Permission, PermissionSet, PublicUser, Role, Todo};
use crate::AppState;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateUserRoleInput {
    pub user_id: i64,
    pub role: Role,
    pub permissions: Option<Vec<Permission>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteTaskInput {
    pub task_id: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserIdInput {
    pub user_id: i64,
}

/// A user together with their todos and the activity they caused.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOverview {
    #[serde(flatten)]
    pub user: PublicUser,
    pub todos: Vec<Todo>,
    pub activity_logs: Vec<ActivityLog>,
}

pub async fn get_users(
    State(state): State<AppState>,
    StaffPrincipal(principal): StaffPrincipal,
) -> ApiResult<Json<Vec<UserOverview>>> {
    principal.require(Permission::View)?;

    let db = state.db()?;
    let mut overviews = Vec::new();
    for user in db.list_users()? {
        overviews.push(UserOverview {
            todos: db.list_todos_for_user(user.id)?,
            activity_logs: db.list_activity_logs_for_user(user.id)?,
            user: PublicUser::from(&user),
        });
    }
    Ok(Json(overviews))
}

pub async fn update_user_role(
    State(state): State<AppState>,
    StaffPrincipal(principal): StaffPrincipal,
    Input(input): Input<UpdateUserRoleInput>,
) -> ApiResult<Json<PublicUser>> {
    let mut db = state.db()?;
    let target = db
        .find_user(input.user_id)?
        .ok_or_else(|| ApiError::user_not_found(input.user_id))?;

    let change = RoleChange::new(input.role, input.permissions.map(PermissionSet::from));
    authorize_role_change(&principal, &target, &change)?;

    let action = format!("Updated role of {} to {}", target.email, change.role);
    let updated = match db.update_role(target.id, change.role, &change.permissions, principal.id, &action)? {
        RoleUpdate::Updated(user) => user,
        RoleUpdate::UserNotFound => return Err(ApiError::user_not_found(target.id)),
        RoleUpdate::LastAdmin => {
            return Err(ApiError::Conflict("Cannot demote the last admin".to_string()))
        }
    };

    tracing::info!(
        actor_id = principal.id,
        user_id = updated.id,
        role = %updated.role,
        permissions = ?updated.permissions,
        "role updated"
    );
    Ok(Json(PublicUser::from(&updated)))
}

pub async fn delete_task(
    State(state): State<AppState>,
    StaffPrincipal(principal): StaffPrincipal,
    Input(input): Input<DeleteTaskInput>,
) -> ApiResult<Json<Todo>> {
    principal.require(Permission::Delete)?;

    let mut db = state.db()?;
    let action = format!("Deleted task with ID: {}", input.task_id);
    let deleted = db
        .delete_todo(input.task_id, principal.id, &action)?
        .ok_or_else(|| ApiError::todo_not_found(input.task_id))?;

    tracing::info!(actor_id = principal.id, todo_id = deleted.id, owner_id = deleted.user_id, "task removed by staff");
    Ok(Json(deleted))
}

/// Effective capabilities of a user; admins report the full set.
pub async fn get_user_permissions(
    State(state): State<AppState>,
    StaffPrincipal(principal): StaffPrincipal,
    Input(input): Input<UserIdInput>,
) -> ApiResult<Json<PermissionSet>> {
    principal.require(Permission::View)?;

    let db = state.db()?;
    let user = db
        .find_user(input.user_id)?
        .ok_or_else(|| ApiError::user_not_found(input.user_id))?;
    Ok(Json(Principal::from(&user).capabilities()))
}

pub async fn get_activity_logs(
    State(state): State<AppState>,
    StaffPrincipal(principal): StaffPrincipal,
) -> ApiResult<Json<Vec<ActivityLog>>> {
    principal.require(Permission::View)?;

    let db = state.db()?;
    Ok(Json(db.list_activity_logs()?))
}
