//! Role and capability rules.
//!
//! Admins hold every capability, subadmins hold what an admin granted them and
//! plain users hold none. Owners can always act on their own todos.

use crate::error::ApiError;
use crate::models::{Permission, PermissionSet, Role, Todo, User};

/// The authenticated caller, as currently stored.
#[derive(Debug, Clone)]
pub struct Principal {
    pub id: i64,
    pub email: String,
    pub role: Role,
    pub permissions: PermissionSet,
}

impl From<&User> for Principal {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            email: user.email.clone(),
            role: user.role,
            permissions: user.permissions.clone(),
        }
    }
}

impl Principal {
    pub fn capabilities(&self) -> PermissionSet {
        match self.role {
            Role::Admin => PermissionSet::all(),
            Role::Subadmin => self.permissions.clone(),
            Role::User => PermissionSet::empty(),
        }
    }

    pub fn can(&self, permission: Permission) -> bool {
        self.capabilities().contains(permission)
    }

    pub fn require_admin(&self) -> Result<(), ApiError> {
        if self.role == Role::Admin {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Admin access required".to_string()))
        }
    }

    pub fn require_staff(&self) -> Result<(), ApiError> {
        if self.role.is_staff() {
            Ok(())
        } else {
            Err(ApiError::Forbidden("Admin or subadmin access required".to_string()))
        }
    }

    /// Staff role plus the given capability.
    pub fn require(&self, permission: Permission) -> Result<(), ApiError> {
        self.require_staff()?;
        if self.can(permission) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!("Missing {permission} permission")))
        }
    }

    /// Owners pass; everyone else needs `permission`.
    pub fn authorize_todo(&self, todo: &Todo, permission: Permission) -> Result<(), ApiError> {
        if todo.user_id == self.id || self.can(permission) {
            Ok(())
        } else {
            Err(ApiError::Forbidden(format!(
                "Not allowed to {permission} task {}",
                todo.id
            )))
        }
    }
}

/// A requested role change, before it is applied.
#[derive(Debug, Clone)]
pub struct RoleChange {
    pub role: Role,
    pub permissions: PermissionSet,
}

impl RoleChange {
    /// Permissions only stick to subadmins; admins hold everything implicitly.
    pub fn new(role: Role, requested: Option<PermissionSet>) -> Self {
        let permissions = match role {
            Role::Subadmin => requested.unwrap_or_default(),
            Role::User | Role::Admin => PermissionSet::empty(),
        };
        Self { role, permissions }
    }
}

/// Checks whether `actor` may apply `change` to `target`.
///
/// Keeping at least one admin is enforced by the store when the change is written.
pub fn authorize_role_change(actor: &Principal, target: &User, change: &RoleChange) -> Result<(), ApiError> {
    actor.require_staff()?;

    if actor.id == target.id {
        return Err(ApiError::Forbidden("You cannot change your own role".to_string()));
    }

    if target.role == Role::Admin || change.role == Role::Admin {
        actor.require_admin().map_err(|_| {
            ApiError::Forbidden(
                "Subadmins may only switch users between user and subadmin".to_string(),
            )
        })?;
    }

    if actor.role == Role::Subadmin {
        if !actor.can(Permission::Edit) {
            return Err(ApiError::Forbidden("Missing edit permission".to_string()));
        }
        if !change.permissions.is_subset_of(&actor.permissions) {
            return Err(ApiError::Forbidden(
                "Subadmins may only grant permissions they hold".to_string(),
            ));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;
    use crate::models::TodoStatus;

    fn principal(id: i64, role: Role, permissions: &[Permission]) -> Principal {
        Principal {
            id,
            email: format!("user{id}@example.com"),
            role,
            permissions: permissions.iter().copied().collect(),
        }
    }

    fn user(id: i64, role: Role) -> User {
        User {
            id,
            email: format!("user{id}@example.com"),
            password_hash: String::new(),
            name: None,
            role,
            permissions: PermissionSet::empty(),
            reset_token: None,
            reset_token_expires_at: None,
            created_at: Utc::now(),
        }
    }

    fn todo_owned_by(user_id: i64) -> Todo {
        let now = Utc::now();
        Todo {
            id: 10,
            title: "t".to_string(),
            description: None,
            tags: vec![],
            deadline: None,
            reminder: None,
            status: TodoStatus::Todo,
            completed: false,
            user_id,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn capability_matrix() {
        let admin = principal(1, Role::Admin, &[]);
        let sub = principal(2, Role::Subadmin, &[Permission::View]);
        // Leftover grants on a plain user carry no weight.
        let plain = principal(3, Role::User, &[Permission::Delete]);

        for permission in Permission::ALL {
            assert!(admin.can(permission));
            assert!(!plain.can(permission));
        }
        assert!(sub.can(Permission::View));
        assert!(!sub.can(Permission::Edit));
        assert!(!sub.can(Permission::Delete));
    }

    #[test]
    fn procedure_tiers() {
        let admin = principal(1, Role::Admin, &[]);
        let sub = principal(2, Role::Subadmin, &[Permission::Delete]);
        let plain = principal(3, Role::User, &[]);

        assert!(admin.require_admin().is_ok());
        assert!(matches!(sub.require_admin(), Err(ApiError::Forbidden(_))));
        assert!(sub.require_staff().is_ok());
        assert!(matches!(plain.require_staff(), Err(ApiError::Forbidden(_))));

        assert!(sub.require(Permission::Delete).is_ok());
        assert!(matches!(sub.require(Permission::View), Err(ApiError::Forbidden(_))));
        assert!(matches!(plain.require(Permission::View), Err(ApiError::Forbidden(_))));
    }

    #[test]
    fn todo_access() {
        let owner = principal(5, Role::User, &[]);
        let stranger = principal(6, Role::User, &[]);
        let editor = principal(7, Role::Subadmin, &[Permission::Edit]);
        let todo = todo_owned_by(5);

        assert!(owner.authorize_todo(&todo, Permission::Delete).is_ok());
        assert!(stranger.authorize_todo(&todo, Permission::Edit).is_err());
        assert!(editor.authorize_todo(&todo, Permission::Edit).is_ok());
        assert!(editor.authorize_todo(&todo, Permission::Delete).is_err());
    }

    #[test]
    fn role_change_drops_permissions_outside_subadmin() {
        let grants = Some(PermissionSet::all());
        assert_eq!(RoleChange::new(Role::Subadmin, grants.clone()).permissions, PermissionSet::all());
        assert!(RoleChange::new(Role::Admin, grants.clone()).permissions.is_empty());
        assert!(RoleChange::new(Role::User, grants).permissions.is_empty());
        assert!(RoleChange::new(Role::Subadmin, None).permissions.is_empty());
    }

    #[test]
    fn admin_may_grant_anything_but_not_to_self() {
        let admin = principal(1, Role::Admin, &[]);
        let change = RoleChange::new(Role::Admin, None);

        assert!(authorize_role_change(&admin, &user(2, Role::User), &change).is_ok());
        assert!(matches!(
            authorize_role_change(&admin, &user(1, Role::Admin), &RoleChange::new(Role::User, None)),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn admin_may_demote_another_admin() {
        let admin = principal(1, Role::Admin, &[]);
        let demote = RoleChange::new(Role::User, None);
        assert!(authorize_role_change(&admin, &user(2, Role::Admin), &demote).is_ok());
    }

    #[test]
    fn subadmin_toggles_only_between_user_and_subadmin() {
        let sub = principal(2, Role::Subadmin, &[Permission::View, Permission::Edit]);
        let to_sub = RoleChange::new(Role::Subadmin, Some(vec![Permission::View].into()));
        let to_user = RoleChange::new(Role::User, None);
        let to_admin = RoleChange::new(Role::Admin, None);

        assert!(authorize_role_change(&sub, &user(3, Role::User), &to_sub).is_ok());
        assert!(authorize_role_change(&sub, &user(3, Role::Subadmin), &to_user).is_ok());
        assert!(matches!(
            authorize_role_change(&sub, &user(3, Role::User), &to_admin),
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            authorize_role_change(&sub, &user(1, Role::Admin), &to_user),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn subadmin_needs_edit_and_cannot_escalate_grants() {
        let viewer = principal(2, Role::Subadmin, &[Permission::View]);
        let editor = principal(4, Role::Subadmin, &[Permission::Edit]);
        let wide = RoleChange::new(Role::Subadmin, Some(PermissionSet::all()));
        let to_user = RoleChange::new(Role::User, None);

        assert!(matches!(
            authorize_role_change(&viewer, &user(3, Role::User), &to_user),
            Err(ApiError::Forbidden(_))
        ));
        assert!(matches!(
            authorize_role_change(&editor, &user(3, Role::User), &wide),
            Err(ApiError::Forbidden(_))
        ));
    }

    #[test]
    fn plain_users_cannot_change_roles() {
        let plain = principal(3, Role::User, &[]);
        assert!(matches!(
            authorize_role_change(&plain, &user(4, Role::User), &RoleChange::new(Role::Subadmin, None)),
            Err(ApiError::Forbidden(_))
        ));
    }
}
