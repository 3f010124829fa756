use serde::Serialize;

use crate::db::DbPool;
use crate::models::admin::Admin;

/// What a user may do, derived from the presence and value of their admin row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guest,
    Editor,
    Admin,
    SuperAdmin,
}

impl Role {
    /// `None` (no admin row) is a guest. Any row at all grants admin privilege,
    /// so an unrecognised value degrades to the weakest admin role.
    pub fn from_admin_row(role: Option<&str>) -> Role {
        match role {
            None => Role::Guest,
            Some("editor") => Role::Editor,
            Some("admin") => Role::Admin,
            Some("superadmin") => Role::SuperAdmin,
            Some(other) => {
                log::warn!("Unknown admin role '{}', treating as editor", other);
                Role::Editor
            }
        }
    }

    /// Roles that can be written to the admins table.
    pub fn parse_assignable(s: &str) -> Option<Role> {
        match s {
            "editor" => Some(Role::Editor),
            "admin" => Some(Role::Admin),
            "superadmin" => Some(Role::SuperAdmin),
            _ => None,
        }
    }

    pub fn as_db_str(&self) -> Option<&'static str> {
        match self {
            Role::Guest => None,
            Role::Editor => Some("editor"),
            Role::Admin => Some("admin"),
            Role::SuperAdmin => Some("superadmin"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Capability {
    pub is_admin: bool,
    pub role: Role,
}

impl Capability {
    pub fn guest() -> Self {
        Capability::from_role(Role::Guest)
    }

    pub fn from_role(role: Role) -> Self {
        Capability {
            is_admin: role != Role::Guest,
            role,
        }
    }

    pub fn resolve(pool: &DbPool, user_id: i64) -> Result<Self, String> {
        let row = Admin::role_for(pool, user_id)?;
        Ok(Capability::from_role(Role::from_admin_row(row.as_deref())))
    }

    /// Owner of the resource, or any admin.
    pub fn can_edit(&self, actor_id: i64, owner_id: i64) -> bool {
        actor_id == owner_id || self.is_admin
    }

    pub fn can_moderate(&self) -> bool {
        self.is_admin
    }

    pub fn can_upload(&self) -> bool {
        self.is_admin
    }

    pub fn can_manage_users(&self) -> bool {
        matches!(self.role, Role::Admin | Role::SuperAdmin)
    }

    pub fn can_assign_roles(&self) -> bool {
        self.role == Role::SuperAdmin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn row_presence_grants_admin() {
        assert!(!Capability::from_role(Role::from_admin_row(None)).is_admin);
        for row in ["editor", "admin", "superadmin", "mystery"] {
            assert!(Capability::from_role(Role::from_admin_row(Some(row))).is_admin);
        }
        assert_eq!(Role::from_admin_row(Some("mystery")), Role::Editor);
    }

    #[test]
    fn permission_predicates() {
        let guest = Capability::guest();
        let editor = Capability::from_role(Role::Editor);
        let admin = Capability::from_role(Role::Admin);
        let superadmin = Capability::from_role(Role::SuperAdmin);

        assert!(guest.can_edit(7, 7));
        assert!(!guest.can_edit(7, 8));
        assert!(editor.can_edit(7, 8));

        assert!(!guest.can_upload());
        assert!(editor.can_upload());

        assert!(!editor.can_manage_users());
        assert!(admin.can_manage_users());
        assert!(superadmin.can_manage_users());

        assert!(!admin.can_assign_roles());
        assert!(superadmin.can_assign_roles());
    }

    #[test]
    fn assignable_roles_round_trip_to_db() {
        for s in ["editor", "admin", "superadmin"] {
            assert_eq!(Role::parse_assignable(s).and_then(|r| r.as_db_str()), Some(s));
        }
        assert_eq!(Role::parse_assignable("guest"), None);
    }
}
