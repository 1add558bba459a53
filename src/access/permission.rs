//! Permission levels derived from a user and a business

use serde::{Deserialize, Serialize};

use crate::models::Role;

/// Derived authorization tier for a (user, business) pair. Never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionLevel {
    None,
    Worker,
    Admin,
    SuperAdmin,
}

impl PermissionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermissionLevel::None => "none",
            PermissionLevel::Worker => "worker",
            PermissionLevel::Admin => "admin",
            PermissionLevel::SuperAdmin => "superadmin",
        }
    }

    /// Level granted by a business role
    pub fn from_role(role: Role) -> Self {
        match role {
            Role::Admin => PermissionLevel::Admin,
            Role::Worker => PermissionLevel::Worker,
        }
    }

    /// Whether this level may run work sessions
    pub fn can_execute(&self) -> bool {
        !matches!(self, PermissionLevel::None)
    }
}

impl std::fmt::Display for PermissionLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PermissionLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "none" => Ok(PermissionLevel::None),
            "worker" => Ok(PermissionLevel::Worker),
            "admin" => Ok(PermissionLevel::Admin),
            "superadmin" => Ok(PermissionLevel::SuperAdmin),
            _ => Err(format!("Invalid permission level: {}", s)),
        }
    }
}

/// Read-shaped projection of a resolved level, for rendering role badges
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccessDescriptor {
    pub has_access: bool,
    pub role: Option<Role>,
    pub is_super_admin: bool,
}

impl From<PermissionLevel> for AccessDescriptor {
    fn from(level: PermissionLevel) -> Self {
        match level {
            PermissionLevel::None => Self {
                has_access: false,
                role: None,
                is_super_admin: false,
            },
            PermissionLevel::Worker => Self {
                has_access: true,
                role: Some(Role::Worker),
                is_super_admin: false,
            },
            PermissionLevel::Admin => Self {
                has_access: true,
                role: Some(Role::Admin),
                is_super_admin: false,
            },
            PermissionLevel::SuperAdmin => Self {
                has_access: true,
                role: None,
                is_super_admin: true,
            },
        }
    }
}
