//! Capability gate
//!
//! Pure mapping from a permission level to the actions it allows. The view
//! capability is a display hint only; returning protected data always goes
//! through a fresh [`super::AccessResolver::resolve`] call.

use serde::Serialize;

use super::permission::PermissionLevel;
use crate::models::{Manual, ManualStatus};

pub fn can_view_manual(level: PermissionLevel) -> bool {
    !matches!(level, PermissionLevel::None)
}

pub fn can_edit_manual(level: PermissionLevel) -> bool {
    matches!(level, PermissionLevel::Admin | PermissionLevel::SuperAdmin)
}

pub fn can_manage_businesses(level: PermissionLevel) -> bool {
    matches!(level, PermissionLevel::SuperAdmin)
}

pub fn can_manage_users(level: PermissionLevel) -> bool {
    matches!(level, PermissionLevel::SuperAdmin)
}

/// Whether a specific manual is visible at `level`. Workers only see
/// published manuals that are not restricted to admins.
pub fn manual_visible(level: PermissionLevel, manual: &Manual) -> bool {
    match level {
        PermissionLevel::None => false,
        PermissionLevel::Worker => {
            manual.status == ManualStatus::Published && !manual.admin_only
        }
        PermissionLevel::Admin | PermissionLevel::SuperAdmin => true,
    }
}

/// All capabilities of one level, as sent to the UI
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Capabilities {
    pub can_view_manual: bool,
    pub can_edit_manual: bool,
    pub can_manage_businesses: bool,
    pub can_manage_users: bool,
}

impl Capabilities {
    pub fn for_level(level: PermissionLevel) -> Self {
        Self {
            can_view_manual: can_view_manual(level),
            can_edit_manual: can_edit_manual(level),
            can_manage_businesses: can_manage_businesses(level),
            can_manage_users: can_manage_users(level),
        }
    }

    /// Capabilities for an untrusted level string (or its absence). Anything
    /// unrecognized grants nothing except view, which is only denied for
    /// exactly `"none"`.
    pub fn from_wire(raw: Option<&str>) -> Self {
        match raw.map(str::parse::<PermissionLevel>) {
            Some(Ok(level)) => Self::for_level(level),
            Some(Err(_)) | None => Self {
                can_view_manual: true,
                can_edit_manual: false,
                can_manage_businesses: false,
                can_manage_users: false,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use uuid::Uuid;

    fn manual(status: ManualStatus, admin_only: bool) -> Manual {
        Manual {
            id: Uuid::new_v4(),
            business_id: Uuid::new_v4(),
            title: "Opening checklist".to_string(),
            status,
            admin_only,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_capability_table() {
        use PermissionLevel::*;

        assert!(!can_view_manual(None));
        assert!(can_view_manual(Worker));
        assert!(can_view_manual(Admin));
        assert!(can_view_manual(SuperAdmin));

        assert!(!can_edit_manual(None));
        assert!(!can_edit_manual(Worker));
        assert!(can_edit_manual(Admin));
        assert!(can_edit_manual(SuperAdmin));

        for level in [None, Worker, Admin] {
            assert!(!can_manage_businesses(level));
            assert!(!can_manage_users(level));
        }
        assert!(can_manage_businesses(SuperAdmin));
        assert!(can_manage_users(SuperAdmin));
    }

    #[test]
    fn test_wire_known_levels_match_table() {
        for level in ["none", "worker", "admin", "superadmin"] {
            let parsed: PermissionLevel = level.parse().unwrap();
            assert_eq!(
                Capabilities::from_wire(Some(level)),
                Capabilities::for_level(parsed)
            );
        }
    }

    #[test]
    fn test_wire_unrecognized_levels() {
        for raw in [Some("owner"), Some("NONE"), Some(""), Option::None] {
            let caps = Capabilities::from_wire(raw);
            assert!(caps.can_view_manual, "view for {:?}", raw);
            assert!(!caps.can_edit_manual);
            assert!(!caps.can_manage_businesses);
            assert!(!caps.can_manage_users);
        }
        assert!(!Capabilities::from_wire(Some("none")).can_view_manual);
    }

    #[test]
    fn test_manual_visibility() {
        let published = manual(ManualStatus::Published, false);
        let draft = manual(ManualStatus::Draft, false);
        let restricted = manual(ManualStatus::Published, true);

        assert!(manual_visible(PermissionLevel::Worker, &published));
        assert!(!manual_visible(PermissionLevel::Worker, &draft));
        assert!(!manual_visible(PermissionLevel::Worker, &restricted));
        assert!(manual_visible(PermissionLevel::Admin, &draft));
        assert!(manual_visible(PermissionLevel::SuperAdmin, &restricted));
        assert!(!manual_visible(PermissionLevel::None, &published));
    }

    #[test]
    fn test_capabilities_serialization() {
        let value = serde_json::to_value(Capabilities::for_level(PermissionLevel::Admin)).unwrap();
        assert_eq!(value["canViewManual"], true);
        assert_eq!(value["canEditManual"], true);
        assert_eq!(value["canManageUsers"], false);
    }
}
