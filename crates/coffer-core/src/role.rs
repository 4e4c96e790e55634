use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;
use crate::permission::{Permission, PermissionSet};

const VIEWER_PERMISSIONS: &[Permission] = &[
    Permission::FileRead,
    Permission::FileDownload,
    Permission::FolderRead,
];

const CONTRIBUTOR_PERMISSIONS: &[Permission] = &[
    Permission::FileWrite,
    Permission::FolderWrite,
    Permission::FolderCreate,
    Permission::FolderMoveIn,
];

const CONTENT_MANAGER_PERMISSIONS: &[Permission] = &[
    Permission::FileDelete,
    Permission::FileShare,
    Permission::FileMove,
    Permission::FolderDelete,
    Permission::FolderShare,
    Permission::FolderMoveOut,
];

const OWNER_PERMISSIONS: &[Permission] = &[Permission::ManageAccess];

/// Access roles, ordered by level. Declaration order is level order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Role {
    Viewer,
    Contributor,
    ContentManager,
    Owner,
}

impl Role {
    pub const ALL: [Role; 4] = [
        Role::Viewer,
        Role::Contributor,
        Role::ContentManager,
        Role::Owner,
    ];

    /// Roles that may be stored as a grant. `Owner` only exists as a relationship.
    pub const GRANTABLE: [Role; 3] = [Role::Viewer, Role::Contributor, Role::ContentManager];

    pub fn level(self) -> u8 {
        match self {
            Role::Viewer => 1,
            Role::Contributor => 2,
            Role::ContentManager => 3,
            Role::Owner => 4,
        }
    }

    pub fn includes(self, other: Role) -> bool {
        self.level() >= other.level()
    }

    /// Strict: a role never grants its own level or above, and nobody grants `Owner`.
    pub fn can_grant(self, target: Role) -> bool {
        target != Role::Owner && self.level() > target.level()
    }

    pub fn permissions(self) -> PermissionSet {
        let tiers: &[&[Permission]] = match self {
            Role::Viewer => &[VIEWER_PERMISSIONS],
            Role::Contributor => &[VIEWER_PERMISSIONS, CONTRIBUTOR_PERMISSIONS],
            Role::ContentManager => &[
                VIEWER_PERMISSIONS,
                CONTRIBUTOR_PERMISSIONS,
                CONTENT_MANAGER_PERMISSIONS,
            ],
            Role::Owner => &[
                VIEWER_PERMISSIONS,
                CONTRIBUTOR_PERMISSIONS,
                CONTENT_MANAGER_PERMISSIONS,
                OWNER_PERMISSIONS,
            ],
        };
        tiers.iter().flat_map(|tier| tier.iter().copied()).collect()
    }

    pub fn has_permission(self, permission: Permission) -> bool {
        self.permissions().contains(permission)
    }

    pub fn grantable_roles(self) -> Vec<Role> {
        Role::GRANTABLE
            .into_iter()
            .filter(|target| self.can_grant(*target))
            .collect()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::Contributor => "contributor",
            Role::ContentManager => "content_manager",
            Role::Owner => "owner",
        }
    }
}

impl FromStr for Role {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "viewer" => Ok(Role::Viewer),
            "contributor" => Ok(Role::Contributor),
            "content_manager" => Ok(Role::ContentManager),
            "owner" => Ok(Role::Owner),
            other => Err(ValidationError::InvalidRole(other.to_string())),
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
