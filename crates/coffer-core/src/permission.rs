use std::collections::BTreeSet;
use std::collections::btree_set;
use std::fmt;
use std::str::FromStr;

use crate::error::ValidationError;

/// A fine-grained action on a file, a folder, or on the access list itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Permission {
    FileRead,
    FileWrite,
    FileDelete,
    FileShare,
    FileMove,
    FileDownload,
    FolderRead,
    FolderWrite,
    FolderCreate,
    FolderDelete,
    FolderShare,
    FolderMoveIn,
    FolderMoveOut,
    ManageAccess,
}

impl Permission {
    pub const ALL: [Permission; 14] = [
        Permission::FileRead,
        Permission::FileWrite,
        Permission::FileDelete,
        Permission::FileShare,
        Permission::FileMove,
        Permission::FileDownload,
        Permission::FolderRead,
        Permission::FolderWrite,
        Permission::FolderCreate,
        Permission::FolderDelete,
        Permission::FolderShare,
        Permission::FolderMoveIn,
        Permission::FolderMoveOut,
        Permission::ManageAccess,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Permission::FileRead => "file:read",
            Permission::FileWrite => "file:write",
            Permission::FileDelete => "file:delete",
            Permission::FileShare => "file:share",
            Permission::FileMove => "file:move",
            Permission::FileDownload => "file:download",
            Permission::FolderRead => "folder:read",
            Permission::FolderWrite => "folder:write",
            Permission::FolderCreate => "folder:create",
            Permission::FolderDelete => "folder:delete",
            Permission::FolderShare => "folder:share",
            Permission::FolderMoveIn => "folder:move_in",
            Permission::FolderMoveOut => "folder:move_out",
            Permission::ManageAccess => "manage:access",
        }
    }

    /// The scope prefix of the tag: `file`, `folder` or `manage`.
    pub fn resource_kind(&self) -> &'static str {
        match self {
            Permission::FileRead
            | Permission::FileWrite
            | Permission::FileDelete
            | Permission::FileShare
            | Permission::FileMove
            | Permission::FileDownload => "file",
            Permission::FolderRead
            | Permission::FolderWrite
            | Permission::FolderCreate
            | Permission::FolderDelete
            | Permission::FolderShare
            | Permission::FolderMoveIn
            | Permission::FolderMoveOut => "folder",
            Permission::ManageAccess => "manage",
        }
    }
}

impl FromStr for Permission {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Permission::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| ValidationError::InvalidPermission(s.to_string()))
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Set of permissions used as the resolver's accumulator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet(BTreeSet<Permission>);

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn all() -> Self {
        Permission::ALL.into_iter().collect()
    }

    pub fn insert(&mut self, permission: Permission) -> bool {
        self.0.insert(permission)
    }

    pub fn contains(&self, permission: Permission) -> bool {
        self.0.contains(&permission)
    }

    pub fn has_any(&self, permissions: &[Permission]) -> bool {
        permissions.iter().any(|p| self.0.contains(p))
    }

    pub fn has_all(&self, permissions: &[Permission]) -> bool {
        permissions.iter().all(|p| self.0.contains(p))
    }

    pub fn union(&self, other: &PermissionSet) -> PermissionSet {
        Self(self.0.union(&other.0).copied().collect())
    }

    pub fn intersection(&self, other: &PermissionSet) -> PermissionSet {
        Self(self.0.intersection(&other.0).copied().collect())
    }

    /// In-place union.
    pub fn merge(&mut self, other: &PermissionSet) {
        self.0.extend(other.0.iter().copied());
    }

    pub fn is_subset(&self, other: &PermissionSet) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = Permission> + '_ {
        self.0.iter().copied()
    }
}

impl FromIterator<Permission> for PermissionSet {
    fn from_iter<I: IntoIterator<Item = Permission>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl Extend<Permission> for PermissionSet {
    fn extend<I: IntoIterator<Item = Permission>>(&mut self, iter: I) {
        self.0.extend(iter);
    }
}

impl IntoIterator for PermissionSet {
    type Item = Permission;
    type IntoIter = btree_set::IntoIter<Permission>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl fmt::Display for PermissionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let tags: Vec<&str> = self.0.iter().map(|p| p.as_str()).collect();
        write!(f, "[{}]", tags.join(", "))
    }
}
