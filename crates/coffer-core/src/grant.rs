use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::resource::ResourceRef;
use crate::role::Role;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum GranteeType {
    User,
    Group,
}

impl GranteeType {
    pub fn as_str(self) -> &'static str {
        match self {
            GranteeType::User => "user",
            GranteeType::Group => "group",
        }
    }
}

impl FromStr for GranteeType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(GranteeType::User),
            "group" => Ok(GranteeType::Group),
            other => Err(ValidationError::InvalidGranteeType(other.to_string())),
        }
    }
}

impl fmt::Display for GranteeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Grantee {
    pub grantee_type: GranteeType,
    pub grantee_id: Uuid,
}

impl Grantee {
    pub fn user(id: Uuid) -> Self {
        Self {
            grantee_type: GranteeType::User,
            grantee_id: id,
        }
    }

    pub fn group(id: Uuid) -> Self {
        Self {
            grantee_type: GranteeType::Group,
            grantee_id: id,
        }
    }
}

impl fmt::Display for Grantee {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.grantee_type, self.grantee_id)
    }
}

/// An explicit, revocable role assignment on a file or folder.
///
/// Unique on `(resource, grantee, role)`. The role is never [`Role::Owner`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermissionGrant {
    pub id: Uuid,
    pub resource: ResourceRef,
    pub grantee: Grantee,
    pub role: Role,
    pub granted_by: Uuid,
    pub granted_at: DateTime<Utc>,
}

impl PermissionGrant {
    pub fn new(resource: ResourceRef, grantee: Grantee, role: Role, granted_by: Uuid) -> Self {
        Self {
            id: Uuid::new_v4(),
            resource,
            grantee,
            role,
            granted_by,
            granted_at: Utc::now(),
        }
    }

    pub fn same_assignment(&self, other: &PermissionGrant) -> bool {
        self.resource == other.resource && self.grantee == other.grantee && self.role == other.role
    }
}
