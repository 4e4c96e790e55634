mod permissions;

pub use permissions::PermissionResolver;

use std::future::Future;

use uuid::Uuid;

use crate::grant::{GranteeType, PermissionGrant};
use crate::group::GroupMembership;
use crate::hierarchy::MAX_FOLDER_DEPTH;
use crate::resource::ResourceRef;
use crate::tuple::Tuple;

#[derive(Debug, thiserror::Error)]
pub enum ResolveError {
    #[error("max depth exceeded: {0}")]
    MaxDepthExceeded(usize),

    #[error("storage error: {0}")]
    StorageError(String),
}

#[derive(Debug, Clone)]
pub struct ResolverConfig {
    /// Parent hops followed before giving up. A file inside the deepest
    /// allowed folder is `MAX_FOLDER_DEPTH + 1` hops from the root.
    pub max_depth: usize,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            max_depth: MAX_FOLDER_DEPTH as usize + 1,
        }
    }
}

/// Everything the resolver reads. Implementations run inside the caller's
/// session so a resolution sees the same snapshot as the command around it.
pub trait AccessReader: Send {
    fn tuple_exists(
        &mut self,
        tuple: &Tuple,
    ) -> impl Future<Output = Result<bool, ResolveError>> + Send;

    fn find_parent(
        &mut self,
        resource: &ResourceRef,
    ) -> impl Future<Output = Result<Option<ResourceRef>, ResolveError>> + Send;

    fn find_grants(
        &mut self,
        resource: &ResourceRef,
        grantee_type: GranteeType,
        grantee_ids: &[Uuid],
    ) -> impl Future<Output = Result<Vec<PermissionGrant>, ResolveError>> + Send;

    fn find_memberships_by_user_id(
        &mut self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<Vec<GroupMembership>, ResolveError>> + Send;
}
