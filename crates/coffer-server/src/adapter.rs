use uuid::Uuid;

use coffer_core::ResourceRef;
use coffer_core::grant::{GranteeType, PermissionGrant};
use coffer_core::group::GroupMembership;
use coffer_core::resolver::{AccessReader, ResolveError};
use coffer_core::tuple::Tuple;
use coffer_storage::{
    MembershipRepository, PermissionGrantRepository, RelationshipRepository, Session,
};

/// Lets the resolver read through an open session, so a check made inside a
/// command sees that command's uncommitted writes.
pub struct SessionReader<'a, S: Session> {
    session: &'a mut S,
}

impl<'a, S: Session> SessionReader<'a, S> {
    pub fn new(session: &'a mut S) -> Self {
        Self { session }
    }
}

fn to_resolve_error(err: coffer_storage::StorageError) -> ResolveError {
    ResolveError::StorageError(err.to_string())
}

impl<S: Session> AccessReader for SessionReader<'_, S> {
    async fn tuple_exists(&mut self, tuple: &Tuple) -> Result<bool, ResolveError> {
        self.session
            .relationship_exists(tuple)
            .await
            .map_err(to_resolve_error)
    }

    async fn find_parent(
        &mut self,
        resource: &ResourceRef,
    ) -> Result<Option<ResourceRef>, ResolveError> {
        let parent = self
            .session
            .find_parent(&resource.as_object())
            .await
            .map_err(to_resolve_error)?;
        Ok(parent.as_ref().and_then(ResourceRef::from_subject))
    }

    async fn find_grants(
        &mut self,
        resource: &ResourceRef,
        grantee_type: GranteeType,
        grantee_ids: &[Uuid],
    ) -> Result<Vec<PermissionGrant>, ResolveError> {
        self.session
            .find_grants(resource, grantee_type, grantee_ids)
            .await
            .map_err(to_resolve_error)
    }

    async fn find_memberships_by_user_id(
        &mut self,
        user_id: Uuid,
    ) -> Result<Vec<GroupMembership>, ResolveError> {
        self.session
            .find_memberships_by_user_id(user_id)
            .await
            .map_err(to_resolve_error)
    }
}
