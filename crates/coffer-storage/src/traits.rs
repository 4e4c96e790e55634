use uuid::Uuid;

use coffer_core::ResourceRef;
use coffer_core::grant::{Grantee, GranteeType, PermissionGrant};
use coffer_core::group::GroupMembership;
use coffer_core::hierarchy::{Folder, FolderPath};
use coffer_core::role::Role;
use coffer_core::tuple::{
    ObjectRef, Relation, Relationship, SubjectRef, TenantId, Tuple, TupleFilter,
};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StorageError {
    #[error("duplicate {0}")]
    Duplicate(String),
    #[error("{0} not found")]
    NotFound(String),
    #[error("delete filter must have at least one field set")]
    EmptyDeleteFilter,
    #[error("serialization conflict: a concurrent session committed first")]
    SerializationConflict,
    #[error("internal storage error: {0}")]
    Internal(String),
}

/// Ownership, membership and parent tuples.
pub trait RelationshipRepository {
    /// Fails with [`StorageError::Duplicate`] when the natural key exists.
    fn create_relationship(
        &mut self,
        tuple: &Tuple,
    ) -> impl Future<Output = Result<Relationship, StorageError>> + Send;

    fn delete_relationship(
        &mut self,
        tuple: &Tuple,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;

    fn relationship_exists(
        &mut self,
        tuple: &Tuple,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;

    fn find_relationships(
        &mut self,
        filter: &TupleFilter,
    ) -> impl Future<Output = Result<Vec<Relationship>, StorageError>> + Send;

    /// Rejects an empty filter with [`StorageError::EmptyDeleteFilter`].
    fn delete_relationships(
        &mut self,
        filter: &TupleFilter,
    ) -> impl Future<Output = Result<u64, StorageError>> + Send;

    fn find_parent(
        &mut self,
        object: &ObjectRef,
    ) -> impl Future<Output = Result<Option<SubjectRef>, StorageError>> + Send;

    fn find_subjects(
        &mut self,
        relation: Relation,
        object: &ObjectRef,
    ) -> impl Future<Output = Result<Vec<SubjectRef>, StorageError>> + Send;

    fn find_objects(
        &mut self,
        subject: &SubjectRef,
        relation: Relation,
    ) -> impl Future<Output = Result<Vec<ObjectRef>, StorageError>> + Send;

    fn find_by_object(
        &mut self,
        object: &ObjectRef,
    ) -> impl Future<Output = Result<Vec<Relationship>, StorageError>> + Send;

    fn find_by_subject(
        &mut self,
        subject: &SubjectRef,
    ) -> impl Future<Output = Result<Vec<Relationship>, StorageError>> + Send;

    fn delete_by_object(
        &mut self,
        object: &ObjectRef,
    ) -> impl Future<Output = Result<u64, StorageError>> + Send;

    fn delete_by_subject(
        &mut self,
        subject: &SubjectRef,
    ) -> impl Future<Output = Result<u64, StorageError>> + Send;

    /// Swaps the single `owner` tuple of `object` for one naming `new_owner`.
    fn replace_owner(
        &mut self,
        object: &ObjectRef,
        new_owner: Uuid,
    ) -> impl Future<Output = Result<Relationship, StorageError>> + Send;

    /// Replaces the `parent` edge of `child`; `None` leaves it without one.
    fn set_parent(
        &mut self,
        child: &ObjectRef,
        parent: Option<SubjectRef>,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;
}

pub trait PermissionGrantRepository {
    fn create_grant(
        &mut self,
        grant: &PermissionGrant,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn find_grant(
        &mut self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<PermissionGrant>, StorageError>> + Send;

    fn find_grants_for_resource(
        &mut self,
        resource: &ResourceRef,
    ) -> impl Future<Output = Result<Vec<PermissionGrant>, StorageError>> + Send;

    fn find_grants(
        &mut self,
        resource: &ResourceRef,
        grantee_type: GranteeType,
        grantee_ids: &[Uuid],
    ) -> impl Future<Output = Result<Vec<PermissionGrant>, StorageError>> + Send;

    fn grant_exists(
        &mut self,
        resource: &ResourceRef,
        grantee: &Grantee,
        role: Role,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;

    fn delete_grant(&mut self, id: Uuid)
    -> impl Future<Output = Result<bool, StorageError>> + Send;

    fn delete_grants_for_resource(
        &mut self,
        resource: &ResourceRef,
    ) -> impl Future<Output = Result<u64, StorageError>> + Send;
}

/// Closure rows of the folder hierarchy.
///
/// Rows are returned ordered by `path_length`. Nothing here checks for
/// cycles or depth limits; callers validate with [`Folder::validate_move`]
/// before touching the table.
pub trait FolderClosureRepository {
    fn insert_self_reference(
        &mut self,
        folder_id: Uuid,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn insert_ancestor_paths(
        &mut self,
        paths: &[FolderPath],
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Proper ancestors, nearest first.
    fn find_ancestor_ids(
        &mut self,
        folder_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Uuid>, StorageError>> + Send;

    /// The folder itself followed by every descendant.
    fn find_descendant_ids(
        &mut self,
        folder_id: Uuid,
    ) -> impl Future<Output = Result<Vec<Uuid>, StorageError>> + Send;

    /// Rows naming the folder as descendant, self-row included.
    fn find_ancestor_paths(
        &mut self,
        folder_id: Uuid,
    ) -> impl Future<Output = Result<Vec<FolderPath>, StorageError>> + Send;

    /// Rows naming the folder as ancestor: `(folder, node, relative depth)`.
    fn find_subtree(
        &mut self,
        folder_id: Uuid,
    ) -> impl Future<Output = Result<Vec<FolderPath>, StorageError>> + Send;

    /// Removes every row whose descendant lies in the folder's subtree.
    fn delete_subtree_paths(
        &mut self,
        folder_id: Uuid,
    ) -> impl Future<Output = Result<u64, StorageError>> + Send;

    /// Removes rows naming the folder on either side.
    fn delete_by_descendant(
        &mut self,
        folder_id: Uuid,
    ) -> impl Future<Output = Result<u64, StorageError>> + Send;

    /// Detaches the subtree from its current ancestors and reattaches it below
    /// the folder whose rows are `new_parent_paths` (empty for the root).
    fn move_subtree(
        &mut self,
        folder_id: Uuid,
        new_parent_paths: &[FolderPath],
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Serializes hierarchy mutations within a tenant until the session ends.
    fn lock_hierarchy(&mut self) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn list_paths(&mut self) -> impl Future<Output = Result<Vec<FolderPath>, StorageError>> + Send;
}

pub trait FolderRepository {
    fn create_folder(
        &mut self,
        folder: &Folder,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn find_folder(
        &mut self,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<Folder>, StorageError>> + Send;

    fn set_folder_parent(
        &mut self,
        id: Uuid,
        parent_id: Option<Uuid>,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn set_folder_owner(
        &mut self,
        id: Uuid,
        owner_id: Uuid,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn set_folder_depths(
        &mut self,
        depths: &[(Uuid, u32)],
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn delete_folders(
        &mut self,
        ids: &[Uuid],
    ) -> impl Future<Output = Result<u64, StorageError>> + Send;

    fn list_folders(&mut self) -> impl Future<Output = Result<Vec<Folder>, StorageError>> + Send;
}

pub trait MembershipRepository {
    fn add_membership(
        &mut self,
        membership: &GroupMembership,
    ) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn remove_membership(
        &mut self,
        group_id: Uuid,
        user_id: Uuid,
    ) -> impl Future<Output = Result<bool, StorageError>> + Send;

    fn find_memberships_by_user_id(
        &mut self,
        user_id: Uuid,
    ) -> impl Future<Output = Result<Vec<GroupMembership>, StorageError>> + Send;

    fn find_group_members(
        &mut self,
        group_id: Uuid,
    ) -> impl Future<Output = Result<Vec<GroupMembership>, StorageError>> + Send;
}

/// A unit of work. Dropping a session without committing discards its writes.
pub trait Session:
    RelationshipRepository
    + PermissionGrantRepository
    + FolderClosureRepository
    + FolderRepository
    + MembershipRepository
    + Send
{
    fn commit(self) -> impl Future<Output = Result<(), StorageError>> + Send;

    fn rollback(self) -> impl Future<Output = Result<(), StorageError>> + Send;
}

pub trait Store: Send + Sync {
    type Session: Session;

    fn begin(&self) -> impl Future<Output = Result<Self::Session, StorageError>> + Send;
}

pub trait StoreFactory: Send + Sync {
    type Store: Store;

    fn for_tenant(&self, tenant_id: &TenantId) -> Self::Store;
}
