use std::sync::Arc;

use uuid::Uuid;

use coffer_core::grant::{Grantee, GranteeType, PermissionGrant};
use coffer_core::group::{GroupMembership, MembershipRole};
use coffer_core::hierarchy::{
    ClosureViolation, Folder, build_ancestor_paths, subtree_height, verify_closure,
};
use coffer_core::resolver::{PermissionResolver, ResolverConfig};
use coffer_core::tuple::{ObjectType, Relation, SubjectType, TenantId, Tuple};
use coffer_core::{Permission, PermissionSet, ResourceRef, ResourceType, Role, ValidationError};
use coffer_storage::{
    FolderClosureRepository, FolderRepository, MembershipRepository, PermissionGrantRepository,
    RelationshipRepository, Session, Store, StoreFactory,
};

use crate::adapter::SessionReader;
use crate::audit;
use crate::error::AccessError;

type SessionOf<F> = <<F as StoreFactory>::Store as Store>::Session;

#[derive(Debug, Clone)]
pub struct GrantRoleInput {
    pub resource: ResourceRef,
    pub grantee: Grantee,
    pub role: Role,
    pub granted_by: Uuid,
}

#[derive(Debug, Clone)]
pub struct CreateFolderInput {
    pub owner_id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
}

/// What a folder deletion removed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletedSubtree {
    pub folder_ids: Vec<Uuid>,
    pub file_ids: Vec<Uuid>,
}

/// Authorization commands over a tenant's stores.
///
/// Every command runs in one session: it commits when the command succeeds
/// and rolls back otherwise. The `*_in` variants take an open session instead,
/// leaving commit and rollback to the caller.
pub struct AccessService<F: StoreFactory> {
    factory: Arc<F>,
    resolver_config: ResolverConfig,
}

impl<F: StoreFactory> AccessService<F> {
    pub fn new(factory: Arc<F>, resolver_config: ResolverConfig) -> Self {
        Self {
            factory,
            resolver_config,
        }
    }

    pub async fn begin(&self, tenant_id: &TenantId) -> Result<SessionOf<F>, AccessError> {
        let store = self.factory.for_tenant(tenant_id);
        Ok(store.begin().await?)
    }

    fn resolver<'s, S: Session>(
        &self,
        session: &'s mut S,
    ) -> PermissionResolver<SessionReader<'s, S>> {
        PermissionResolver::new(SessionReader::new(session), self.resolver_config.clone())
    }

    async fn require<S: Session>(
        &self,
        session: &mut S,
        tenant_id: &TenantId,
        user_id: Uuid,
        resource: &ResourceRef,
        permission: Permission,
    ) -> Result<(), AccessError> {
        let allowed = self
            .resolver(session)
            .has_permission(user_id, resource, permission)
            .await?;
        if !allowed {
            audit::audit_access_denied(tenant_id, user_id, resource, permission.as_str());
            return Err(AccessError::Forbidden(format!(
                "user {user_id} lacks {permission} on {resource}"
            )));
        }
        Ok(())
    }

    async fn require_owner<S: Session>(
        &self,
        session: &mut S,
        tenant_id: &TenantId,
        user_id: Uuid,
        resource: &ResourceRef,
        action: &str,
    ) -> Result<(), AccessError> {
        if !self.resolver(session).is_owner(user_id, resource).await? {
            audit::audit_access_denied(tenant_id, user_id, resource, action);
            return Err(AccessError::Forbidden(format!(
                "only the owner of {resource} may {action}"
            )));
        }
        Ok(())
    }

    async fn require_folder<S: Session>(
        &self,
        session: &mut S,
        folder_id: Uuid,
    ) -> Result<Folder, AccessError> {
        session
            .find_folder(folder_id)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("folder {folder_id}")))
    }

    /// Files and folders exist for authorization purposes once they have an
    /// owner tuple.
    async fn require_resource<S: Session>(
        &self,
        session: &mut S,
        resource: &ResourceRef,
    ) -> Result<Vec<Uuid>, AccessError> {
        let owners: Vec<Uuid> = session
            .find_subjects(Relation::Owner, &resource.as_object())
            .await?
            .into_iter()
            .filter(|s| s.subject_type == SubjectType::User)
            .map(|s| s.subject_id)
            .collect();
        if owners.is_empty() {
            return Err(AccessError::NotFound(format!("resource {resource}")));
        }
        Ok(owners)
    }

    // --- Queries ---

    #[tracing::instrument(skip(self))]
    pub async fn check_access(
        &self,
        tenant_id: &TenantId,
        user_id: Uuid,
        resource: ResourceRef,
        permission: Permission,
    ) -> Result<bool, AccessError> {
        let mut session = self.begin(tenant_id).await?;
        let result = self
            .check_access_in(&mut session, user_id, &resource, permission)
            .await;
        finish(session, result).await
    }

    pub async fn check_access_in<S: Session>(
        &self,
        session: &mut S,
        user_id: Uuid,
        resource: &ResourceRef,
        permission: Permission,
    ) -> Result<bool, AccessError> {
        Ok(self
            .resolver(session)
            .has_permission(user_id, resource, permission)
            .await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn collect_permissions(
        &self,
        tenant_id: &TenantId,
        user_id: Uuid,
        resource: ResourceRef,
    ) -> Result<PermissionSet, AccessError> {
        let mut session = self.begin(tenant_id).await?;
        let result = self
            .collect_permissions_in(&mut session, user_id, &resource)
            .await;
        finish(session, result).await
    }

    pub async fn collect_permissions_in<S: Session>(
        &self,
        session: &mut S,
        user_id: Uuid,
        resource: &ResourceRef,
    ) -> Result<PermissionSet, AccessError> {
        Ok(self
            .resolver(session)
            .collect_permissions(user_id, resource)
            .await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn effective_role(
        &self,
        tenant_id: &TenantId,
        user_id: Uuid,
        resource: ResourceRef,
    ) -> Result<Option<Role>, AccessError> {
        let mut session = self.begin(tenant_id).await?;
        let result = self.effective_role_in(&mut session, user_id, &resource).await;
        finish(session, result).await
    }

    pub async fn effective_role_in<S: Session>(
        &self,
        session: &mut S,
        user_id: Uuid,
        resource: &ResourceRef,
    ) -> Result<Option<Role>, AccessError> {
        Ok(self.resolver(session).effective_role(user_id, resource).await?)
    }

    #[tracing::instrument(skip(self))]
    pub async fn can_grant_role(
        &self,
        tenant_id: &TenantId,
        granter_id: Uuid,
        resource: ResourceRef,
        role: Role,
    ) -> Result<bool, AccessError> {
        let mut session = self.begin(tenant_id).await?;
        let result = self
            .can_grant_role_in(&mut session, granter_id, &resource, role)
            .await;
        finish(session, result).await
    }

    pub async fn can_grant_role_in<S: Session>(
        &self,
        session: &mut S,
        granter_id: Uuid,
        resource: &ResourceRef,
        role: Role,
    ) -> Result<bool, AccessError> {
        Ok(self
            .resolver(session)
            .can_grant_role(granter_id, resource, role)
            .await?)
    }

    /// Passes when `user_id` may create share links for `resource`.
    #[tracing::instrument(skip(self))]
    pub async fn authorize_share(
        &self,
        tenant_id: &TenantId,
        user_id: Uuid,
        resource: ResourceRef,
    ) -> Result<(), AccessError> {
        let mut session = self.begin(tenant_id).await?;
        let result = self
            .authorize_share_in(&mut session, tenant_id, user_id, &resource)
            .await;
        finish(session, result).await
    }

    pub async fn authorize_share_in<S: Session>(
        &self,
        session: &mut S,
        tenant_id: &TenantId,
        user_id: Uuid,
        resource: &ResourceRef,
    ) -> Result<(), AccessError> {
        let permission = match resource.resource_type {
            ResourceType::File => Permission::FileShare,
            ResourceType::Folder => Permission::FolderShare,
        };
        self.require(session, tenant_id, user_id, resource, permission)
            .await
    }

    /// Whether `resource` is `folder_id` itself or lies somewhere below it.
    #[tracing::instrument(skip(self))]
    pub async fn is_in_subtree(
        &self,
        tenant_id: &TenantId,
        folder_id: Uuid,
        resource: ResourceRef,
    ) -> Result<bool, AccessError> {
        let mut session = self.begin(tenant_id).await?;
        let result = self.is_in_subtree_in(&mut session, folder_id, &resource).await;
        finish(session, result).await
    }

    pub async fn is_in_subtree_in<S: Session>(
        &self,
        session: &mut S,
        folder_id: Uuid,
        resource: &ResourceRef,
    ) -> Result<bool, AccessError> {
        let subtree = session.find_descendant_ids(folder_id).await?;
        let containing_folder = match resource.resource_type {
            ResourceType::Folder => Some(resource.resource_id),
            ResourceType::File => session
                .find_parent(&resource.as_object())
                .await?
                .filter(|p| p.subject_type == SubjectType::Folder)
                .map(|p| p.subject_id),
        };
        Ok(containing_folder.is_some_and(|id| subtree.contains(&id)))
    }

    #[tracing::instrument(skip(self))]
    pub async fn list_grants(
        &self,
        tenant_id: &TenantId,
        resource: ResourceRef,
    ) -> Result<Vec<PermissionGrant>, AccessError> {
        let mut session = self.begin(tenant_id).await?;
        let result = session
            .find_grants_for_resource(&resource)
            .await
            .map_err(AccessError::from);
        finish(session, result).await
    }

    /// Checks the tenant's closure table against its folder rows.
    #[tracing::instrument(skip(self))]
    pub async fn verify_hierarchy(
        &self,
        tenant_id: &TenantId,
    ) -> Result<Vec<ClosureViolation>, AccessError> {
        let mut session = self.begin(tenant_id).await?;
        let result = self.verify_hierarchy_in(&mut session).await;
        finish(session, result).await
    }

    pub async fn verify_hierarchy_in<S: Session>(
        &self,
        session: &mut S,
    ) -> Result<Vec<ClosureViolation>, AccessError> {
        let folders = session.list_folders().await?;
        let paths = session.list_paths().await?;
        Ok(verify_closure(&folders, &paths))
    }

    // --- Grants ---

    #[tracing::instrument(skip(self))]
    pub async fn grant_role(
        &self,
        tenant_id: &TenantId,
        input: GrantRoleInput,
    ) -> Result<PermissionGrant, AccessError> {
        let mut session = self.begin(tenant_id).await?;
        let result = self.grant_role_in(&mut session, tenant_id, input).await;
        finish(session, result).await
    }

    pub async fn grant_role_in<S: Session>(
        &self,
        session: &mut S,
        tenant_id: &TenantId,
        input: GrantRoleInput,
    ) -> Result<PermissionGrant, AccessError> {
        if input.role == Role::Owner {
            return Err(ValidationError::OwnerNotGrantable.into());
        }
        if input.grantee.grantee_type == GranteeType::User
            && input.grantee.grantee_id == input.granted_by
        {
            return Err(ValidationError::SelfGrant.into());
        }

        self.require_resource(session, &input.resource).await?;

        let allowed = self
            .resolver(session)
            .can_grant_role(input.granted_by, &input.resource, input.role)
            .await?;
        if !allowed {
            audit::audit_access_denied(
                tenant_id,
                input.granted_by,
                &input.resource,
                &format!("grant:{}", input.role),
            );
            return Err(AccessError::Forbidden(format!(
                "user {} may not grant {} on {}",
                input.granted_by, input.role, input.resource
            )));
        }

        if session
            .grant_exists(&input.resource, &input.grantee, input.role)
            .await?
        {
            return Err(AccessError::Conflict(format!(
                "{} already holds {} on {}",
                input.grantee, input.role, input.resource
            )));
        }

        let grant = PermissionGrant::new(
            input.resource,
            input.grantee,
            input.role,
            input.granted_by,
        );
        session.create_grant(&grant).await?;
        audit::audit_grant_created(tenant_id, &grant);
        Ok(grant)
    }

    #[tracing::instrument(skip(self))]
    pub async fn revoke_grant(
        &self,
        tenant_id: &TenantId,
        grant_id: Uuid,
        revoked_by: Uuid,
    ) -> Result<PermissionGrant, AccessError> {
        let mut session = self.begin(tenant_id).await?;
        let result = self
            .revoke_grant_in(&mut session, tenant_id, grant_id, revoked_by)
            .await;
        finish(session, result).await
    }

    /// Only someone who could grant the role again may revoke it.
    pub async fn revoke_grant_in<S: Session>(
        &self,
        session: &mut S,
        tenant_id: &TenantId,
        grant_id: Uuid,
        revoked_by: Uuid,
    ) -> Result<PermissionGrant, AccessError> {
        let grant = session
            .find_grant(grant_id)
            .await?
            .ok_or_else(|| AccessError::NotFound(format!("grant {grant_id}")))?;
        if grant.role == Role::Owner {
            return Err(ValidationError::OwnerNotGrantable.into());
        }

        let allowed = self
            .resolver(session)
            .can_grant_role(revoked_by, &grant.resource, grant.role)
            .await?;
        if !allowed {
            audit::audit_access_denied(
                tenant_id,
                revoked_by,
                &grant.resource,
                &format!("revoke:{}", grant.role),
            );
            return Err(AccessError::Forbidden(format!(
                "user {revoked_by} may not revoke {} on {}",
                grant.role, grant.resource
            )));
        }

        if !session.delete_grant(grant_id).await? {
            return Err(AccessError::NotFound(format!("grant {grant_id}")));
        }
        audit::audit_grant_revoked(tenant_id, &grant, revoked_by);
        Ok(grant)
    }

    #[tracing::instrument(skip(self))]
    pub async fn transfer_ownership(
        &self,
        tenant_id: &TenantId,
        actor_id: Uuid,
        resource: ResourceRef,
        new_owner: Uuid,
    ) -> Result<(), AccessError> {
        let mut session = self.begin(tenant_id).await?;
        let result = self
            .transfer_ownership_in(&mut session, tenant_id, actor_id, &resource, new_owner)
            .await;
        finish(session, result).await
    }

    pub async fn transfer_ownership_in<S: Session>(
        &self,
        session: &mut S,
        tenant_id: &TenantId,
        actor_id: Uuid,
        resource: &ResourceRef,
        new_owner: Uuid,
    ) -> Result<(), AccessError> {
        let owners = self.require_resource(session, resource).await?;
        self.require_owner(session, tenant_id, actor_id, resource, "transfer ownership")
            .await?;
        if owners.contains(&new_owner) {
            return Err(AccessError::Conflict(format!(
                "{new_owner} already owns {resource}"
            )));
        }

        session
            .replace_owner(&resource.as_object(), new_owner)
            .await?;
        if resource.resource_type == ResourceType::Folder {
            session
                .set_folder_owner(resource.resource_id, new_owner)
                .await?;
        }

        audit::audit_ownership_transferred(tenant_id, resource, actor_id, new_owner);
        Ok(())
    }

    // --- Folders ---

    #[tracing::instrument(skip(self))]
    pub async fn create_folder(
        &self,
        tenant_id: &TenantId,
        input: CreateFolderInput,
    ) -> Result<Folder, AccessError> {
        let mut session = self.begin(tenant_id).await?;
        let result = self.create_folder_in(&mut session, tenant_id, input).await;
        finish(session, result).await
    }

    pub async fn create_folder_in<S: Session>(
        &self,
        session: &mut S,
        tenant_id: &TenantId,
        input: CreateFolderInput,
    ) -> Result<Folder, AccessError> {
        session.lock_hierarchy().await?;

        let (folder, parent_paths) = match input.parent_id {
            Some(parent_id) => {
                let parent = self.require_folder(session, parent_id).await?;
                self.require(
                    session,
                    tenant_id,
                    input.owner_id,
                    &parent.resource(),
                    Permission::FolderCreate,
                )
                .await?;
                let folder = Folder::new_child(input.name, input.owner_id, &parent)?;
                let parent_paths = session.find_ancestor_paths(parent_id).await?;
                (folder, parent_paths)
            }
            None => (Folder::new_root(input.name, input.owner_id), Vec::new()),
        };

        session.create_folder(&folder).await?;
        session
            .insert_ancestor_paths(&build_ancestor_paths(folder.id, &parent_paths))
            .await?;
        session
            .create_relationship(&Tuple::owner(folder.owner_id, folder.resource().as_object()))
            .await?;
        if let Some(parent_id) = folder.parent_id {
            session
                .create_relationship(&Tuple::parent(
                    ResourceRef::folder(parent_id).as_subject(),
                    folder.resource().as_object(),
                ))
                .await?;
        }

        tracing::debug!(folder_id = %folder.id, depth = folder.depth, "folder created");
        Ok(folder)
    }

    #[tracing::instrument(skip(self))]
    pub async fn move_folder(
        &self,
        tenant_id: &TenantId,
        actor_id: Uuid,
        folder_id: Uuid,
        new_parent_id: Option<Uuid>,
    ) -> Result<Folder, AccessError> {
        let mut session = self.begin(tenant_id).await?;
        let result = self
            .move_folder_in(&mut session, tenant_id, actor_id, folder_id, new_parent_id)
            .await;
        finish(session, result).await
    }

    /// Re-parents a folder and its whole subtree. Moving to the root requires
    /// ownership of the folder.
    pub async fn move_folder_in<S: Session>(
        &self,
        session: &mut S,
        tenant_id: &TenantId,
        actor_id: Uuid,
        folder_id: Uuid,
        new_parent_id: Option<Uuid>,
    ) -> Result<Folder, AccessError> {
        session.lock_hierarchy().await?;

        let folder = self.require_folder(session, folder_id).await?;
        let new_parent = match new_parent_id {
            Some(id) => Some(self.require_folder(session, id).await?),
            None => None,
        };

        self.require(
            session,
            tenant_id,
            actor_id,
            &folder.resource(),
            Permission::FolderMoveOut,
        )
        .await?;
        match &new_parent {
            Some(parent) => {
                self.require(
                    session,
                    tenant_id,
                    actor_id,
                    &parent.resource(),
                    Permission::FolderMoveIn,
                )
                .await?;
            }
            None => {
                self.require_owner(
                    session,
                    tenant_id,
                    actor_id,
                    &folder.resource(),
                    "move to root",
                )
                .await?;
            }
        }

        let descendant_ids = session.find_descendant_ids(folder_id).await?;
        let subtree = session.find_subtree(folder_id).await?;
        let new_depth =
            folder.validate_move(new_parent.as_ref(), &descendant_ids, subtree_height(&subtree))?;

        let new_parent_paths = match &new_parent {
            Some(parent) => session.find_ancestor_paths(parent.id).await?,
            None => Vec::new(),
        };

        session.move_subtree(folder_id, &new_parent_paths).await?;
        session.set_folder_parent(folder_id, new_parent_id).await?;
        let depths: Vec<(Uuid, u32)> = subtree
            .iter()
            .map(|p| (p.descendant_id, new_depth + p.path_length))
            .collect();
        session.set_folder_depths(&depths).await?;
        session
            .set_parent(
                &folder.resource().as_object(),
                new_parent_id.map(|id| ResourceRef::folder(id).as_subject()),
            )
            .await?;

        audit::audit_folder_moved(tenant_id, folder_id, new_parent_id, actor_id, subtree.len());
        self.require_folder(session, folder_id).await
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_folder(
        &self,
        tenant_id: &TenantId,
        actor_id: Uuid,
        folder_id: Uuid,
    ) -> Result<DeletedSubtree, AccessError> {
        let mut session = self.begin(tenant_id).await?;
        let result = self
            .delete_folder_in(&mut session, tenant_id, actor_id, folder_id)
            .await;
        finish(session, result).await
    }

    /// Removes the folder, every folder and file below it, and all tuples and
    /// grants attached to them.
    pub async fn delete_folder_in<S: Session>(
        &self,
        session: &mut S,
        tenant_id: &TenantId,
        actor_id: Uuid,
        folder_id: Uuid,
    ) -> Result<DeletedSubtree, AccessError> {
        session.lock_hierarchy().await?;

        let folder = self.require_folder(session, folder_id).await?;
        self.require(
            session,
            tenant_id,
            actor_id,
            &folder.resource(),
            Permission::FolderDelete,
        )
        .await?;

        let folder_ids = session.find_descendant_ids(folder_id).await?;
        let mut file_ids = Vec::new();
        for id in &folder_ids {
            let children = session
                .find_objects(&ResourceRef::folder(*id).as_subject(), Relation::Parent)
                .await?;
            file_ids.extend(
                children
                    .into_iter()
                    .filter(|o| o.object_type == ObjectType::File)
                    .map(|o| o.object_id),
            );
        }

        for id in &file_ids {
            let file = ResourceRef::file(*id);
            session.delete_by_object(&file.as_object()).await?;
            session.delete_grants_for_resource(&file).await?;
        }
        for id in &folder_ids {
            let folder = ResourceRef::folder(*id);
            session.delete_by_object(&folder.as_object()).await?;
            session.delete_by_subject(&folder.as_subject()).await?;
            session.delete_grants_for_resource(&folder).await?;
        }
        session.delete_subtree_paths(folder_id).await?;
        session.delete_folders(&folder_ids).await?;

        tracing::info!(
            folder_id = %folder_id,
            folders = folder_ids.len(),
            files = file_ids.len(),
            "folder subtree deleted"
        );
        Ok(DeletedSubtree {
            folder_ids,
            file_ids,
        })
    }

    // --- Files ---

    #[tracing::instrument(skip(self))]
    pub async fn register_file(
        &self,
        tenant_id: &TenantId,
        owner_id: Uuid,
        file_id: Uuid,
        folder_id: Uuid,
    ) -> Result<ResourceRef, AccessError> {
        let mut session = self.begin(tenant_id).await?;
        let result = self
            .register_file_in(&mut session, tenant_id, owner_id, file_id, folder_id)
            .await;
        finish(session, result).await
    }

    /// Records the owner and parent tuples of a file uploaded into a folder.
    pub async fn register_file_in<S: Session>(
        &self,
        session: &mut S,
        tenant_id: &TenantId,
        owner_id: Uuid,
        file_id: Uuid,
        folder_id: Uuid,
    ) -> Result<ResourceRef, AccessError> {
        let folder = self.require_folder(session, folder_id).await?;
        self.require(
            session,
            tenant_id,
            owner_id,
            &folder.resource(),
            Permission::FolderWrite,
        )
        .await?;

        let file = ResourceRef::file(file_id);
        let object = file.as_object();
        if !session.find_subjects(Relation::Owner, &object).await?.is_empty()
            || session.find_parent(&object).await?.is_some()
        {
            return Err(AccessError::Conflict(format!(
                "file {file_id} is already registered"
            )));
        }

        session
            .create_relationship(&Tuple::owner(owner_id, file.as_object()))
            .await?;
        session
            .create_relationship(&Tuple::parent(
                folder.resource().as_subject(),
                file.as_object(),
            ))
            .await?;
        Ok(file)
    }

    #[tracing::instrument(skip(self))]
    pub async fn delete_file(
        &self,
        tenant_id: &TenantId,
        actor_id: Uuid,
        file_id: Uuid,
    ) -> Result<(), AccessError> {
        let mut session = self.begin(tenant_id).await?;
        let result = self
            .delete_file_in(&mut session, tenant_id, actor_id, file_id)
            .await;
        finish(session, result).await
    }

    pub async fn delete_file_in<S: Session>(
        &self,
        session: &mut S,
        tenant_id: &TenantId,
        actor_id: Uuid,
        file_id: Uuid,
    ) -> Result<(), AccessError> {
        let file = ResourceRef::file(file_id);
        self.require_resource(session, &file).await?;
        self.require(session, tenant_id, actor_id, &file, Permission::FileDelete)
            .await?;

        session.delete_by_object(&file.as_object()).await?;
        session.delete_grants_for_resource(&file).await?;
        Ok(())
    }

    // --- Groups ---

    #[tracing::instrument(skip(self))]
    pub async fn add_group_member(
        &self,
        tenant_id: &TenantId,
        group_id: Uuid,
        user_id: Uuid,
        role: MembershipRole,
    ) -> Result<GroupMembership, AccessError> {
        let mut session = self.begin(tenant_id).await?;
        let result = self
            .add_group_member_in(&mut session, group_id, user_id, role)
            .await;
        finish(session, result).await
    }

    pub async fn add_group_member_in<S: Session>(
        &self,
        session: &mut S,
        group_id: Uuid,
        user_id: Uuid,
        role: MembershipRole,
    ) -> Result<GroupMembership, AccessError> {
        let membership = GroupMembership::new(group_id, user_id, role);
        session.add_membership(&membership).await?;
        session
            .create_relationship(&Tuple::member(user_id, group_id))
            .await?;
        Ok(membership)
    }

    #[tracing::instrument(skip(self))]
    pub async fn remove_group_member(
        &self,
        tenant_id: &TenantId,
        group_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), AccessError> {
        let mut session = self.begin(tenant_id).await?;
        let result = self
            .remove_group_member_in(&mut session, group_id, user_id)
            .await;
        finish(session, result).await
    }

    pub async fn remove_group_member_in<S: Session>(
        &self,
        session: &mut S,
        group_id: Uuid,
        user_id: Uuid,
    ) -> Result<(), AccessError> {
        if !session.remove_membership(group_id, user_id).await? {
            return Err(AccessError::NotFound(format!(
                "membership of {user_id} in group {group_id}"
            )));
        }
        session
            .delete_relationship(&Tuple::member(user_id, group_id))
            .await?;
        Ok(())
    }
}

/// Commits on success and rolls back on failure. A failed rollback is logged
/// and the original error is returned.
async fn finish<S: Session, T>(
    session: S,
    result: Result<T, AccessError>,
) -> Result<T, AccessError> {
    match result {
        Ok(value) => {
            session.commit().await?;
            Ok(value)
        }
        Err(err) => {
            if let Err(rollback_err) = session.rollback().await {
                tracing::warn!(error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}
