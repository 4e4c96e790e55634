use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use uuid::Uuid;

use coffer_core::ResourceRef;
use coffer_core::grant::{Grantee, GranteeType, PermissionGrant};
use coffer_core::group::GroupMembership;
use coffer_core::hierarchy::{Folder, FolderPath, plan_subtree_move};
use coffer_core::role::Role;
use coffer_core::tuple::{
    ObjectRef, Relation, Relationship, SubjectRef, TenantId, Tuple, TupleFilter,
};

use crate::traits::{
    FolderClosureRepository, FolderRepository, MembershipRepository, PermissionGrantRepository,
    RelationshipRepository, Session, StorageError, Store, StoreFactory,
};

#[derive(Debug, Clone, Default)]
struct Tables {
    relationships: Vec<Relationship>,
    grants: Vec<PermissionGrant>,
    folders: HashMap<Uuid, Folder>,
    paths: Vec<FolderPath>,
    memberships: Vec<GroupMembership>,
}

impl Tables {
    fn sorted_paths(&self, keep: impl Fn(&FolderPath) -> bool) -> Vec<FolderPath> {
        let mut rows: Vec<FolderPath> = self.paths.iter().filter(|p| keep(*p)).cloned().collect();
        rows.sort_by_key(|p| p.path_length);
        rows
    }

    fn has_path(&self, ancestor_id: Uuid, descendant_id: Uuid) -> bool {
        self.paths
            .iter()
            .any(|p| p.ancestor_id == ancestor_id && p.descendant_id == descendant_id)
    }

    fn subtree_ids(&self, folder_id: Uuid) -> HashSet<Uuid> {
        self.paths
            .iter()
            .filter(|p| p.ancestor_id == folder_id)
            .map(|p| p.descendant_id)
            .collect()
    }
}

#[derive(Debug, Default)]
struct InnerState {
    version: u64,
    tables: Tables,
}

/// One tenant's tables. Sessions work on a private copy and publish it on
/// commit unless another session committed writes in the meantime.
#[derive(Debug, Clone, Default)]
pub struct InMemoryStore {
    state: Arc<Mutex<InnerState>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, InnerState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Store for InMemoryStore {
    type Session = InMemorySession;

    async fn begin(&self) -> Result<InMemorySession, StorageError> {
        let state = self.lock();
        Ok(InMemorySession {
            store: self.clone(),
            base_version: state.version,
            tables: state.tables.clone(),
            dirty: false,
        })
    }
}

#[derive(Debug)]
pub struct InMemorySession {
    store: InMemoryStore,
    base_version: u64,
    tables: Tables,
    dirty: bool,
}

impl InMemorySession {
    fn remove_relationships(&mut self, filter: &TupleFilter) -> u64 {
        let before = self.tables.relationships.len();
        self.tables
            .relationships
            .retain(|r| !filter.matches(&r.tuple()));
        let removed = (before - self.tables.relationships.len()) as u64;
        if removed > 0 {
            self.dirty = true;
        }
        removed
    }

    fn matching(&self, filter: &TupleFilter) -> Vec<Relationship> {
        self.tables
            .relationships
            .iter()
            .filter(|r| filter.matches(&r.tuple()))
            .cloned()
            .collect()
    }
}

impl Session for InMemorySession {
    async fn commit(self) -> Result<(), StorageError> {
        if !self.dirty {
            return Ok(());
        }

        let mut state = self.store.lock();
        if state.version != self.base_version {
            return Err(StorageError::SerializationConflict);
        }
        state.tables = self.tables;
        state.version += 1;
        Ok(())
    }

    async fn rollback(self) -> Result<(), StorageError> {
        Ok(())
    }
}

impl RelationshipRepository for InMemorySession {
    async fn create_relationship(&mut self, tuple: &Tuple) -> Result<Relationship, StorageError> {
        if self.tables.relationships.iter().any(|r| r.tuple() == *tuple) {
            return Err(StorageError::Duplicate(format!("relationship {tuple}")));
        }
        // Owner and parent are single-valued per object.
        if matches!(tuple.relation, Relation::Owner | Relation::Parent)
            && self
                .tables
                .relationships
                .iter()
                .any(|r| r.relation == tuple.relation && r.object == tuple.object)
        {
            return Err(StorageError::Duplicate(format!(
                "{} of {}",
                tuple.relation, tuple.object
            )));
        }

        let relationship = Relationship::new(*tuple);
        self.tables.relationships.push(relationship.clone());
        self.dirty = true;
        Ok(relationship)
    }

    async fn delete_relationship(&mut self, tuple: &Tuple) -> Result<bool, StorageError> {
        let before = self.tables.relationships.len();
        self.tables.relationships.retain(|r| r.tuple() != *tuple);
        let removed = self.tables.relationships.len() < before;
        self.dirty |= removed;
        Ok(removed)
    }

    async fn relationship_exists(&mut self, tuple: &Tuple) -> Result<bool, StorageError> {
        Ok(self.tables.relationships.iter().any(|r| r.tuple() == *tuple))
    }

    async fn find_relationships(
        &mut self,
        filter: &TupleFilter,
    ) -> Result<Vec<Relationship>, StorageError> {
        Ok(self.matching(filter))
    }

    async fn delete_relationships(&mut self, filter: &TupleFilter) -> Result<u64, StorageError> {
        if filter.is_empty() {
            return Err(StorageError::EmptyDeleteFilter);
        }
        Ok(self.remove_relationships(filter))
    }

    async fn find_parent(&mut self, object: &ObjectRef) -> Result<Option<SubjectRef>, StorageError> {
        let filter = TupleFilter::by_object(object).with_relation(Relation::Parent);
        Ok(self.matching(&filter).first().map(|r| r.subject))
    }

    async fn find_subjects(
        &mut self,
        relation: Relation,
        object: &ObjectRef,
    ) -> Result<Vec<SubjectRef>, StorageError> {
        let filter = TupleFilter::by_object(object).with_relation(relation);
        Ok(self.matching(&filter).into_iter().map(|r| r.subject).collect())
    }

    async fn find_objects(
        &mut self,
        subject: &SubjectRef,
        relation: Relation,
    ) -> Result<Vec<ObjectRef>, StorageError> {
        let filter = TupleFilter::by_subject(subject).with_relation(relation);
        Ok(self.matching(&filter).into_iter().map(|r| r.object).collect())
    }

    async fn find_by_object(&mut self, object: &ObjectRef) -> Result<Vec<Relationship>, StorageError> {
        Ok(self.matching(&TupleFilter::by_object(object)))
    }

    async fn find_by_subject(
        &mut self,
        subject: &SubjectRef,
    ) -> Result<Vec<Relationship>, StorageError> {
        Ok(self.matching(&TupleFilter::by_subject(subject)))
    }

    async fn delete_by_object(&mut self, object: &ObjectRef) -> Result<u64, StorageError> {
        Ok(self.remove_relationships(&TupleFilter::by_object(object)))
    }

    async fn delete_by_subject(&mut self, subject: &SubjectRef) -> Result<u64, StorageError> {
        Ok(self.remove_relationships(&TupleFilter::by_subject(subject)))
    }

    async fn replace_owner(
        &mut self,
        object: &ObjectRef,
        new_owner: Uuid,
    ) -> Result<Relationship, StorageError> {
        let filter = TupleFilter::by_object(object).with_relation(Relation::Owner);
        if self.remove_relationships(&filter) == 0 {
            return Err(StorageError::NotFound(format!("owner of {object}")));
        }

        let relationship = Relationship::new(Tuple::owner(new_owner, *object));
        self.tables.relationships.push(relationship.clone());
        Ok(relationship)
    }

    async fn set_parent(
        &mut self,
        child: &ObjectRef,
        parent: Option<SubjectRef>,
    ) -> Result<(), StorageError> {
        let filter = TupleFilter::by_object(child).with_relation(Relation::Parent);
        self.remove_relationships(&filter);

        if let Some(parent) = parent {
            self.tables
                .relationships
                .push(Relationship::new(Tuple::parent(parent, *child)));
            self.dirty = true;
        }
        Ok(())
    }
}

impl PermissionGrantRepository for InMemorySession {
    async fn create_grant(&mut self, grant: &PermissionGrant) -> Result<(), StorageError> {
        if self.tables.grants.iter().any(|g| g.same_assignment(grant)) {
            return Err(StorageError::Duplicate(format!(
                "grant of {} to {} on {}",
                grant.role, grant.grantee, grant.resource
            )));
        }

        self.tables.grants.push(grant.clone());
        self.dirty = true;
        Ok(())
    }

    async fn find_grant(&mut self, id: Uuid) -> Result<Option<PermissionGrant>, StorageError> {
        Ok(self.tables.grants.iter().find(|g| g.id == id).cloned())
    }

    async fn find_grants_for_resource(
        &mut self,
        resource: &ResourceRef,
    ) -> Result<Vec<PermissionGrant>, StorageError> {
        let mut grants: Vec<PermissionGrant> = self
            .tables
            .grants
            .iter()
            .filter(|g| g.resource == *resource)
            .cloned()
            .collect();
        grants.sort_by_key(|g| g.granted_at);
        Ok(grants)
    }

    async fn find_grants(
        &mut self,
        resource: &ResourceRef,
        grantee_type: GranteeType,
        grantee_ids: &[Uuid],
    ) -> Result<Vec<PermissionGrant>, StorageError> {
        Ok(self
            .tables
            .grants
            .iter()
            .filter(|g| {
                g.resource == *resource
                    && g.grantee.grantee_type == grantee_type
                    && grantee_ids.contains(&g.grantee.grantee_id)
            })
            .cloned()
            .collect())
    }

    async fn grant_exists(
        &mut self,
        resource: &ResourceRef,
        grantee: &Grantee,
        role: Role,
    ) -> Result<bool, StorageError> {
        Ok(self
            .tables
            .grants
            .iter()
            .any(|g| g.resource == *resource && g.grantee == *grantee && g.role == role))
    }

    async fn delete_grant(&mut self, id: Uuid) -> Result<bool, StorageError> {
        let before = self.tables.grants.len();
        self.tables.grants.retain(|g| g.id != id);
        let removed = self.tables.grants.len() < before;
        self.dirty |= removed;
        Ok(removed)
    }

    async fn delete_grants_for_resource(&mut self, resource: &ResourceRef) -> Result<u64, StorageError> {
        let before = self.tables.grants.len();
        self.tables.grants.retain(|g| g.resource != *resource);
        let removed = (before - self.tables.grants.len()) as u64;
        self.dirty |= removed > 0;
        Ok(removed)
    }
}

impl FolderClosureRepository for InMemorySession {
    async fn insert_self_reference(&mut self, folder_id: Uuid) -> Result<(), StorageError> {
        self.insert_ancestor_paths(&[FolderPath::self_reference(folder_id)])
            .await
    }

    async fn insert_ancestor_paths(&mut self, paths: &[FolderPath]) -> Result<(), StorageError> {
        let mut seen = HashSet::new();
        for path in paths {
            if !seen.insert(path.key()) || self.tables.has_path(path.ancestor_id, path.descendant_id)
            {
                return Err(StorageError::Duplicate(format!(
                    "folder path {} -> {}",
                    path.ancestor_id, path.descendant_id
                )));
            }
        }

        self.tables.paths.extend(paths.iter().cloned());
        self.dirty |= !paths.is_empty();
        Ok(())
    }

    async fn find_ancestor_ids(&mut self, folder_id: Uuid) -> Result<Vec<Uuid>, StorageError> {
        Ok(self
            .tables
            .sorted_paths(|p| p.descendant_id == folder_id && !p.is_self_reference())
            .into_iter()
            .map(|p| p.ancestor_id)
            .collect())
    }

    async fn find_descendant_ids(&mut self, folder_id: Uuid) -> Result<Vec<Uuid>, StorageError> {
        Ok(self
            .tables
            .sorted_paths(|p| p.ancestor_id == folder_id)
            .into_iter()
            .map(|p| p.descendant_id)
            .collect())
    }

    async fn find_ancestor_paths(&mut self, folder_id: Uuid) -> Result<Vec<FolderPath>, StorageError> {
        Ok(self.tables.sorted_paths(|p| p.descendant_id == folder_id))
    }

    async fn find_subtree(&mut self, folder_id: Uuid) -> Result<Vec<FolderPath>, StorageError> {
        Ok(self.tables.sorted_paths(|p| p.ancestor_id == folder_id))
    }

    async fn delete_subtree_paths(&mut self, folder_id: Uuid) -> Result<u64, StorageError> {
        let subtree = self.tables.subtree_ids(folder_id);
        let before = self.tables.paths.len();
        self.tables
            .paths
            .retain(|p| !subtree.contains(&p.descendant_id));
        let removed = (before - self.tables.paths.len()) as u64;
        self.dirty |= removed > 0;
        Ok(removed)
    }

    async fn delete_by_descendant(&mut self, folder_id: Uuid) -> Result<u64, StorageError> {
        let before = self.tables.paths.len();
        self.tables
            .paths
            .retain(|p| p.descendant_id != folder_id && p.ancestor_id != folder_id);
        let removed = (before - self.tables.paths.len()) as u64;
        self.dirty |= removed > 0;
        Ok(removed)
    }

    async fn move_subtree(
        &mut self,
        folder_id: Uuid,
        new_parent_paths: &[FolderPath],
    ) -> Result<(), StorageError> {
        let subtree = self.tables.sorted_paths(|p| p.ancestor_id == folder_id);
        if subtree.is_empty() {
            return Err(StorageError::NotFound(format!("closure rows of folder {folder_id}")));
        }
        let members: HashSet<Uuid> = subtree.iter().map(|p| p.descendant_id).collect();

        self.tables.paths.retain(|p| {
            !members.contains(&p.descendant_id) || members.contains(&p.ancestor_id)
        });
        self.tables
            .paths
            .extend(plan_subtree_move(&subtree, new_parent_paths));
        self.dirty = true;
        Ok(())
    }

    async fn lock_hierarchy(&mut self) -> Result<(), StorageError> {
        Ok(())
    }

    async fn list_paths(&mut self) -> Result<Vec<FolderPath>, StorageError> {
        Ok(self.tables.paths.clone())
    }
}

impl FolderRepository for InMemorySession {
    async fn create_folder(&mut self, folder: &Folder) -> Result<(), StorageError> {
        if self.tables.folders.contains_key(&folder.id) {
            return Err(StorageError::Duplicate(format!("folder {}", folder.id)));
        }
        self.tables.folders.insert(folder.id, folder.clone());
        self.dirty = true;
        Ok(())
    }

    async fn find_folder(&mut self, id: Uuid) -> Result<Option<Folder>, StorageError> {
        Ok(self.tables.folders.get(&id).cloned())
    }

    async fn set_folder_parent(
        &mut self,
        id: Uuid,
        parent_id: Option<Uuid>,
    ) -> Result<(), StorageError> {
        let folder = self
            .tables
            .folders
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("folder {id}")))?;
        folder.parent_id = parent_id;
        folder.updated_at = Utc::now();
        self.dirty = true;
        Ok(())
    }

    async fn set_folder_owner(&mut self, id: Uuid, owner_id: Uuid) -> Result<(), StorageError> {
        let folder = self
            .tables
            .folders
            .get_mut(&id)
            .ok_or_else(|| StorageError::NotFound(format!("folder {id}")))?;
        folder.owner_id = owner_id;
        folder.updated_at = Utc::now();
        self.dirty = true;
        Ok(())
    }

    async fn set_folder_depths(&mut self, depths: &[(Uuid, u32)]) -> Result<(), StorageError> {
        if let Some((missing, _)) = depths
            .iter()
            .find(|(id, _)| !self.tables.folders.contains_key(id))
        {
            return Err(StorageError::NotFound(format!("folder {missing}")));
        }

        let now = Utc::now();
        for (id, depth) in depths {
            if let Some(folder) = self.tables.folders.get_mut(id) {
                folder.depth = *depth;
                folder.updated_at = now;
            }
        }
        self.dirty |= !depths.is_empty();
        Ok(())
    }

    async fn delete_folders(&mut self, ids: &[Uuid]) -> Result<u64, StorageError> {
        let removed = ids
            .iter()
            .filter(|id| self.tables.folders.remove(*id).is_some())
            .count() as u64;
        self.dirty |= removed > 0;
        Ok(removed)
    }

    async fn list_folders(&mut self) -> Result<Vec<Folder>, StorageError> {
        let mut folders: Vec<Folder> = self.tables.folders.values().cloned().collect();
        folders.sort_by_key(|f| (f.depth, f.created_at));
        Ok(folders)
    }
}

impl MembershipRepository for InMemorySession {
    async fn add_membership(&mut self, membership: &GroupMembership) -> Result<(), StorageError> {
        let exists = self
            .tables
            .memberships
            .iter()
            .any(|m| m.group_id == membership.group_id && m.user_id == membership.user_id);
        if exists {
            return Err(StorageError::Duplicate(format!(
                "membership of user {} in group {}",
                membership.user_id, membership.group_id
            )));
        }

        self.tables.memberships.push(membership.clone());
        self.dirty = true;
        Ok(())
    }

    async fn remove_membership(&mut self, group_id: Uuid, user_id: Uuid) -> Result<bool, StorageError> {
        let before = self.tables.memberships.len();
        self.tables
            .memberships
            .retain(|m| !(m.group_id == group_id && m.user_id == user_id));
        let removed = self.tables.memberships.len() < before;
        self.dirty |= removed;
        Ok(removed)
    }

    async fn find_memberships_by_user_id(
        &mut self,
        user_id: Uuid,
    ) -> Result<Vec<GroupMembership>, StorageError> {
        Ok(self
            .tables
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn find_group_members(&mut self, group_id: Uuid) -> Result<Vec<GroupMembership>, StorageError> {
        Ok(self
            .tables
            .memberships
            .iter()
            .filter(|m| m.group_id == group_id)
            .cloned()
            .collect())
    }
}

#[derive(Debug, Default)]
pub struct InMemoryStoreFactory {
    stores: Mutex<HashMap<TenantId, InMemoryStore>>,
}

impl InMemoryStoreFactory {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StoreFactory for InMemoryStoreFactory {
    type Store = InMemoryStore;

    fn for_tenant(&self, tenant_id: &TenantId) -> InMemoryStore {
        let mut stores = self.stores.lock().unwrap_or_else(PoisonError::into_inner);
        stores.entry(tenant_id.clone()).or_default().clone()
    }
}
