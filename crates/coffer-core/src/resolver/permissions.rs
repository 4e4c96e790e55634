use std::future::Future;
use std::pin::Pin;

use uuid::Uuid;

use crate::grant::GranteeType;
use crate::permission::{Permission, PermissionSet};
use crate::resource::ResourceRef;
use crate::role::Role;
use crate::tuple::Tuple;

use super::{AccessReader, ResolveError, ResolverConfig};

struct ResolveContext {
    user_id: Uuid,
    group_ids: Vec<Uuid>,
}

/// Answers access questions from ownership tuples, grants and the parent chain.
///
/// Ownership short-circuits to the full owner set at whichever level of the
/// chain it is found. Below that, direct user grants, grants to the user's
/// groups and whatever the parent resolves to are unioned.
pub struct PermissionResolver<R: AccessReader> {
    reader: R,
    config: ResolverConfig,
}

impl<R: AccessReader> PermissionResolver<R> {
    pub fn new(reader: R, config: ResolverConfig) -> Self {
        Self { reader, config }
    }

    pub fn into_reader(self) -> R {
        self.reader
    }

    pub async fn has_permission(
        &mut self,
        user_id: Uuid,
        resource: &ResourceRef,
        permission: Permission,
    ) -> Result<bool, ResolveError> {
        let permissions = self.collect_permissions(user_id, resource).await?;
        Ok(permissions.contains(permission))
    }

    pub async fn collect_permissions(
        &mut self,
        user_id: Uuid,
        resource: &ResourceRef,
    ) -> Result<PermissionSet, ResolveError> {
        let ctx = self.context_for(user_id).await?;
        self.collect_at(*resource, &ctx, 0).await
    }

    pub async fn effective_role(
        &mut self,
        user_id: Uuid,
        resource: &ResourceRef,
    ) -> Result<Option<Role>, ResolveError> {
        let ctx = self.context_for(user_id).await?;
        self.role_at(*resource, &ctx, 0).await
    }

    pub async fn is_owner(
        &mut self,
        user_id: Uuid,
        resource: &ResourceRef,
    ) -> Result<bool, ResolveError> {
        self.reader
            .tuple_exists(&Tuple::owner(user_id, resource.as_object()))
            .await
    }

    pub async fn can_grant_role(
        &mut self,
        granter_id: Uuid,
        resource: &ResourceRef,
        target: Role,
    ) -> Result<bool, ResolveError> {
        let role = self.effective_role(granter_id, resource).await?;
        Ok(role.is_some_and(|r| r.can_grant(target)))
    }

    async fn context_for(&mut self, user_id: Uuid) -> Result<ResolveContext, ResolveError> {
        let memberships = self.reader.find_memberships_by_user_id(user_id).await?;
        Ok(ResolveContext {
            user_id,
            group_ids: memberships.into_iter().map(|m| m.group_id).collect(),
        })
    }

    async fn granted_roles(
        &mut self,
        resource: &ResourceRef,
        ctx: &ResolveContext,
    ) -> Result<Vec<Role>, ResolveError> {
        let mut grants = self
            .reader
            .find_grants(resource, GranteeType::User, &[ctx.user_id])
            .await?;

        if !ctx.group_ids.is_empty() {
            let group_grants = self
                .reader
                .find_grants(resource, GranteeType::Group, &ctx.group_ids)
                .await?;
            grants.extend(group_grants);
        }

        Ok(grants.into_iter().map(|g| g.role).collect())
    }

    fn collect_at<'a>(
        &'a mut self,
        resource: ResourceRef,
        ctx: &'a ResolveContext,
        depth: usize,
    ) -> Pin<Box<dyn Future<Output = Result<PermissionSet, ResolveError>> + Send + 'a>> {
        Box::pin(async move {
            if depth > self.config.max_depth {
                return Err(ResolveError::MaxDepthExceeded(self.config.max_depth));
            }

            if self.is_owner(ctx.user_id, &resource).await? {
                return Ok(Role::Owner.permissions());
            }

            let mut permissions = PermissionSet::new();
            for role in self.granted_roles(&resource, ctx).await? {
                permissions.merge(&role.permissions());
            }

            if let Some(parent) = self.reader.find_parent(&resource).await? {
                let inherited = self.collect_at(parent, ctx, depth + 1).await?;
                permissions.merge(&inherited);
            }

            Ok(permissions)
        })
    }

    fn role_at<'a>(
        &'a mut self,
        resource: ResourceRef,
        ctx: &'a ResolveContext,
        depth: usize,
    ) -> Pin<Box<dyn Future<Output = Result<Option<Role>, ResolveError>> + Send + 'a>> {
        Box::pin(async move {
            if depth > self.config.max_depth {
                return Err(ResolveError::MaxDepthExceeded(self.config.max_depth));
            }

            if self.is_owner(ctx.user_id, &resource).await? {
                return Ok(Some(Role::Owner));
            }

            let mut highest = self
                .granted_roles(&resource, ctx)
                .await?
                .into_iter()
                .max();

            if let Some(parent) = self.reader.find_parent(&resource).await? {
                let inherited = self.role_at(parent, ctx, depth + 1).await?;
                highest = highest.max(inherited);
            }

            Ok(highest)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grant::{Grantee, PermissionGrant};
    use crate::group::{GroupMembership, MembershipRole};
    use crate::tuple::Relation;

    #[derive(Default)]
    struct TestReader {
        tuples: Vec<Tuple>,
        grants: Vec<PermissionGrant>,
        memberships: Vec<GroupMembership>,
        parent_lookups: usize,
    }

    impl AccessReader for TestReader {
        async fn tuple_exists(&mut self, tuple: &Tuple) -> Result<bool, ResolveError> {
            Ok(self.tuples.contains(tuple))
        }

        async fn find_parent(
            &mut self,
            resource: &ResourceRef,
        ) -> Result<Option<ResourceRef>, ResolveError> {
            self.parent_lookups += 1;
            let object = resource.as_object();
            Ok(self
                .tuples
                .iter()
                .find(|t| t.relation == Relation::Parent && t.object == object)
                .and_then(|t| ResourceRef::from_subject(&t.subject)))
        }

        async fn find_grants(
            &mut self,
            resource: &ResourceRef,
            grantee_type: GranteeType,
            grantee_ids: &[Uuid],
        ) -> Result<Vec<PermissionGrant>, ResolveError> {
            Ok(self
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

        async fn find_memberships_by_user_id(
            &mut self,
            user_id: Uuid,
        ) -> Result<Vec<GroupMembership>, ResolveError> {
            Ok(self
                .memberships
                .iter()
                .filter(|m| m.user_id == user_id)
                .cloned()
                .collect())
        }
    }

    struct FailingReader;

    impl AccessReader for FailingReader {
        async fn tuple_exists(&mut self, _tuple: &Tuple) -> Result<bool, ResolveError> {
            Err(ResolveError::StorageError("connection reset".to_string()))
        }

        async fn find_parent(
            &mut self,
            _resource: &ResourceRef,
        ) -> Result<Option<ResourceRef>, ResolveError> {
            Ok(None)
        }

        async fn find_grants(
            &mut self,
            _resource: &ResourceRef,
            _grantee_type: GranteeType,
            _grantee_ids: &[Uuid],
        ) -> Result<Vec<PermissionGrant>, ResolveError> {
            Ok(vec![])
        }

        async fn find_memberships_by_user_id(
            &mut self,
            _user_id: Uuid,
        ) -> Result<Vec<GroupMembership>, ResolveError> {
            Ok(vec![])
        }
    }

    impl TestReader {
        fn own(&mut self, user: Uuid, resource: ResourceRef) {
            self.tuples.push(Tuple::owner(user, resource.as_object()));
        }

        fn nest(&mut self, parent: ResourceRef, child: ResourceRef) {
            self.tuples
                .push(Tuple::parent(parent.as_subject(), child.as_object()));
        }

        fn grant(&mut self, resource: ResourceRef, grantee: Grantee, role: Role) {
            self.grants
                .push(PermissionGrant::new(resource, grantee, role, Uuid::new_v4()));
        }

        fn join(&mut self, user: Uuid, group: Uuid) {
            self.memberships
                .push(GroupMembership::new(group, user, MembershipRole::Member));
        }
    }

    fn resolver(reader: TestReader) -> PermissionResolver<TestReader> {
        PermissionResolver::new(reader, ResolverConfig::default())
    }

    #[tokio::test]
    async fn owner_gets_every_permission_without_grants() {
        let owner = Uuid::new_v4();
        let folder = ResourceRef::folder(Uuid::new_v4());
        let mut reader = TestReader::default();
        reader.own(owner, folder);
        let mut resolver = resolver(reader);

        for permission in Permission::ALL {
            assert!(
                resolver.has_permission(owner, &folder, permission).await.unwrap(),
                "owner lacks {permission}"
            );
        }
    }

    #[tokio::test]
    async fn ownership_short_circuits_parent_walk() {
        let owner = Uuid::new_v4();
        let root = ResourceRef::folder(Uuid::new_v4());
        let child = ResourceRef::folder(Uuid::new_v4());
        let mut reader = TestReader::default();
        reader.own(owner, child);
        reader.nest(root, child);
        let mut resolver = resolver(reader);

        let permissions = resolver.collect_permissions(owner, &child).await.unwrap();

        assert_eq!(permissions, Role::Owner.permissions());
        assert_eq!(resolver.into_reader().parent_lookups, 0);
    }

    #[tokio::test]
    async fn direct_grant_gives_role_permissions() {
        let user = Uuid::new_v4();
        let folder = ResourceRef::folder(Uuid::new_v4());
        let mut reader = TestReader::default();
        reader.grant(folder, Grantee::user(user), Role::Contributor);
        let mut resolver = resolver(reader);

        let permissions = resolver.collect_permissions(user, &folder).await.unwrap();

        assert_eq!(permissions, Role::Contributor.permissions());
    }

    #[tokio::test]
    async fn no_access_yields_empty_set() {
        let folder = ResourceRef::folder(Uuid::new_v4());
        let mut resolver = resolver(TestReader::default());

        let permissions = resolver
            .collect_permissions(Uuid::new_v4(), &folder)
            .await
            .unwrap();

        assert!(permissions.is_empty());
    }

    #[tokio::test]
    async fn group_grant_applies_to_members_only() {
        let member = Uuid::new_v4();
        let outsider = Uuid::new_v4();
        let group = Uuid::new_v4();
        let file = ResourceRef::file(Uuid::new_v4());
        let mut reader = TestReader::default();
        reader.join(member, group);
        reader.grant(file, Grantee::group(group), Role::Viewer);
        let mut resolver = resolver(reader);

        assert!(
            resolver
                .has_permission(member, &file, Permission::FileDownload)
                .await
                .unwrap()
        );
        assert!(
            !resolver
                .has_permission(outsider, &file, Permission::FileDownload)
                .await
                .unwrap()
        );
    }

    #[tokio::test]
    async fn grants_are_inherited_down_the_parent_chain() {
        let user = Uuid::new_v4();
        let root = ResourceRef::folder(Uuid::new_v4());
        let middle = ResourceRef::folder(Uuid::new_v4());
        let file = ResourceRef::file(Uuid::new_v4());
        let mut reader = TestReader::default();
        reader.nest(root, middle);
        reader.nest(middle, file);
        reader.grant(root, Grantee::user(user), Role::Viewer);
        let mut resolver = resolver(reader);

        let permissions = resolver.collect_permissions(user, &file).await.unwrap();

        assert!(permissions.has_all(&[Permission::FileRead, Permission::FileDownload]));
        assert!(!permissions.contains(Permission::FileWrite));
    }

    #[tokio::test]
    async fn ancestor_ownership_grants_everything_below() {
        let owner = Uuid::new_v4();
        let root = ResourceRef::folder(Uuid::new_v4());
        let child = ResourceRef::folder(Uuid::new_v4());
        let mut reader = TestReader::default();
        reader.own(owner, root);
        reader.nest(root, child);
        let mut resolver = resolver(reader);

        assert!(
            resolver
                .has_permission(owner, &child, Permission::ManageAccess)
                .await
                .unwrap()
        );
        assert!(!resolver.is_owner(owner, &child).await.unwrap());
    }

    #[tokio::test]
    async fn direct_and_inherited_permissions_are_unioned() {
        let user = Uuid::new_v4();
        let group = Uuid::new_v4();
        let root = ResourceRef::folder(Uuid::new_v4());
        let child = ResourceRef::folder(Uuid::new_v4());
        let mut reader = TestReader::default();
        reader.nest(root, child);
        reader.join(user, group);
        reader.grant(root, Grantee::group(group), Role::ContentManager);
        reader.grant(child, Grantee::user(user), Role::Viewer);
        let mut resolver = resolver(reader);

        let permissions = resolver.collect_permissions(user, &child).await.unwrap();

        assert_eq!(permissions, Role::ContentManager.permissions());
    }

    #[tokio::test]
    async fn effective_role_takes_highest_along_chain() {
        let user = Uuid::new_v4();
        let root = ResourceRef::folder(Uuid::new_v4());
        let child = ResourceRef::folder(Uuid::new_v4());
        let mut reader = TestReader::default();
        reader.nest(root, child);
        reader.grant(root, Grantee::user(user), Role::ContentManager);
        reader.grant(child, Grantee::user(user), Role::Viewer);
        let mut resolver = resolver(reader);

        let role = resolver.effective_role(user, &child).await.unwrap();

        assert_eq!(role, Some(Role::ContentManager));
    }

    #[tokio::test]
    async fn effective_role_is_none_without_access() {
        let mut resolver = resolver(TestReader::default());

        let role = resolver
            .effective_role(Uuid::new_v4(), &ResourceRef::folder(Uuid::new_v4()))
            .await
            .unwrap();

        assert_eq!(role, None);
    }

    #[tokio::test]
    async fn effective_role_of_owner_is_owner() {
        let owner = Uuid::new_v4();
        let file = ResourceRef::file(Uuid::new_v4());
        let mut reader = TestReader::default();
        reader.own(owner, file);
        reader.grant(file, Grantee::user(owner), Role::Viewer);
        let mut resolver = resolver(reader);

        assert_eq!(
            resolver.effective_role(owner, &file).await.unwrap(),
            Some(Role::Owner)
        );
    }

    #[tokio::test]
    async fn can_grant_role_requires_strictly_higher_level() {
        let user = Uuid::new_v4();
        let folder = ResourceRef::folder(Uuid::new_v4());
        let mut reader = TestReader::default();
        reader.grant(folder, Grantee::user(user), Role::Contributor);
        let mut resolver = resolver(reader);

        assert!(resolver.can_grant_role(user, &folder, Role::Viewer).await.unwrap());
        assert!(!resolver.can_grant_role(user, &folder, Role::Contributor).await.unwrap());
        assert!(!resolver.can_grant_role(user, &folder, Role::ContentManager).await.unwrap());
    }

    #[tokio::test]
    async fn owner_can_grant_everything_but_owner() {
        let owner = Uuid::new_v4();
        let folder = ResourceRef::folder(Uuid::new_v4());
        let mut reader = TestReader::default();
        reader.own(owner, folder);
        let mut resolver = resolver(reader);

        for role in Role::GRANTABLE {
            assert!(resolver.can_grant_role(owner, &folder, role).await.unwrap());
        }
        assert!(!resolver.can_grant_role(owner, &folder, Role::Owner).await.unwrap());
    }

    #[tokio::test]
    async fn user_without_role_cannot_grant() {
        let mut resolver = resolver(TestReader::default());

        let allowed = resolver
            .can_grant_role(Uuid::new_v4(), &ResourceRef::folder(Uuid::new_v4()), Role::Viewer)
            .await
            .unwrap();

        assert!(!allowed);
    }

    #[tokio::test]
    async fn parent_cycle_stops_at_max_depth() {
        let a = ResourceRef::folder(Uuid::new_v4());
        let b = ResourceRef::folder(Uuid::new_v4());
        let mut reader = TestReader::default();
        reader.nest(a, b);
        reader.nest(b, a);
        let mut resolver = PermissionResolver::new(reader, ResolverConfig { max_depth: 5 });

        let err = resolver
            .collect_permissions(Uuid::new_v4(), &a)
            .await
            .unwrap_err();

        assert!(
            matches!(err, ResolveError::MaxDepthExceeded(5)),
            "expected MaxDepthExceeded, got: {err}"
        );
    }

    #[tokio::test]
    async fn storage_errors_propagate() {
        let mut resolver = PermissionResolver::new(FailingReader, ResolverConfig::default());

        let err = resolver
            .has_permission(
                Uuid::new_v4(),
                &ResourceRef::file(Uuid::new_v4()),
                Permission::FileRead,
            )
            .await
            .unwrap_err();

        assert!(
            matches!(err, ResolveError::StorageError(ref msg) if msg.contains("reset")),
            "expected StorageError, got: {err}"
        );
    }
}
