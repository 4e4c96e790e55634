use std::sync::Arc;

use criterion::{Criterion, criterion_group, criterion_main};
use uuid::Uuid;

use coffer_core::grant::{Grantee, GranteeType, PermissionGrant};
use coffer_core::group::{GroupMembership, MembershipRole};
use coffer_core::resolver::{AccessReader, PermissionResolver, ResolveError, ResolverConfig};
use coffer_core::tuple::{Relation, Tuple};
use coffer_core::{Permission, ResourceRef, Role};

#[derive(Default)]
struct Fixture {
    tuples: Vec<Tuple>,
    grants: Vec<PermissionGrant>,
    memberships: Vec<GroupMembership>,
}

struct BenchReader {
    fixture: Arc<Fixture>,
}

impl AccessReader for BenchReader {
    async fn tuple_exists(&mut self, tuple: &Tuple) -> Result<bool, ResolveError> {
        Ok(self.fixture.tuples.contains(tuple))
    }

    async fn find_parent(
        &mut self,
        resource: &ResourceRef,
    ) -> Result<Option<ResourceRef>, ResolveError> {
        let object = resource.as_object();
        Ok(self
            .fixture
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
            .fixture
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
            .fixture
            .memberships
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }
}

fn make_resolver(fixture: &Arc<Fixture>) -> PermissionResolver<BenchReader> {
    PermissionResolver::new(
        BenchReader {
            fixture: Arc::clone(fixture),
        },
        ResolverConfig::default(),
    )
}

/// A folder chain `depth` levels deep with a file at the bottom. The user's
/// only grant sits on the root folder, through a group.
fn folder_chain(depth: usize, groups: usize) -> (Arc<Fixture>, Uuid, ResourceRef) {
    let user = Uuid::new_v4();
    let mut fixture = Fixture::default();

    let root = ResourceRef::folder(Uuid::new_v4());
    let mut current = root;
    for _ in 1..depth {
        let child = ResourceRef::folder(Uuid::new_v4());
        fixture
            .tuples
            .push(Tuple::parent(current.as_subject(), child.as_object()));
        current = child;
    }
    let file = ResourceRef::file(Uuid::new_v4());
    fixture
        .tuples
        .push(Tuple::parent(current.as_subject(), file.as_object()));

    for i in 0..groups {
        let group = Uuid::new_v4();
        fixture
            .memberships
            .push(GroupMembership::new(group, user, MembershipRole::Member));
        if i == 0 {
            fixture.grants.push(PermissionGrant::new(
                root,
                Grantee::group(group),
                Role::Viewer,
                Uuid::new_v4(),
            ));
        }
    }

    (Arc::new(fixture), user, file)
}

fn bench_direct_grant(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let user = Uuid::new_v4();
    let file = ResourceRef::file(Uuid::new_v4());
    let fixture = Arc::new(Fixture {
        grants: vec![PermissionGrant::new(
            file,
            Grantee::user(user),
            Role::Contributor,
            Uuid::new_v4(),
        )],
        ..Fixture::default()
    });

    c.bench_function("has_permission_direct_grant", |b| {
        b.to_async(&rt).iter(|| async {
            make_resolver(&fixture)
                .has_permission(user, &file, Permission::FileWrite)
                .await
                .unwrap()
        });
    });
}

fn bench_inherited_depth_5(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let (fixture, user, file) = folder_chain(5, 1);

    c.bench_function("has_permission_inherited_depth_5", |b| {
        b.to_async(&rt).iter(|| async {
            make_resolver(&fixture)
                .has_permission(user, &file, Permission::FileRead)
                .await
                .unwrap()
        });
    });
}

fn bench_inherited_max_depth(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let (fixture, user, file) = folder_chain(21, 1);

    c.bench_function("collect_permissions_max_depth", |b| {
        b.to_async(&rt).iter(|| async {
            make_resolver(&fixture)
                .collect_permissions(user, &file)
                .await
                .unwrap()
        });
    });
}

fn bench_effective_role_many_groups(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap();
    let (fixture, user, file) = folder_chain(10, 50);

    c.bench_function("effective_role_50_groups", |b| {
        b.to_async(&rt).iter(|| async {
            make_resolver(&fixture)
                .effective_role(user, &file)
                .await
                .unwrap()
        });
    });
}

criterion_group!(
    benches,
    bench_direct_grant,
    bench_inherited_depth_5,
    bench_inherited_max_depth,
    bench_effective_role_many_groups,
);
criterion_main!(benches);
