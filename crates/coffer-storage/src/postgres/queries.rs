use chrono::{DateTime, Utc};
use uuid::Uuid;

use coffer_core::ResourceRef;
use coffer_core::ValidationError;
use coffer_core::grant::{Grantee, GranteeType, PermissionGrant};
use coffer_core::group::GroupMembership;
use coffer_core::hierarchy::{Folder, FolderPath};
use coffer_core::role::Role;
use coffer_core::tuple::{ObjectRef, Relationship, SubjectRef, Tuple, TupleFilter};

use crate::traits::StorageError;

const SERIALIZATION_FAILURE: &str = "40001";
const DEADLOCK_DETECTED: &str = "40P01";

pub(crate) fn to_storage_error(e: sqlx::Error) -> StorageError {
    if let sqlx::Error::Database(ref db_err) = e
        && matches!(
            db_err.code().as_deref(),
            Some(SERIALIZATION_FAILURE | DEADLOCK_DETECTED)
        )
    {
        return StorageError::SerializationConflict;
    }
    StorageError::Internal(e.to_string())
}

fn to_write_error(e: sqlx::Error, what: impl FnOnce() -> String) -> StorageError {
    if let sqlx::Error::Database(ref db_err) = e
        && db_err.is_unique_violation()
    {
        return StorageError::Duplicate(what());
    }
    to_storage_error(e)
}

fn corrupt_row(e: ValidationError) -> StorageError {
    StorageError::Internal(format!("corrupt row: {e}"))
}

#[allow(clippy::cast_possible_wrap)]
fn to_db_int(value: u32) -> i32 {
    value as i32
}

fn from_db_int(value: i32) -> Result<u32, StorageError> {
    u32::try_from(value)
        .map_err(|_| StorageError::Internal(format!("corrupt row: negative value {value}")))
}

// --- Relationships ---

type RelationshipRow = (Uuid, String, Uuid, String, String, Uuid, DateTime<Utc>);

fn relationship_from_row(row: RelationshipRow) -> Result<Relationship, StorageError> {
    let (id, subject_type, subject_id, relation, object_type, object_id, created_at) = row;
    Ok(Relationship {
        id,
        subject: SubjectRef::new(subject_type.parse().map_err(corrupt_row)?, subject_id),
        relation: relation.parse().map_err(corrupt_row)?,
        object: ObjectRef::new(object_type.parse().map_err(corrupt_row)?, object_id),
        created_at,
    })
}

enum FilterBind {
    Text(&'static str),
    Id(Uuid),
}

/// Builds `col = $n AND ...` for the set fields of `filter`, numbering
/// placeholders from `first_idx`. An empty filter yields `TRUE`.
fn filter_clause(filter: &TupleFilter, first_idx: usize) -> (String, Vec<FilterBind>) {
    let mut conditions = Vec::new();
    let mut binds = Vec::new();
    let mut bind_idx = first_idx;

    if let Some(st) = filter.subject_type {
        conditions.push(format!("subject_type = ${bind_idx}"));
        binds.push(FilterBind::Text(st.as_str()));
        bind_idx += 1;
    }
    if let Some(si) = filter.subject_id {
        conditions.push(format!("subject_id = ${bind_idx}"));
        binds.push(FilterBind::Id(si));
        bind_idx += 1;
    }
    if let Some(r) = filter.relation {
        conditions.push(format!("relation = ${bind_idx}"));
        binds.push(FilterBind::Text(r.as_str()));
        bind_idx += 1;
    }
    if let Some(ot) = filter.object_type {
        conditions.push(format!("object_type = ${bind_idx}"));
        binds.push(FilterBind::Text(ot.as_str()));
        bind_idx += 1;
    }
    if let Some(oi) = filter.object_id {
        conditions.push(format!("object_id = ${bind_idx}"));
        binds.push(FilterBind::Id(oi));
    }

    if conditions.is_empty() {
        return ("TRUE".to_string(), binds);
    }
    (conditions.join(" AND "), binds)
}

pub async fn insert_relationship<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    schema: &str,
    relationship: &Relationship,
) -> Result<(), StorageError> {
    let query = format!(
        r#"
        INSERT INTO {schema}.relationships
            (id, subject_type, subject_id, relation, object_type, object_id, created_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#
    );
    sqlx::query(&query)
        .bind(relationship.id)
        .bind(relationship.subject.subject_type.as_str())
        .bind(relationship.subject.subject_id)
        .bind(relationship.relation.as_str())
        .bind(relationship.object.object_type.as_str())
        .bind(relationship.object.object_id)
        .bind(relationship.created_at)
        .execute(executor)
        .await
        .map_err(|e| to_write_error(e, || format!("relationship {relationship}")))?;
    Ok(())
}

pub async fn relationship_exists<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    schema: &str,
    tuple: &Tuple,
) -> Result<bool, StorageError> {
    let (where_clause, binds) = filter_clause(&TupleFilter::exact(tuple), 1);
    let query = format!("SELECT EXISTS (SELECT 1 FROM {schema}.relationships WHERE {where_clause})");

    let mut q = sqlx::query_as::<_, (bool,)>(&query);
    for bind in binds {
        q = match bind {
            FilterBind::Text(s) => q.bind(s),
            FilterBind::Id(id) => q.bind(id),
        };
    }
    let row = q.fetch_one(executor).await.map_err(to_storage_error)?;
    Ok(row.0)
}

pub async fn find_relationships<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    schema: &str,
    filter: &TupleFilter,
) -> Result<Vec<Relationship>, StorageError> {
    let (where_clause, binds) = filter_clause(filter, 1);
    let query = format!(
        r#"SELECT id, subject_type, subject_id, relation, object_type, object_id, created_at
           FROM {schema}.relationships
           WHERE {where_clause}
           ORDER BY created_at, id"#
    );

    let mut q = sqlx::query_as::<_, RelationshipRow>(&query);
    for bind in binds {
        q = match bind {
            FilterBind::Text(s) => q.bind(s),
            FilterBind::Id(id) => q.bind(id),
        };
    }
    let rows = q.fetch_all(executor).await.map_err(to_storage_error)?;

    rows.into_iter().map(relationship_from_row).collect()
}

pub async fn delete_relationships<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    schema: &str,
    filter: &TupleFilter,
) -> Result<u64, StorageError> {
    if filter.is_empty() {
        return Err(StorageError::EmptyDeleteFilter);
    }

    let (where_clause, binds) = filter_clause(filter, 1);
    let query = format!("DELETE FROM {schema}.relationships WHERE {where_clause}");

    let mut q = sqlx::query(&query);
    for bind in binds {
        q = match bind {
            FilterBind::Text(s) => q.bind(s),
            FilterBind::Id(id) => q.bind(id),
        };
    }
    let result = q.execute(executor).await.map_err(to_storage_error)?;
    Ok(result.rows_affected())
}

// --- Permission grants ---

type GrantRow = (Uuid, String, Uuid, String, Uuid, String, Uuid, DateTime<Utc>);

const GRANT_COLUMNS: &str =
    "id, resource_type, resource_id, grantee_type, grantee_id, role, granted_by, granted_at";

fn grant_from_row(row: GrantRow) -> Result<PermissionGrant, StorageError> {
    let (id, resource_type, resource_id, grantee_type, grantee_id, role, granted_by, granted_at) =
        row;
    Ok(PermissionGrant {
        id,
        resource: ResourceRef::new(resource_type.parse().map_err(corrupt_row)?, resource_id),
        grantee: Grantee {
            grantee_type: grantee_type.parse().map_err(corrupt_row)?,
            grantee_id,
        },
        role: role.parse().map_err(corrupt_row)?,
        granted_by,
        granted_at,
    })
}

pub async fn insert_grant<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    schema: &str,
    grant: &PermissionGrant,
) -> Result<(), StorageError> {
    let query = format!(
        r#"
        INSERT INTO {schema}.permission_grants ({GRANT_COLUMNS})
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        "#
    );
    sqlx::query(&query)
        .bind(grant.id)
        .bind(grant.resource.resource_type.as_str())
        .bind(grant.resource.resource_id)
        .bind(grant.grantee.grantee_type.as_str())
        .bind(grant.grantee.grantee_id)
        .bind(grant.role.as_str())
        .bind(grant.granted_by)
        .bind(grant.granted_at)
        .execute(executor)
        .await
        .map_err(|e| {
            to_write_error(e, || {
                format!(
                    "grant of {} to {} on {}",
                    grant.role, grant.grantee, grant.resource
                )
            })
        })?;
    Ok(())
}

pub async fn find_grant<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    schema: &str,
    id: Uuid,
) -> Result<Option<PermissionGrant>, StorageError> {
    let query = format!("SELECT {GRANT_COLUMNS} FROM {schema}.permission_grants WHERE id = $1");
    let row: Option<GrantRow> = sqlx::query_as(&query)
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(to_storage_error)?;
    row.map(grant_from_row).transpose()
}

pub async fn find_grants_for_resource<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    schema: &str,
    resource: &ResourceRef,
) -> Result<Vec<PermissionGrant>, StorageError> {
    let query = format!(
        r#"SELECT {GRANT_COLUMNS} FROM {schema}.permission_grants
           WHERE resource_type = $1 AND resource_id = $2
           ORDER BY granted_at, id"#
    );
    let rows: Vec<GrantRow> = sqlx::query_as(&query)
        .bind(resource.resource_type.as_str())
        .bind(resource.resource_id)
        .fetch_all(executor)
        .await
        .map_err(to_storage_error)?;
    rows.into_iter().map(grant_from_row).collect()
}

pub async fn find_grants<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    schema: &str,
    resource: &ResourceRef,
    grantee_type: GranteeType,
    grantee_ids: &[Uuid],
) -> Result<Vec<PermissionGrant>, StorageError> {
    let query = format!(
        r#"SELECT {GRANT_COLUMNS} FROM {schema}.permission_grants
           WHERE resource_type = $1 AND resource_id = $2
             AND grantee_type = $3 AND grantee_id = ANY($4)"#
    );
    let rows: Vec<GrantRow> = sqlx::query_as(&query)
        .bind(resource.resource_type.as_str())
        .bind(resource.resource_id)
        .bind(grantee_type.as_str())
        .bind(grantee_ids)
        .fetch_all(executor)
        .await
        .map_err(to_storage_error)?;
    rows.into_iter().map(grant_from_row).collect()
}

pub async fn grant_exists<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    schema: &str,
    resource: &ResourceRef,
    grantee: &Grantee,
    role: Role,
) -> Result<bool, StorageError> {
    let query = format!(
        r#"SELECT EXISTS (
               SELECT 1 FROM {schema}.permission_grants
               WHERE resource_type = $1 AND resource_id = $2
                 AND grantee_type = $3 AND grantee_id = $4 AND role = $5
           )"#
    );
    let row: (bool,) = sqlx::query_as(&query)
        .bind(resource.resource_type.as_str())
        .bind(resource.resource_id)
        .bind(grantee.grantee_type.as_str())
        .bind(grantee.grantee_id)
        .bind(role.as_str())
        .fetch_one(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(row.0)
}

pub async fn delete_grant<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    schema: &str,
    id: Uuid,
) -> Result<bool, StorageError> {
    let query = format!("DELETE FROM {schema}.permission_grants WHERE id = $1");
    let result = sqlx::query(&query)
        .bind(id)
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(result.rows_affected() > 0)
}

pub async fn delete_grants_for_resource<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    schema: &str,
    resource: &ResourceRef,
) -> Result<u64, StorageError> {
    let query = format!(
        "DELETE FROM {schema}.permission_grants WHERE resource_type = $1 AND resource_id = $2"
    );
    let result = sqlx::query(&query)
        .bind(resource.resource_type.as_str())
        .bind(resource.resource_id)
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(result.rows_affected())
}

// --- Folder closure ---

type PathRow = (Uuid, Uuid, i32, DateTime<Utc>);

fn path_from_row(row: PathRow) -> Result<FolderPath, StorageError> {
    let (ancestor_id, descendant_id, path_length, created_at) = row;
    Ok(FolderPath {
        ancestor_id,
        descendant_id,
        path_length: from_db_int(path_length)?,
        created_at,
    })
}

pub async fn insert_paths<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    schema: &str,
    paths: &[FolderPath],
) -> Result<(), StorageError> {
    if paths.is_empty() {
        return Ok(());
    }

    let ancestors: Vec<Uuid> = paths.iter().map(|p| p.ancestor_id).collect();
    let descendants: Vec<Uuid> = paths.iter().map(|p| p.descendant_id).collect();
    let lengths: Vec<i32> = paths.iter().map(|p| to_db_int(p.path_length)).collect();
    let created: Vec<DateTime<Utc>> = paths.iter().map(|p| p.created_at).collect();

    let query = format!(
        r#"
        INSERT INTO {schema}.folder_paths (ancestor_id, descendant_id, path_length, created_at)
        SELECT * FROM UNNEST($1::uuid[], $2::uuid[], $3::int4[], $4::timestamptz[])
        "#
    );
    sqlx::query(&query)
        .bind(ancestors)
        .bind(descendants)
        .bind(lengths)
        .bind(created)
        .execute(executor)
        .await
        .map_err(|e| to_write_error(e, || "folder path".to_string()))?;
    Ok(())
}

pub async fn find_paths_by_descendant<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    schema: &str,
    folder_id: Uuid,
) -> Result<Vec<FolderPath>, StorageError> {
    let query = format!(
        r#"SELECT ancestor_id, descendant_id, path_length, created_at
           FROM {schema}.folder_paths
           WHERE descendant_id = $1
           ORDER BY path_length"#
    );
    let rows: Vec<PathRow> = sqlx::query_as(&query)
        .bind(folder_id)
        .fetch_all(executor)
        .await
        .map_err(to_storage_error)?;
    rows.into_iter().map(path_from_row).collect()
}

pub async fn find_paths_by_ancestor<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    schema: &str,
    folder_id: Uuid,
) -> Result<Vec<FolderPath>, StorageError> {
    let query = format!(
        r#"SELECT ancestor_id, descendant_id, path_length, created_at
           FROM {schema}.folder_paths
           WHERE ancestor_id = $1
           ORDER BY path_length"#
    );
    let rows: Vec<PathRow> = sqlx::query_as(&query)
        .bind(folder_id)
        .fetch_all(executor)
        .await
        .map_err(to_storage_error)?;
    rows.into_iter().map(path_from_row).collect()
}

pub async fn list_paths<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    schema: &str,
) -> Result<Vec<FolderPath>, StorageError> {
    let query = format!(
        "SELECT ancestor_id, descendant_id, path_length, created_at FROM {schema}.folder_paths"
    );
    let rows: Vec<PathRow> = sqlx::query_as(&query)
        .fetch_all(executor)
        .await
        .map_err(to_storage_error)?;
    rows.into_iter().map(path_from_row).collect()
}

pub async fn delete_subtree_paths<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    schema: &str,
    folder_id: Uuid,
) -> Result<u64, StorageError> {
    let query = format!(
        r#"DELETE FROM {schema}.folder_paths
           WHERE descendant_id IN (
               SELECT descendant_id FROM {schema}.folder_paths WHERE ancestor_id = $1
           )"#
    );
    let result = sqlx::query(&query)
        .bind(folder_id)
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(result.rows_affected())
}

pub async fn delete_paths_touching<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    schema: &str,
    folder_id: Uuid,
) -> Result<u64, StorageError> {
    let query = format!(
        "DELETE FROM {schema}.folder_paths WHERE descendant_id = $1 OR ancestor_id = $1"
    );
    let result = sqlx::query(&query)
        .bind(folder_id)
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(result.rows_affected())
}

/// Drops the rows linking the subtree of `folder_id` to ancestors outside it.
pub async fn detach_subtree<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    schema: &str,
    folder_id: Uuid,
) -> Result<u64, StorageError> {
    let query = format!(
        r#"DELETE FROM {schema}.folder_paths AS fp
           USING {schema}.folder_paths AS sub
           WHERE sub.ancestor_id = $1
             AND fp.descendant_id = sub.descendant_id
             AND fp.ancestor_id NOT IN (
                 SELECT descendant_id FROM {schema}.folder_paths WHERE ancestor_id = $1
             )"#
    );
    let result = sqlx::query(&query)
        .bind(folder_id)
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(result.rows_affected())
}

pub async fn lock_hierarchy<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    schema: &str,
) -> Result<(), StorageError> {
    sqlx::query("SELECT pg_advisory_xact_lock(hashtext($1))")
        .bind(schema)
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(())
}

// --- Folders ---

type FolderRow = (Uuid, String, Option<Uuid>, Uuid, i32, DateTime<Utc>, DateTime<Utc>);

const FOLDER_COLUMNS: &str = "id, name, parent_id, owner_id, depth, created_at, updated_at";

fn folder_from_row(row: FolderRow) -> Result<Folder, StorageError> {
    let (id, name, parent_id, owner_id, depth, created_at, updated_at) = row;
    Ok(Folder {
        id,
        name,
        parent_id,
        owner_id,
        depth: from_db_int(depth)?,
        created_at,
        updated_at,
    })
}

pub async fn insert_folder<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    schema: &str,
    folder: &Folder,
) -> Result<(), StorageError> {
    let query = format!(
        r#"
        INSERT INTO {schema}.folders ({FOLDER_COLUMNS})
        VALUES ($1, $2, $3, $4, $5, $6, $7)
        "#
    );
    sqlx::query(&query)
        .bind(folder.id)
        .bind(&folder.name)
        .bind(folder.parent_id)
        .bind(folder.owner_id)
        .bind(to_db_int(folder.depth))
        .bind(folder.created_at)
        .bind(folder.updated_at)
        .execute(executor)
        .await
        .map_err(|e| to_write_error(e, || format!("folder {}", folder.id)))?;
    Ok(())
}

pub async fn find_folder<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    schema: &str,
    id: Uuid,
) -> Result<Option<Folder>, StorageError> {
    let query = format!("SELECT {FOLDER_COLUMNS} FROM {schema}.folders WHERE id = $1");
    let row: Option<FolderRow> = sqlx::query_as(&query)
        .bind(id)
        .fetch_optional(executor)
        .await
        .map_err(to_storage_error)?;
    row.map(folder_from_row).transpose()
}

pub async fn set_folder_parent<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    schema: &str,
    id: Uuid,
    parent_id: Option<Uuid>,
) -> Result<u64, StorageError> {
    let query = format!(
        "UPDATE {schema}.folders SET parent_id = $2, updated_at = now() WHERE id = $1"
    );
    let result = sqlx::query(&query)
        .bind(id)
        .bind(parent_id)
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(result.rows_affected())
}

pub async fn set_folder_owner<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    schema: &str,
    id: Uuid,
    owner_id: Uuid,
) -> Result<u64, StorageError> {
    let query =
        format!("UPDATE {schema}.folders SET owner_id = $2, updated_at = now() WHERE id = $1");
    let result = sqlx::query(&query)
        .bind(id)
        .bind(owner_id)
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(result.rows_affected())
}

pub async fn set_folder_depths<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    schema: &str,
    depths: &[(Uuid, u32)],
) -> Result<u64, StorageError> {
    let ids: Vec<Uuid> = depths.iter().map(|(id, _)| *id).collect();
    let values: Vec<i32> = depths.iter().map(|(_, d)| to_db_int(*d)).collect();

    let query = format!(
        r#"UPDATE {schema}.folders AS f
           SET depth = d.depth, updated_at = now()
           FROM UNNEST($1::uuid[], $2::int4[]) AS d(id, depth)
           WHERE f.id = d.id"#
    );
    let result = sqlx::query(&query)
        .bind(ids)
        .bind(values)
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(result.rows_affected())
}

pub async fn delete_folders<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    schema: &str,
    ids: &[Uuid],
) -> Result<u64, StorageError> {
    let query = format!("DELETE FROM {schema}.folders WHERE id = ANY($1)");
    let result = sqlx::query(&query)
        .bind(ids)
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(result.rows_affected())
}

pub async fn list_folders<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    schema: &str,
) -> Result<Vec<Folder>, StorageError> {
    let query = format!(
        "SELECT {FOLDER_COLUMNS} FROM {schema}.folders ORDER BY depth, created_at"
    );
    let rows: Vec<FolderRow> = sqlx::query_as(&query)
        .fetch_all(executor)
        .await
        .map_err(to_storage_error)?;
    rows.into_iter().map(folder_from_row).collect()
}

// --- Group memberships ---

type MembershipRow = (Uuid, Uuid, String, DateTime<Utc>);

fn membership_from_row(row: MembershipRow) -> Result<GroupMembership, StorageError> {
    let (group_id, user_id, role, joined_at) = row;
    Ok(GroupMembership {
        group_id,
        user_id,
        role: role.parse().map_err(corrupt_row)?,
        joined_at,
    })
}

pub async fn insert_membership<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    schema: &str,
    membership: &GroupMembership,
) -> Result<(), StorageError> {
    let query = format!(
        r#"
        INSERT INTO {schema}.group_memberships (group_id, user_id, role, joined_at)
        VALUES ($1, $2, $3, $4)
        "#
    );
    sqlx::query(&query)
        .bind(membership.group_id)
        .bind(membership.user_id)
        .bind(membership.role.as_str())
        .bind(membership.joined_at)
        .execute(executor)
        .await
        .map_err(|e| {
            to_write_error(e, || {
                format!(
                    "membership of user {} in group {}",
                    membership.user_id, membership.group_id
                )
            })
        })?;
    Ok(())
}

pub async fn delete_membership<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    schema: &str,
    group_id: Uuid,
    user_id: Uuid,
) -> Result<bool, StorageError> {
    let query =
        format!("DELETE FROM {schema}.group_memberships WHERE group_id = $1 AND user_id = $2");
    let result = sqlx::query(&query)
        .bind(group_id)
        .bind(user_id)
        .execute(executor)
        .await
        .map_err(to_storage_error)?;
    Ok(result.rows_affected() > 0)
}

pub async fn find_memberships<'e>(
    executor: impl sqlx::PgExecutor<'e>,
    schema: &str,
    column: MembershipColumn,
    id: Uuid,
) -> Result<Vec<GroupMembership>, StorageError> {
    let column = match column {
        MembershipColumn::User => "user_id",
        MembershipColumn::Group => "group_id",
    };
    let query = format!(
        r#"SELECT group_id, user_id, role, joined_at
           FROM {schema}.group_memberships
           WHERE {column} = $1
           ORDER BY joined_at"#
    );
    let rows: Vec<MembershipRow> = sqlx::query_as(&query)
        .bind(id)
        .fetch_all(executor)
        .await
        .map_err(to_storage_error)?;
    rows.into_iter().map(membership_from_row).collect()
}

#[derive(Debug, Clone, Copy)]
pub enum MembershipColumn {
    User,
    Group,
}

#[cfg(test)]
mod tests {
    use super::*;
    use coffer_core::tuple::{Relation, SubjectType};

    #[test]
    fn empty_filter_clause_is_true() {
        let (clause, binds) = filter_clause(&TupleFilter::default(), 1);

        assert_eq!(clause, "TRUE");
        assert!(binds.is_empty());
    }

    #[test]
    fn filter_clause_numbers_placeholders_in_order() {
        let filter = TupleFilter {
            subject_type: Some(SubjectType::User),
            relation: Some(Relation::Owner),
            object_id: Some(Uuid::new_v4()),
            ..Default::default()
        };

        let (clause, binds) = filter_clause(&filter, 2);

        assert_eq!(
            clause,
            "subject_type = $2 AND relation = $3 AND object_id = $4"
        );
        assert_eq!(binds.len(), 3);
        assert!(matches!(binds[0], FilterBind::Text("user")));
        assert!(matches!(binds[2], FilterBind::Id(_)));
    }

    #[test]
    fn negative_depth_is_reported_as_corrupt() {
        let err = from_db_int(-1).unwrap_err();

        assert!(matches!(err, StorageError::Internal(ref msg) if msg.contains("corrupt")));
    }
}
