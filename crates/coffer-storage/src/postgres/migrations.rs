use sqlx::PgPool;

use crate::traits::StorageError;

pub fn validate_schema_name(name: &str) -> Result<(), StorageError> {
    let is_valid = name.starts_with("tenant_")
        && name.len() == 39
        && name[7..].chars().all(|c| c.is_ascii_hexdigit());
    if !is_valid {
        return Err(StorageError::Internal(format!(
            "invalid tenant schema name: {name}"
        )));
    }
    Ok(())
}

pub async fn run_shared_migrations(pool: &PgPool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tenants (
            id          UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            name        TEXT NOT NULL UNIQUE,
            pg_schema   TEXT NOT NULL UNIQUE,
            created_at  TIMESTAMPTZ NOT NULL DEFAULT now()
        )
        "#,
    )
    .execute(pool)
    .await?;

    Ok(())
}

fn tenant_statements(schema: &str) -> Vec<String> {
    vec![
        format!("CREATE SCHEMA IF NOT EXISTS {schema}"),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {schema}.relationships (
                id              UUID PRIMARY KEY,
                subject_type    TEXT NOT NULL,
                subject_id      UUID NOT NULL,
                relation        TEXT NOT NULL,
                object_type     TEXT NOT NULL,
                object_id       UUID NOT NULL,
                created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
                UNIQUE (subject_type, subject_id, relation, object_type, object_id)
            )
            "#
        ),
        format!(
            r#"
            CREATE INDEX IF NOT EXISTS idx_relationships_object
            ON {schema}.relationships (object_type, object_id, relation)
            "#
        ),
        format!(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_relationships_single_parent
            ON {schema}.relationships (object_type, object_id)
            WHERE relation = 'parent'
            "#
        ),
        format!(
            r#"
            CREATE UNIQUE INDEX IF NOT EXISTS idx_relationships_single_owner
            ON {schema}.relationships (object_type, object_id)
            WHERE relation = 'owner'
            "#
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {schema}.permission_grants (
                id              UUID PRIMARY KEY,
                resource_type   TEXT NOT NULL,
                resource_id     UUID NOT NULL,
                grantee_type    TEXT NOT NULL,
                grantee_id      UUID NOT NULL,
                role            TEXT NOT NULL CHECK (role <> 'owner'),
                granted_by      UUID NOT NULL,
                granted_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
                UNIQUE (resource_type, resource_id, grantee_type, grantee_id, role)
            )
            "#
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {schema}.folders (
                id          UUID PRIMARY KEY,
                name        TEXT NOT NULL,
                parent_id   UUID REFERENCES {schema}.folders(id),
                owner_id    UUID NOT NULL,
                depth       INT NOT NULL CHECK (depth >= 0),
                created_at  TIMESTAMPTZ NOT NULL DEFAULT now(),
                updated_at  TIMESTAMPTZ NOT NULL DEFAULT now()
            )
            "#
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {schema}.folder_paths (
                ancestor_id     UUID NOT NULL,
                descendant_id   UUID NOT NULL,
                path_length     INT NOT NULL CHECK (path_length >= 0),
                created_at      TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (ancestor_id, descendant_id)
            )
            "#
        ),
        format!(
            r#"
            CREATE INDEX IF NOT EXISTS idx_folder_paths_descendant
            ON {schema}.folder_paths (descendant_id, path_length)
            "#
        ),
        format!(
            r#"
            CREATE TABLE IF NOT EXISTS {schema}.group_memberships (
                group_id    UUID NOT NULL,
                user_id     UUID NOT NULL,
                role        TEXT NOT NULL,
                joined_at   TIMESTAMPTZ NOT NULL DEFAULT now(),
                PRIMARY KEY (group_id, user_id)
            )
            "#
        ),
        format!(
            r#"
            CREATE INDEX IF NOT EXISTS idx_group_memberships_user
            ON {schema}.group_memberships (user_id)
            "#
        ),
    ]
}

pub async fn create_tenant_schema(pool: &PgPool, schema_name: &str) -> Result<(), StorageError> {
    validate_schema_name(schema_name)?;

    for statement in tenant_statements(schema_name) {
        sqlx::query(&statement)
            .execute(pool)
            .await
            .map_err(|e| StorageError::Internal(e.to_string()))?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_schema_name_accepted() {
        let name = "tenant_00000000000000000000000000000000";
        assert!(validate_schema_name(name).is_ok());
    }

    #[test]
    fn rejects_sql_injection_attempt() {
        let name = "tenant_; DROP TABLE folders; --";
        assert!(validate_schema_name(name).is_err());
    }

    #[test]
    fn rejects_wrong_prefix_or_length() {
        assert!(validate_schema_name("schema_00000000000000000000000000000000").is_err());
        assert!(validate_schema_name("tenant_abc").is_err());
        assert!(validate_schema_name("tenant_0000000000000000000000000000000g").is_err());
    }

    #[test]
    fn every_tenant_statement_is_schema_qualified() {
        let schema = "tenant_a1b2c3d4e5f6a7b8c9d0e1f2a3b4c5d6";

        for statement in tenant_statements(schema).iter().skip(1) {
            assert!(
                statement.contains(&format!("{schema}.")),
                "unqualified statement: {statement}"
            );
        }
    }
}
