use uuid::Uuid;

use coffer_core::grant::PermissionGrant;
use coffer_core::resource::ResourceRef;
use coffer_core::tuple::TenantId;

pub fn audit_grant_created(tenant_id: &TenantId, grant: &PermissionGrant) {
    tracing::info!(
        target: "audit",
        event = "grant_created",
        tenant_id = %tenant_id,
        grant_id = %grant.id,
        resource = %grant.resource,
        grantee = %grant.grantee,
        role = grant.role.as_str(),
        granted_by = %grant.granted_by,
        "permission granted"
    );
}

pub fn audit_grant_revoked(tenant_id: &TenantId, grant: &PermissionGrant, revoked_by: Uuid) {
    tracing::info!(
        target: "audit",
        event = "grant_revoked",
        tenant_id = %tenant_id,
        grant_id = %grant.id,
        resource = %grant.resource,
        grantee = %grant.grantee,
        role = grant.role.as_str(),
        revoked_by = %revoked_by,
        "permission revoked"
    );
}

pub fn audit_folder_moved(
    tenant_id: &TenantId,
    folder_id: Uuid,
    new_parent_id: Option<Uuid>,
    moved_by: Uuid,
    subtree_size: usize,
) {
    tracing::info!(
        target: "audit",
        event = "folder_moved",
        tenant_id = %tenant_id,
        folder_id = %folder_id,
        new_parent_id = new_parent_id.map(|id| id.to_string()).unwrap_or_default(),
        moved_by = %moved_by,
        subtree_size = subtree_size,
        "folder moved"
    );
}

pub fn audit_ownership_transferred(
    tenant_id: &TenantId,
    resource: &ResourceRef,
    previous_owner: Uuid,
    new_owner: Uuid,
) {
    tracing::info!(
        target: "audit",
        event = "ownership_transferred",
        tenant_id = %tenant_id,
        resource = %resource,
        previous_owner = %previous_owner,
        new_owner = %new_owner,
        "ownership transferred"
    );
}

pub fn audit_access_denied(
    tenant_id: &TenantId,
    user_id: Uuid,
    resource: &ResourceRef,
    action: &str,
) {
    tracing::warn!(
        target: "audit",
        event = "access_denied",
        tenant_id = %tenant_id,
        user_id = %user_id,
        resource = %resource,
        action = action,
        "access denied"
    );
}
