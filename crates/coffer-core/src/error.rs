#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid permission: '{0}'")]
    InvalidPermission(String),

    #[error("invalid role: '{0}'")]
    InvalidRole(String),

    #[error("invalid resource type: '{0}'")]
    InvalidResourceType(String),

    #[error("invalid grantee type: '{0}'")]
    InvalidGranteeType(String),

    #[error("invalid subject type: '{0}'")]
    InvalidSubjectType(String),

    #[error("invalid object type: '{0}'")]
    InvalidObjectType(String),

    #[error("invalid relation: '{0}'")]
    InvalidRelation(String),

    #[error("invalid membership role: '{0}'")]
    InvalidMembershipRole(String),

    #[error("the owner role cannot be granted or revoked; transfer ownership instead")]
    OwnerNotGrantable,

    #[error("cannot grant a role to yourself")]
    SelfGrant,
}
