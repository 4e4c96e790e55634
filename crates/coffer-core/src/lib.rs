pub mod error;
pub mod grant;
pub mod group;
pub mod hierarchy;
pub mod permission;
pub mod resolver;
pub mod resource;
pub mod role;
pub mod tuple;

pub use error::ValidationError;
pub use permission::{Permission, PermissionSet};
pub use resource::{ResourceRef, ResourceType};
pub use role::Role;
