use std::fmt;
use std::str::FromStr;

use uuid::Uuid;

use crate::error::ValidationError;
use crate::tuple::{ObjectRef, ObjectType, SubjectRef, SubjectType};

/// Kinds of resources that carry grants and inherit access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceType {
    File,
    Folder,
}

impl ResourceType {
    pub fn as_str(self) -> &'static str {
        match self {
            ResourceType::File => "file",
            ResourceType::Folder => "folder",
        }
    }
}

impl FromStr for ResourceType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(ResourceType::File),
            "folder" => Ok(ResourceType::Folder),
            other => Err(ValidationError::InvalidResourceType(other.to_string())),
        }
    }
}

impl fmt::Display for ResourceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceRef {
    pub resource_type: ResourceType,
    pub resource_id: Uuid,
}

impl ResourceRef {
    pub fn new(resource_type: ResourceType, resource_id: Uuid) -> Self {
        Self {
            resource_type,
            resource_id,
        }
    }

    pub fn file(id: Uuid) -> Self {
        Self::new(ResourceType::File, id)
    }

    pub fn folder(id: Uuid) -> Self {
        Self::new(ResourceType::Folder, id)
    }

    pub fn as_object(&self) -> ObjectRef {
        let object_type = match self.resource_type {
            ResourceType::File => ObjectType::File,
            ResourceType::Folder => ObjectType::Folder,
        };
        ObjectRef::new(object_type, self.resource_id)
    }

    pub fn as_subject(&self) -> SubjectRef {
        let subject_type = match self.resource_type {
            ResourceType::File => SubjectType::File,
            ResourceType::Folder => SubjectType::Folder,
        };
        SubjectRef::new(subject_type, self.resource_id)
    }

    /// Resources are only ever file or folder subjects; users and groups are not.
    pub fn from_subject(subject: &SubjectRef) -> Option<Self> {
        match subject.subject_type {
            SubjectType::File => Some(Self::file(subject.subject_id)),
            SubjectType::Folder => Some(Self::folder(subject.subject_id)),
            SubjectType::User | SubjectType::Group => None,
        }
    }
}

impl fmt::Display for ResourceRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.resource_type, self.resource_id)
    }
}
