use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::ValidationError;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TenantId(Uuid);

impl TenantId {
    pub fn new(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl From<Uuid> for TenantId {
    fn from(id: Uuid) -> Self {
        Self(id)
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubjectType {
    User,
    Group,
    File,
    Folder,
}

impl SubjectType {
    pub fn as_str(self) -> &'static str {
        match self {
            SubjectType::User => "user",
            SubjectType::Group => "group",
            SubjectType::File => "file",
            SubjectType::Folder => "folder",
        }
    }
}

impl FromStr for SubjectType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(SubjectType::User),
            "group" => Ok(SubjectType::Group),
            "file" => Ok(SubjectType::File),
            "folder" => Ok(SubjectType::Folder),
            other => Err(ValidationError::InvalidSubjectType(other.to_string())),
        }
    }
}

impl fmt::Display for SubjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ObjectType {
    File,
    Folder,
    Group,
}

impl ObjectType {
    pub fn as_str(self) -> &'static str {
        match self {
            ObjectType::File => "file",
            ObjectType::Folder => "folder",
            ObjectType::Group => "group",
        }
    }
}

impl FromStr for ObjectType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "file" => Ok(ObjectType::File),
            "folder" => Ok(ObjectType::Folder),
            "group" => Ok(ObjectType::Group),
            other => Err(ValidationError::InvalidObjectType(other.to_string())),
        }
    }
}

impl fmt::Display for ObjectType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Relation {
    Owner,
    Member,
    Parent,
}

impl Relation {
    pub fn as_str(self) -> &'static str {
        match self {
            Relation::Owner => "owner",
            Relation::Member => "member",
            Relation::Parent => "parent",
        }
    }
}

impl FromStr for Relation {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "owner" => Ok(Relation::Owner),
            "member" => Ok(Relation::Member),
            "parent" => Ok(Relation::Parent),
            other => Err(ValidationError::InvalidRelation(other.to_string())),
        }
    }
}

impl fmt::Display for Relation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ObjectRef {
    pub object_type: ObjectType,
    pub object_id: Uuid,
}

impl ObjectRef {
    pub fn new(object_type: ObjectType, object_id: Uuid) -> Self {
        Self {
            object_type,
            object_id,
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.object_type, self.object_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubjectRef {
    pub subject_type: SubjectType,
    pub subject_id: Uuid,
}

impl SubjectRef {
    pub fn new(subject_type: SubjectType, subject_id: Uuid) -> Self {
        Self {
            subject_type,
            subject_id,
        }
    }

    pub fn user(id: Uuid) -> Self {
        Self::new(SubjectType::User, id)
    }

    pub fn group(id: Uuid) -> Self {
        Self::new(SubjectType::Group, id)
    }
}

impl fmt::Display for SubjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.subject_type, self.subject_id)
    }
}

/// The natural key of a relationship: `subject#relation@object`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Tuple {
    pub subject: SubjectRef,
    pub relation: Relation,
    pub object: ObjectRef,
}

impl Tuple {
    pub fn new(subject: SubjectRef, relation: Relation, object: ObjectRef) -> Self {
        Self {
            subject,
            relation,
            object,
        }
    }

    pub fn owner(user_id: Uuid, object: ObjectRef) -> Self {
        Self::new(SubjectRef::user(user_id), Relation::Owner, object)
    }

    pub fn member(user_id: Uuid, group_id: Uuid) -> Self {
        Self::new(
            SubjectRef::user(user_id),
            Relation::Member,
            ObjectRef::new(ObjectType::Group, group_id),
        )
    }

    pub fn parent(parent: SubjectRef, child: ObjectRef) -> Self {
        Self::new(parent, Relation::Parent, child)
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}@{}", self.subject, self.relation, self.object)
    }
}

/// A stored tuple.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    pub id: Uuid,
    pub subject: SubjectRef,
    pub relation: Relation,
    pub object: ObjectRef,
    pub created_at: DateTime<Utc>,
}

impl Relationship {
    pub fn new(tuple: Tuple) -> Self {
        Self {
            id: Uuid::new_v4(),
            subject: tuple.subject,
            relation: tuple.relation,
            object: tuple.object,
            created_at: Utc::now(),
        }
    }

    pub fn tuple(&self) -> Tuple {
        Tuple::new(self.subject, self.relation, self.object)
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tuple())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TupleFilter {
    pub subject_type: Option<SubjectType>,
    pub subject_id: Option<Uuid>,
    pub relation: Option<Relation>,
    pub object_type: Option<ObjectType>,
    pub object_id: Option<Uuid>,
}

impl TupleFilter {
    pub fn by_object(object: &ObjectRef) -> Self {
        Self {
            object_type: Some(object.object_type),
            object_id: Some(object.object_id),
            ..Default::default()
        }
    }

    pub fn by_subject(subject: &SubjectRef) -> Self {
        Self {
            subject_type: Some(subject.subject_type),
            subject_id: Some(subject.subject_id),
            ..Default::default()
        }
    }

    /// Matches exactly the relationship whose natural key is `tuple`.
    pub fn exact(tuple: &Tuple) -> Self {
        Self {
            subject_type: Some(tuple.subject.subject_type),
            subject_id: Some(tuple.subject.subject_id),
            relation: Some(tuple.relation),
            object_type: Some(tuple.object.object_type),
            object_id: Some(tuple.object.object_id),
        }
    }

    pub fn with_relation(mut self, relation: Relation) -> Self {
        self.relation = Some(relation);
        self
    }

    pub fn is_empty(&self) -> bool {
        self == &Self::default()
    }

    pub fn matches(&self, tuple: &Tuple) -> bool {
        if let Some(st) = self.subject_type
            && st != tuple.subject.subject_type
        {
            return false;
        }
        if let Some(si) = self.subject_id
            && si != tuple.subject.subject_id
        {
            return false;
        }
        if let Some(r) = self.relation
            && r != tuple.relation
        {
            return false;
        }
        if let Some(ot) = self.object_type
            && ot != tuple.object.object_type
        {
            return false;
        }
        if let Some(oi) = self.object_id
            && oi != tuple.object.object_id
        {
            return false;
        }
        true
    }
}
