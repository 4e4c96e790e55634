use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::HierarchyError;
use crate::resource::ResourceRef;

pub const MAX_FOLDER_DEPTH: u32 = 20;

/// The slice of a folder record the hierarchy cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Folder {
    pub id: Uuid,
    pub name: String,
    pub parent_id: Option<Uuid>,
    pub owner_id: Uuid,
    pub depth: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Folder {
    pub fn new_root(name: impl Into<String>, owner_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            parent_id: None,
            owner_id,
            depth: 0,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn new_child(
        name: impl Into<String>,
        owner_id: Uuid,
        parent: &Folder,
    ) -> Result<Self, HierarchyError> {
        let depth = parent.depth + 1;
        if depth > MAX_FOLDER_DEPTH {
            return Err(HierarchyError::MaxDepthExceeded {
                depth,
                max: MAX_FOLDER_DEPTH,
            });
        }

        let mut folder = Self::new_root(name, owner_id);
        folder.parent_id = Some(parent.id);
        folder.depth = depth;
        Ok(folder)
    }

    pub fn resource(&self) -> ResourceRef {
        ResourceRef::folder(self.id)
    }

    pub fn is_root(&self) -> bool {
        self.parent_id.is_none()
    }

    /// Checks that this folder may be re-parented under `new_parent` (or to the
    /// root when `None`) and returns its depth after the move.
    ///
    /// `descendant_ids` is the folder's subtree as returned by the closure table;
    /// the closure table itself never checks for cycles. `subtree_height` is the
    /// longest path from this folder down to one of its descendants.
    pub fn validate_move(
        &self,
        new_parent: Option<&Folder>,
        descendant_ids: &[Uuid],
        subtree_height: u32,
    ) -> Result<u32, HierarchyError> {
        if let Some(parent) = new_parent
            && (parent.id == self.id || descendant_ids.contains(&parent.id))
        {
            return Err(HierarchyError::CircularMove {
                folder_id: self.id,
                target_id: parent.id,
            });
        }

        let new_depth = new_parent.map_or(0, |p| p.depth + 1);
        let deepest = new_depth + subtree_height;
        if deepest > MAX_FOLDER_DEPTH {
            return Err(HierarchyError::MaxDepthExceeded {
                depth: deepest,
                max: MAX_FOLDER_DEPTH,
            });
        }

        Ok(new_depth)
    }
}
