mod closure;
mod folder;

pub use closure::{
    ClosureViolation, FolderPath, build_ancestor_paths, plan_subtree_move, subtree_height,
    verify_closure,
};
pub use folder::{Folder, MAX_FOLDER_DEPTH};

use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HierarchyError {
    #[error("cannot move folder {folder_id} under {target_id}: target is inside the folder's own subtree")]
    CircularMove { folder_id: Uuid, target_id: Uuid },

    #[error("folder depth {depth} exceeds maximum of {max}")]
    MaxDepthExceeded { depth: u32, max: u32 },
}
