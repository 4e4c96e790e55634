//! Closure-table rows for the folder hierarchy.
//!
//! Every folder owns one self-row (`path_length = 0`) plus one row per true
//! ancestor whose `path_length` is the number of edges between the two.

use std::collections::{HashMap, HashSet};
use std::fmt;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::folder::Folder;

#[derive(Debug, Clone)]
pub struct FolderPath {
    pub ancestor_id: Uuid,
    pub descendant_id: Uuid,
    pub path_length: u32,
    pub created_at: DateTime<Utc>,
}

impl FolderPath {
    pub fn new(ancestor_id: Uuid, descendant_id: Uuid, path_length: u32) -> Self {
        Self {
            ancestor_id,
            descendant_id,
            path_length,
            created_at: Utc::now(),
        }
    }

    pub fn self_reference(folder_id: Uuid) -> Self {
        Self::new(folder_id, folder_id, 0)
    }

    pub fn is_self_reference(&self) -> bool {
        self.ancestor_id == self.descendant_id
    }

    pub fn key(&self) -> (Uuid, Uuid) {
        (self.ancestor_id, self.descendant_id)
    }
}

/// Rows for a new folder: its self-row plus each of the parent's rows
/// (`parent_paths`, self-row included) lengthened by one.
pub fn build_ancestor_paths(folder_id: Uuid, parent_paths: &[FolderPath]) -> Vec<FolderPath> {
    let mut paths = Vec::with_capacity(parent_paths.len() + 1);
    paths.push(FolderPath::self_reference(folder_id));
    paths.extend(
        parent_paths
            .iter()
            .map(|p| FolderPath::new(p.ancestor_id, folder_id, p.path_length + 1)),
    );
    paths
}

/// Longest relative depth in a subtree given as rows `(root, node, depth)`.
pub fn subtree_height(subtree: &[FolderPath]) -> u32 {
    subtree.iter().map(|p| p.path_length).max().unwrap_or(0)
}

/// Rows that reattach a moved subtree below its new parent.
///
/// `subtree` holds the moved folder's rows as ancestor, i.e. `(root, node, d)`
/// for every node including the root itself. `new_parent_paths` are the new
/// parent's rows as descendant, self-row included; empty when moving to the
/// hierarchy root. Subtree-internal rows are untouched by a move and are not
/// part of the plan.
pub fn plan_subtree_move(subtree: &[FolderPath], new_parent_paths: &[FolderPath]) -> Vec<FolderPath> {
    let mut paths = Vec::with_capacity(subtree.len() * new_parent_paths.len());
    for node in subtree {
        for ancestor in new_parent_paths {
            paths.push(FolderPath::new(
                ancestor.ancestor_id,
                node.descendant_id,
                ancestor.path_length + 1 + node.path_length,
            ));
        }
    }
    paths
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClosureViolation {
    MissingSelfReference {
        folder_id: Uuid,
    },
    MissingPath {
        ancestor_id: Uuid,
        descendant_id: Uuid,
        expected_length: u32,
    },
    WrongLength {
        ancestor_id: Uuid,
        descendant_id: Uuid,
        expected: u32,
        actual: u32,
    },
    DuplicatePath {
        ancestor_id: Uuid,
        descendant_id: Uuid,
    },
    StrayPath {
        ancestor_id: Uuid,
        descendant_id: Uuid,
    },
    DepthMismatch {
        folder_id: Uuid,
        recorded: u32,
        actual: u32,
    },
    UnknownParent {
        folder_id: Uuid,
        parent_id: Uuid,
    },
    Cycle {
        folder_id: Uuid,
    },
}

impl fmt::Display for ClosureViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClosureViolation::MissingSelfReference { folder_id } => {
                write!(f, "folder {folder_id} has no self-reference row")
            }
            ClosureViolation::MissingPath {
                ancestor_id,
                descendant_id,
                expected_length,
            } => write!(
                f,
                "missing path {ancestor_id} -> {descendant_id} (length {expected_length})"
            ),
            ClosureViolation::WrongLength {
                ancestor_id,
                descendant_id,
                expected,
                actual,
            } => write!(
                f,
                "path {ancestor_id} -> {descendant_id} has length {actual}, expected {expected}"
            ),
            ClosureViolation::DuplicatePath {
                ancestor_id,
                descendant_id,
            } => write!(f, "duplicate path {ancestor_id} -> {descendant_id}"),
            ClosureViolation::StrayPath {
                ancestor_id,
                descendant_id,
            } => write!(f, "stray path {ancestor_id} -> {descendant_id}"),
            ClosureViolation::DepthMismatch {
                folder_id,
                recorded,
                actual,
            } => write!(
                f,
                "folder {folder_id} records depth {recorded} but sits at depth {actual}"
            ),
            ClosureViolation::UnknownParent {
                folder_id,
                parent_id,
            } => write!(f, "folder {folder_id} points at unknown parent {parent_id}"),
            ClosureViolation::Cycle { folder_id } => {
                write!(f, "folder {folder_id} is part of a parent cycle")
            }
        }
    }
}

/// Compares closure rows against the tree implied by the folders' parent
/// pointers and reports every disagreement.
pub fn verify_closure(folders: &[Folder], paths: &[FolderPath]) -> Vec<ClosureViolation> {
    let by_id: HashMap<Uuid, &Folder> = folders.iter().map(|f| (f.id, f)).collect();
    let mut violations = Vec::new();
    let mut expected: HashMap<(Uuid, Uuid), u32> = HashMap::new();

    for folder in folders {
        expected.insert((folder.id, folder.id), 0);

        let mut visited = HashSet::from([folder.id]);
        let mut current = folder.parent_id;
        let mut length = 1;
        let mut walked_to_root = true;

        while let Some(parent_id) = current {
            let Some(parent) = by_id.get(&parent_id) else {
                violations.push(ClosureViolation::UnknownParent {
                    folder_id: folder.id,
                    parent_id,
                });
                walked_to_root = false;
                break;
            };
            if !visited.insert(parent_id) {
                violations.push(ClosureViolation::Cycle {
                    folder_id: folder.id,
                });
                walked_to_root = false;
                break;
            }
            expected.insert((parent_id, folder.id), length);
            current = parent.parent_id;
            length += 1;
        }

        let actual_depth = length - 1;
        if walked_to_root && actual_depth != folder.depth {
            violations.push(ClosureViolation::DepthMismatch {
                folder_id: folder.id,
                recorded: folder.depth,
                actual: actual_depth,
            });
        }
    }

    let mut actual: HashMap<(Uuid, Uuid), Vec<u32>> = HashMap::new();
    for path in paths {
        actual.entry(path.key()).or_default().push(path.path_length);
    }

    for (&(ancestor_id, descendant_id), lengths) in &actual {
        if lengths.len() > 1 {
            violations.push(ClosureViolation::DuplicatePath {
                ancestor_id,
                descendant_id,
            });
        }
        match expected.get(&(ancestor_id, descendant_id)) {
            None => violations.push(ClosureViolation::StrayPath {
                ancestor_id,
                descendant_id,
            }),
            Some(&length) if lengths[0] != length => {
                violations.push(ClosureViolation::WrongLength {
                    ancestor_id,
                    descendant_id,
                    expected: length,
                    actual: lengths[0],
                })
            }
            Some(_) => {}
        }
    }

    for (&(ancestor_id, descendant_id), &expected_length) in &expected {
        if actual.contains_key(&(ancestor_id, descendant_id)) {
            continue;
        }
        if ancestor_id == descendant_id {
            violations.push(ClosureViolation::MissingSelfReference {
                folder_id: ancestor_id,
            });
        } else {
            violations.push(ClosureViolation::MissingPath {
                ancestor_id,
                descendant_id,
                expected_length,
            });
        }
    }

    violations
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keys(paths: &[FolderPath]) -> HashSet<(Uuid, Uuid, u32)> {
        paths
            .iter()
            .map(|p| (p.ancestor_id, p.descendant_id, p.path_length))
            .collect()
    }

    /// Builds the closure rows for `folders` the way folder creation does.
    fn closure_for(folders: &[Folder]) -> Vec<FolderPath> {
        let mut all: Vec<FolderPath> = Vec::new();
        for folder in folders {
            let parent_paths: Vec<FolderPath> = match folder.parent_id {
                Some(parent) => all
                    .iter()
                    .filter(|p| p.descendant_id == parent)
                    .cloned()
                    .collect(),
                None => vec![],
            };
            all.extend(build_ancestor_paths(folder.id, &parent_paths));
        }
        all
    }

    // --- build_ancestor_paths ---

    #[test]
    fn root_folder_gets_only_self_reference() {
        let id = Uuid::new_v4();

        let paths = build_ancestor_paths(id, &[]);

        assert_eq!(paths.len(), 1);
        assert!(paths[0].is_self_reference());
        assert_eq!(paths[0].path_length, 0);
    }

    #[test]
    fn child_paths_extend_parent_rows_by_one() {
        let root = Uuid::new_v4();
        let parent = Uuid::new_v4();
        let child = Uuid::new_v4();
        let parent_rows = vec![FolderPath::new(root, parent, 1), FolderPath::self_reference(parent)];

        let paths = build_ancestor_paths(child, &parent_rows);

        assert_eq!(paths.len(), parent_rows.len() + 1);
        assert_eq!(
            keys(&paths),
            HashSet::from([(child, child, 0), (parent, child, 1), (root, child, 2)])
        );
    }

    // --- plan_subtree_move ---

    #[test]
    fn move_plan_reattaches_every_subtree_node() {
        // a -> b -> c, moved under x -> y
        let owner = Uuid::new_v4();
        let a = Folder::new_root("a", owner);
        let b = Folder::new_child("b", owner, &a).unwrap();
        let c = Folder::new_child("c", owner, &b).unwrap();
        let x = Folder::new_root("x", owner);
        let y = Folder::new_child("y", owner, &x).unwrap();
        let closure = closure_for(&[a.clone(), b.clone(), c.clone(), x.clone(), y.clone()]);

        let subtree: Vec<FolderPath> = closure
            .iter()
            .filter(|p| p.ancestor_id == b.id)
            .cloned()
            .collect();
        let new_parent_paths: Vec<FolderPath> = closure
            .iter()
            .filter(|p| p.descendant_id == y.id)
            .cloned()
            .collect();

        let plan = plan_subtree_move(&subtree, &new_parent_paths);

        assert_eq!(
            keys(&plan),
            HashSet::from([
                (y.id, b.id, 1),
                (x.id, b.id, 2),
                (y.id, c.id, 2),
                (x.id, c.id, 3),
            ])
        );
    }

    #[test]
    fn move_plan_to_root_is_empty() {
        let folder = Uuid::new_v4();

        let plan = plan_subtree_move(&[FolderPath::self_reference(folder)], &[]);

        assert!(plan.is_empty());
    }

    #[test]
    fn subtree_height_is_longest_relative_depth() {
        let root = Uuid::new_v4();
        let rows = vec![
            FolderPath::self_reference(root),
            FolderPath::new(root, Uuid::new_v4(), 1),
            FolderPath::new(root, Uuid::new_v4(), 3),
        ];

        assert_eq!(subtree_height(&rows), 3);
        assert_eq!(subtree_height(&[]), 0);
    }

    // --- verify_closure ---

    #[test]
    fn consistent_closure_has_no_violations() {
        let owner = Uuid::new_v4();
        let a = Folder::new_root("a", owner);
        let b = Folder::new_child("b", owner, &a).unwrap();
        let c = Folder::new_child("c", owner, &b).unwrap();
        let folders = vec![a, b, c];

        let violations = verify_closure(&folders, &closure_for(&folders));

        assert!(violations.is_empty(), "unexpected: {violations:?}");
    }

    #[test]
    fn missing_and_stray_rows_are_reported() {
        let owner = Uuid::new_v4();
        let a = Folder::new_root("a", owner);
        let b = Folder::new_child("b", owner, &a).unwrap();
        let folders = vec![a.clone(), b.clone()];
        let mut closure = closure_for(&folders);
        closure.retain(|p| !(p.ancestor_id == a.id && p.descendant_id == b.id));
        closure.push(FolderPath::new(b.id, a.id, 1));

        let violations = verify_closure(&folders, &closure);

        assert!(violations.contains(&ClosureViolation::MissingPath {
            ancestor_id: a.id,
            descendant_id: b.id,
            expected_length: 1
        }));
        assert!(violations.contains(&ClosureViolation::StrayPath {
            ancestor_id: b.id,
            descendant_id: a.id
        }));
    }

    #[test]
    fn wrong_length_duplicate_and_missing_self_are_reported() {
        let owner = Uuid::new_v4();
        let a = Folder::new_root("a", owner);
        let b = Folder::new_child("b", owner, &a).unwrap();
        let folders = vec![a.clone(), b.clone()];
        let closure = vec![
            FolderPath::self_reference(a.id),
            FolderPath::new(a.id, b.id, 2),
            FolderPath::new(a.id, b.id, 2),
        ];

        let violations = verify_closure(&folders, &closure);

        assert!(violations.contains(&ClosureViolation::MissingSelfReference { folder_id: b.id }));
        assert!(violations.contains(&ClosureViolation::DuplicatePath {
            ancestor_id: a.id,
            descendant_id: b.id
        }));
        assert!(violations.contains(&ClosureViolation::WrongLength {
            ancestor_id: a.id,
            descendant_id: b.id,
            expected: 1,
            actual: 2
        }));
    }

    #[test]
    fn depth_mismatch_is_reported() {
        let owner = Uuid::new_v4();
        let a = Folder::new_root("a", owner);
        let mut b = Folder::new_child("b", owner, &a).unwrap();
        b.depth = 4;
        let folders = vec![a, b.clone()];

        let violations = verify_closure(&folders, &closure_for(&folders));

        assert_eq!(
            violations,
            vec![ClosureViolation::DepthMismatch {
                folder_id: b.id,
                recorded: 4,
                actual: 1
            }]
        );
    }

    #[test]
    fn parent_cycle_is_reported_without_looping() {
        let owner = Uuid::new_v4();
        let mut a = Folder::new_root("a", owner);
        let b = Folder::new_child("b", owner, &a).unwrap();
        a.parent_id = Some(b.id);

        let violations = verify_closure(&[a.clone(), b.clone()], &[]);

        assert!(violations.contains(&ClosureViolation::Cycle { folder_id: a.id }));
        assert!(violations.contains(&ClosureViolation::Cycle { folder_id: b.id }));
    }

    #[test]
    fn unknown_parent_is_reported() {
        let mut orphan = Folder::new_root("orphan", Uuid::new_v4());
        let missing = Uuid::new_v4();
        orphan.parent_id = Some(missing);

        let violations = verify_closure(&[orphan.clone()], &[FolderPath::self_reference(orphan.id)]);

        assert_eq!(
            violations,
            vec![ClosureViolation::UnknownParent {
                folder_id: orphan.id,
                parent_id: missing
            }]
        );
    }
}
