//! Derived folder tree over the flat file records.
//!
//! Stored files are a flat collection; the hierarchy shown in the sidebar is
//! projected from their `/`-delimited paths on every read. Nothing here is
//! persisted: folders exist only as shared path prefixes, and deleting the
//! last file under a prefix makes the folder disappear on the next build.

use std::cmp::Ordering;

use serde::Serialize;

use crate::model::{FileId, StoredFile};

/// One node in the projected tree: a folder with children, or a file leaf.
///
/// `path` is the cumulative slash-joined path from the root, which is also
/// the key used for expand/collapse state and folder-scoped deletes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum TreeNode {
    Folder {
        name: String,
        path: String,
        children: Vec<TreeNode>,
    },
    File {
        name: String,
        path: String,
        id: FileId,
        size_bytes: u64,
    },
}

impl TreeNode {
    pub fn name(&self) -> &str {
        match self {
            TreeNode::Folder { name, .. } | TreeNode::File { name, .. } => name,
        }
    }

    pub fn path(&self) -> &str {
        match self {
            TreeNode::Folder { path, .. } | TreeNode::File { path, .. } => path,
        }
    }

    pub fn is_folder(&self) -> bool {
        matches!(self, TreeNode::Folder { .. })
    }
}

/// Project the file records into a forest of root nodes.
///
/// Guarantees, independent of input order:
/// - exactly one file node per input record (duplicate paths stay distinct
///   nodes, told apart by their ids);
/// - folder nodes are unique per cumulative path;
/// - children are sorted folders-first, then by case-sensitive name.
pub fn build_tree(files: &[StoredFile]) -> Vec<TreeNode> {
    // Sort by path so folder creation order is deterministic under reordering.
    let mut sorted: Vec<&StoredFile> = files.iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path).then(a.id.cmp(&b.id)));

    let mut roots: Vec<TreeNode> = Vec::new();
    for file in sorted {
        let segs = segments(&file.path);
        if segs.is_empty() {
            // Pathological path (empty or all slashes); the record still gets
            // its node, keyed by the stored name.
            roots.push(TreeNode::File {
                name: file.name.clone(),
                path: file.name.clone(),
                id: file.id,
                size_bytes: file.size_bytes,
            });
        } else {
            insert_into(&mut roots, "", &segs, file);
        }
    }

    sort_level(&mut roots);
    roots
}

/// Files at or under a folder path, anchored on whole segments:
/// `"Foo"` matches `"Foo"` and `"Foo/x.pdf"` but never `"Foobar/x.pdf"`.
pub fn files_under<'a>(files: &'a [StoredFile], folder_path: &str) -> Vec<&'a StoredFile> {
    let prefix = format!("{folder_path}/");
    files
        .iter()
        .filter(|f| f.path == folder_path || f.path.starts_with(&prefix))
        .collect()
}

/// Collapse leading and doubled slashes into the canonical stored form.
pub fn normalize_path(path: &str) -> String {
    segments(path).join("/")
}

/// Total number of folder nodes in the forest.
pub fn count_folders(nodes: &[TreeNode]) -> usize {
    nodes
        .iter()
        .map(|n| match n {
            TreeNode::Folder { children, .. } => 1 + count_folders(children),
            TreeNode::File { .. } => 0,
        })
        .sum()
}

fn segments(path: &str) -> Vec<&str> {
    path.split('/').filter(|s| !s.is_empty()).collect()
}

fn join(parent: &str, seg: &str) -> String {
    if parent.is_empty() {
        seg.to_string()
    } else {
        format!("{parent}/{seg}")
    }
}

fn insert_into(level: &mut Vec<TreeNode>, parent_path: &str, segs: &[&str], file: &StoredFile) {
    match segs {
        [] => {}
        [leaf] => {
            level.push(TreeNode::File {
                name: (*leaf).to_string(),
                path: join(parent_path, leaf),
                id: file.id,
                size_bytes: file.size_bytes,
            });
        }
        [head, rest @ ..] => {
            let path = join(parent_path, head);
            if !level.iter().any(|n| n.is_folder() && n.name() == *head) {
                level.push(TreeNode::Folder {
                    name: (*head).to_string(),
                    path: path.clone(),
                    children: Vec::new(),
                });
            }
            for node in level.iter_mut() {
                if let TreeNode::Folder { name, children, .. } = node {
                    if name == head {
                        insert_into(children, &path, rest, file);
                        return;
                    }
                }
            }
        }
    }
}

fn sort_level(nodes: &mut [TreeNode]) {
    nodes.sort_by(|a, b| match (a.is_folder(), b.is_folder()) {
        (true, false) => Ordering::Less,
        (false, true) => Ordering::Greater,
        _ => a.name().cmp(b.name()),
    });
    for node in nodes.iter_mut() {
        if let TreeNode::Folder { children, .. } = node {
            sort_level(children);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rec(id: u64, path: &str) -> StoredFile {
        let name = path.rsplit('/').next().unwrap_or(path).to_string();
        StoredFile::new(FileId::new(id).unwrap(), name, path, 100)
    }

    fn count_files(nodes: &[TreeNode]) -> usize {
        nodes
            .iter()
            .map(|n| match n {
                TreeNode::Folder { children, .. } => count_files(children),
                TreeNode::File { .. } => 1,
            })
            .sum()
    }

    #[test]
    fn one_file_node_per_record() {
        let files = vec![
            rec(1, "a.pdf"),
            rec(2, "Docs/b.pdf"),
            rec(3, "Docs/Sub/c.pdf"),
            rec(4, "Docs2/d.pdf"),
        ];
        let tree = build_tree(&files);
        assert_eq!(count_files(&tree), 4);
    }

    #[test]
    fn scenario_forest_shape_and_order() {
        let files = vec![
            rec(1, "a.pdf"),
            rec(2, "Docs/b.pdf"),
            rec(3, "Docs/Sub/c.pdf"),
            rec(4, "Docs2/d.pdf"),
        ];
        let tree = build_tree(&files);

        // Roots: folders Docs, Docs2 first, then file a.pdf.
        assert_eq!(tree.len(), 3);
        assert_eq!(tree[0].name(), "Docs");
        assert!(tree[0].is_folder());
        assert_eq!(tree[1].name(), "Docs2");
        assert!(tree[1].is_folder());
        assert_eq!(tree[2].name(), "a.pdf");
        assert!(!tree[2].is_folder());

        // Docs contains folder Sub (first) then b.pdf; cumulative paths.
        let TreeNode::Folder { children, .. } = &tree[0] else {
            panic!("Docs should be a folder");
        };
        assert_eq!(children.len(), 2);
        assert_eq!(children[0].name(), "Sub");
        assert_eq!(children[0].path(), "Docs/Sub");
        assert_eq!(children[1].name(), "b.pdf");
        assert_eq!(children[1].path(), "Docs/b.pdf");

        let TreeNode::Folder { children: sub, .. } = &children[0] else {
            panic!("Sub should be a folder");
        };
        assert_eq!(sub.len(), 1);
        assert_eq!(sub[0].path(), "Docs/Sub/c.pdf");
    }

    #[test]
    fn deterministic_under_input_reordering() {
        let forward = vec![
            rec(1, "a.pdf"),
            rec(2, "Docs/b.pdf"),
            rec(3, "Docs/Sub/c.pdf"),
            rec(4, "Docs2/d.pdf"),
        ];
        let mut reversed = forward.clone();
        reversed.reverse();
        assert_eq!(build_tree(&forward), build_tree(&reversed));
    }

    #[test]
    fn duplicate_filenames_stay_distinct_nodes() {
        let files = vec![rec(1, "x.pdf"), rec(2, "x.pdf")];
        let tree = build_tree(&files);
        assert_eq!(tree.len(), 2);
        let ids: Vec<u64> = tree
            .iter()
            .map(|n| match n {
                TreeNode::File { id, .. } => id.get(),
                TreeNode::Folder { .. } => panic!("expected file nodes"),
            })
            .collect();
        assert_eq!(tree[0].name(), "x.pdf");
        assert_eq!(tree[1].name(), "x.pdf");
        assert_ne!(ids[0], ids[1]);
    }

    #[test]
    fn duplicate_folder_segments_share_one_node() {
        let files = vec![rec(1, "Docs/a.pdf"), rec(2, "Docs/b.pdf")];
        let tree = build_tree(&files);
        assert_eq!(tree.len(), 1);
        assert_eq!(count_folders(&tree), 1);
    }

    #[test]
    fn malformed_paths_produce_no_empty_nodes() {
        let files = vec![rec(1, "/lead.pdf"), rec(2, "a//b.pdf")];
        let tree = build_tree(&files);

        fn no_empty_names(nodes: &[TreeNode]) -> bool {
            nodes.iter().all(|n| {
                !n.name().is_empty()
                    && match n {
                        TreeNode::Folder { children, .. } => no_empty_names(children),
                        TreeNode::File { .. } => true,
                    }
            })
        }
        assert!(no_empty_names(&tree));
        assert_eq!(count_files(&tree), 2);

        // "/lead.pdf" is a root file, "a//b.pdf" a single folder "a".
        assert_eq!(tree[0].name(), "a");
        assert_eq!(tree[1].name(), "lead.pdf");
        assert_eq!(tree[1].path(), "lead.pdf");
    }

    #[test]
    fn all_slash_path_falls_back_to_record_name() {
        let mut file = rec(1, "///");
        file.name = "weird.pdf".into();
        let tree = build_tree(&[file]);
        assert_eq!(tree.len(), 1);
        assert_eq!(tree[0].name(), "weird.pdf");
    }

    #[test]
    fn ordering_is_case_sensitive_folders_first() {
        let files = vec![
            rec(1, "z.pdf"),
            rec(2, "beta/x.pdf"),
            rec(3, "B.pdf"),
            rec(4, "Alpha/y.pdf"),
        ];
        let tree = build_tree(&files);
        let names: Vec<&str> = tree.iter().map(|n| n.name()).collect();
        // Folders Alpha, beta first; then files B.pdf before z.pdf ('B' < 'z').
        assert_eq!(names, vec!["Alpha", "beta", "B.pdf", "z.pdf"]);
    }

    #[test]
    fn files_under_is_segment_anchored() {
        let files = vec![
            rec(1, "Foo/x.pdf"),
            rec(2, "Foobar/x.pdf"),
            rec(3, "Foo/Sub/y.pdf"),
            rec(4, "Foo"),
        ];
        let under: Vec<&str> = files_under(&files, "Foo")
            .iter()
            .map(|f| f.path.as_str())
            .collect();
        assert_eq!(under, vec!["Foo/x.pdf", "Foo/Sub/y.pdf", "Foo"]);
        assert!(!under.contains(&"Foobar/x.pdf"));
    }

    #[test]
    fn files_under_empty_for_unknown_folder() {
        let files = vec![rec(1, "Docs/b.pdf")];
        assert!(files_under(&files, "Nope").is_empty());
    }

    #[test]
    fn normalize_path_strips_extra_slashes() {
        assert_eq!(normalize_path("/Docs//Sub/"), "Docs/Sub");
        assert_eq!(normalize_path("a.pdf"), "a.pdf");
        assert_eq!(normalize_path("///"), "");
    }

    #[test]
    fn empty_input_yields_empty_forest() {
        assert!(build_tree(&[]).is_empty());
    }
}
