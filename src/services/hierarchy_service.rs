use std::collections::{BTreeMap, HashMap};

use crate::models::folder::{Hierarchy, Tree};
use crate::scope_path;

/// Places every record under the record whose path equals its own path minus
/// the last segment. Unresolvable parents and single-segment paths become
/// roots. Iteration follows id order, so the first matching id wins ties.
pub fn derive_hierarchy(tree: &Tree) -> Hierarchy {
    let mut by_path: HashMap<String, &str> = HashMap::with_capacity(tree.len());
    for record in tree.records() {
        let key = scope_path::segments(record.tree_path()).join("/");
        by_path.entry(key).or_insert(record.id.as_str());
    }

    let mut root_ids = Vec::new();
    let mut children: BTreeMap<String, Vec<String>> = tree
        .records()
        .map(|record| (record.id.clone(), Vec::new()))
        .collect();

    for record in tree.records() {
        let Some(parent_key) = parent_path(record.tree_path()) else {
            root_ids.push(record.id.clone());
            continue;
        };

        match by_path.get(parent_key.as_str()) {
            Some(parent_id) if *parent_id != record.id => {
                if let Some(list) = children.get_mut(*parent_id) {
                    list.push(record.id.clone());
                }
            }
            _ => root_ids.push(record.id.clone()),
        }
    }

    Hierarchy { root_ids, children }
}

/// Parent path of a record, if its path has more than one segment.
pub fn parent_path(path: &str) -> Option<String> {
    let segments = scope_path::segments(path);
    if segments.len() <= 1 {
        return None;
    }
    Some(segments[..segments.len() - 1].join("/"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::folder::FolderRecord;
    use std::collections::HashSet;

    fn record(id: &str, path: &str) -> FolderRecord {
        let name = path.rsplit('/').next().unwrap_or(path);
        FolderRecord::new(id, name).with_path(path)
    }

    #[test]
    fn derives_roots_and_children_from_paths() {
        let tree = Tree::from_records([
            record("a", "src"),
            record("b", "src/lib"),
            record("c", "docs"),
        ]);

        let hierarchy = derive_hierarchy(&tree);

        assert_eq!(hierarchy.root_ids, vec!["a", "c"]);
        assert_eq!(hierarchy.children_of("a"), ["b".to_string()]);
        assert!(hierarchy.children_of("c").is_empty());
    }

    #[test]
    fn missing_parent_lands_at_root() {
        let tree = Tree::from_records([record("x", "deep/missing/leaf")]);
        let hierarchy = derive_hierarchy(&tree);
        assert_eq!(hierarchy.root_ids, vec!["x"]);
    }

    #[test]
    fn name_is_used_when_path_is_absent() {
        let tree = Tree::from_records([
            FolderRecord::new("1", "Documents"),
            FolderRecord::new("2", "Images"),
        ]);
        let hierarchy = derive_hierarchy(&tree);
        assert_eq!(hierarchy.root_ids, vec!["1", "2"]);
    }

    #[test]
    fn backslash_paths_resolve_parents() {
        let tree = Tree::from_records([
            FolderRecord::new("p", "src").with_path("src"),
            FolderRecord {
                path: Some("src\\app".to_string()),
                ..FolderRecord::new("q", "app")
            },
        ]);
        let hierarchy = derive_hierarchy(&tree);
        assert_eq!(hierarchy.root_ids, vec!["p"]);
        assert_eq!(hierarchy.children_of("p"), ["q".to_string()]);
    }

    #[test]
    fn first_id_wins_duplicate_parent_paths() {
        let tree = Tree::from_records([
            record("b-dup", "src"),
            record("a-dup", "src"),
            record("child", "src/lib"),
        ]);
        let hierarchy = derive_hierarchy(&tree);
        assert_eq!(hierarchy.children_of("a-dup"), ["child".to_string()]);
        assert!(hierarchy.children_of("b-dup").is_empty());
    }

    #[test]
    fn every_record_is_placed_exactly_once() {
        let tree = Tree::from_records([
            record("1", "a"),
            record("2", "a/b"),
            record("3", "a/b/c"),
            record("4", "a/x/y"),
            record("5", "z"),
            record("6", "a/b/c/d/e"),
        ]);
        let hierarchy = derive_hierarchy(&tree);

        let mut seen = HashSet::new();
        for id in hierarchy
            .root_ids
            .iter()
            .chain(hierarchy.children.values().flatten())
        {
            assert!(seen.insert(id.clone()), "{id} placed twice");
        }
        assert_eq!(seen.len(), tree.len());
        assert_eq!(derive_hierarchy(&tree), hierarchy);
    }

    #[test]
    fn rows_walk_depth_first() {
        let tree = Tree::from_records([
            record("a", "src"),
            record("b", "src/lib"),
            record("c", "docs"),
            record("d", "src/lib/util"),
        ]);
        let rows = derive_hierarchy(&tree).rows();
        let order: Vec<(&str, usize)> = rows.iter().map(|r| (r.id.as_str(), r.depth)).collect();
        assert_eq!(order, vec![("a", 0), ("b", 1), ("d", 2), ("c", 0)]);
    }

    #[test]
    fn parent_path_drops_last_segment() {
        assert_eq!(parent_path("a/b/c").as_deref(), Some("a/b"));
        assert_eq!(parent_path("a"), None);
    }
}
