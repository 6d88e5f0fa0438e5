#![forbid(unsafe_code)]

use arbor_core::ROOT_ID;
use arbor_storage::TreeStore;
use arbor_storage::file_tree::{File, FileNode, FileTree, Folder};
use proptest::collection::vec;
use proptest::prelude::*;

/// Builds a batch from `(is_branch, parent_pick)` pairs. Each node hangs off
/// the root or an earlier branch; `reverse` lists children before parents.
fn build_batch(store: &mut TreeStore<FileTree>, shape: &[(bool, usize)], reverse: bool) -> Vec<FileNode> {
    let ids = store.allocate_ids(shape.len()).expect("allocate");
    let mut branches = vec![ROOT_ID];
    let mut nodes = Vec::with_capacity(shape.len());
    for ((is_branch, pick), id) in shape.iter().zip(ids) {
        let parent = branches[pick % branches.len()];
        let mut node = if *is_branch {
            branches.push(id);
            FileNode::Branch(Folder::new(format!("dir{id}"), parent))
        } else {
            FileNode::Leaf(File::new(format!("file{id}.txt"), id, parent).with_content(format!("body {id}")))
        };
        let meta = node.metadata().with_id(id);
        node.set_metadata(meta);
        nodes.push(node);
    }
    if reverse {
        nodes.reverse();
    }
    nodes
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Every stored node's parent is the root or another stored node, before
    /// and after removing an arbitrary subtree.
    #[test]
    fn parents_always_resolve(
        shape in vec((any::<bool>(), 0usize..8), 1..40),
        reverse in any::<bool>(),
        victim in 0usize..40,
    ) {
        let dir = tempfile::tempdir().expect("temp dir");
        let mut store = TreeStore::open(dir.path().join("arbor.db"), FileTree::new("files").unwrap())
            .expect("open");
        store.enable_content_cache(dir.path().join("cache")).expect("cache");

        let batch = build_batch(&mut store, &shape, reverse);
        let ids = batch.iter().filter_map(|node| node.id()).collect::<Vec<_>>();
        let inserted = store.insert_bulk(batch).expect("insert");
        prop_assert_eq!(inserted.len(), shape.len());

        let victim = ids[victim % ids.len()];
        store.remove(victim).expect("remove");

        let mut remaining = 0usize;
        for id in &ids {
            let Ok(node) = store.get(*id) else {
                continue;
            };
            remaining += 1;
            let parent = node.metadata().parent;
            prop_assert!(parent == ROOT_ID || store.contains(parent).expect("contains"));
            if let Some(file) = node.as_leaf() {
                prop_assert_eq!(file.content.clone(), Some(format!("body {id}")));
            }
        }

        let summary = store.summary().expect("summary");
        prop_assert_eq!(summary.nodes(), remaining);
        prop_assert_eq!(summary.cached_payloads, summary.leaves);
        prop_assert_eq!(store.descendants(ROOT_ID).expect("walk").len(), remaining);
    }

    /// Siblings come back with strictly increasing sort keys.
    #[test]
    fn sibling_sorts_are_strictly_increasing(shape in vec((any::<bool>(), 0usize..4), 1..30)) {
        let mut store = TreeStore::open_in_memory(FileTree::new("files").unwrap()).expect("open");
        let batch = build_batch(&mut store, &shape, false);
        let inserted = store.insert_bulk(batch).expect("insert");

        let mut parents = inserted
            .iter()
            .map(|node| node.metadata().parent)
            .collect::<Vec<_>>();
        parents.sort_unstable();
        parents.dedup();
        for parent in parents {
            let sorts = store
                .get_children(parent)
                .expect("children")
                .iter()
                .map(|node| node.metadata().sort.unwrap())
                .collect::<Vec<_>>();
            prop_assert!(sorts.windows(2).all(|pair| pair[0] < pair[1]));
        }
    }
}
