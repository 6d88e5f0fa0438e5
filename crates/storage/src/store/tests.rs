use super::*;
use crate::file_tree::{File, FileNode, FileTree, Folder};

fn store() -> TreeStore<FileTree> {
    TreeStore::open_in_memory(FileTree::new("files").unwrap()).unwrap()
}

#[test]
fn topological_order_puts_parents_first() {
    // 0 <- 1 <- 2, and 3 independent; input lists the deepest node first.
    let parents = [Some(1), Some(2), None, None];
    let order = topological_order(&parents).unwrap();
    let position = |index: usize| order.iter().position(|i| *i == index).unwrap();
    assert_eq!(order.len(), 4);
    assert!(position(2) < position(1));
    assert!(position(1) < position(0));
}

#[test]
fn topological_order_reports_cycles() {
    let parents = [Some(1), Some(0)];
    assert!(topological_order(&parents).is_err());
}

#[test]
fn auto_ids_skip_preset_ids_in_the_same_batch() {
    let mut store = store();
    let mut preset = Folder::new("preset", ROOT_ID);
    preset.meta.id = Some(FIRST_NODE_ID);
    let inserted = store
        .insert_bulk(vec![
            FileNode::Branch(Folder::new("auto", ROOT_ID)),
            FileNode::Branch(preset),
        ])
        .unwrap();
    let mut ids = inserted.iter().filter_map(|node| node.id()).collect::<Vec<_>>();
    ids.sort();
    assert_eq!(ids, vec![2, 3]);
    assert_eq!(store.summary().unwrap().next_id, 4);
}

#[test]
fn allocated_ids_are_not_handed_out_again() {
    let mut store = store();
    let reserved = store.allocate_ids(3).unwrap();
    assert_eq!(reserved, 2..5);

    let inserted = store
        .insert_bulk(vec![FileNode::Leaf(File::new("a.txt", 1, ROOT_ID))])
        .unwrap();
    assert_eq!(inserted[0].id(), Some(5));
}

#[test]
fn explicit_sorts_push_the_cursor_forward() {
    let mut store = store();
    let mut pinned = File::new("pinned", 0, ROOT_ID);
    pinned.meta.sort = Some(7);
    let inserted = store
        .insert_bulk(vec![
            FileNode::Leaf(pinned),
            FileNode::Leaf(File::new("next", 0, ROOT_ID)),
        ])
        .unwrap();
    let sorts = inserted
        .iter()
        .map(|node| node.metadata().sort.unwrap())
        .collect::<Vec<_>>();
    assert_eq!(sorts, vec![7, 8]);
}
