#![forbid(unsafe_code)]

use crate::StoreError;
use arbor_core::{Role, TreeNode, TreeSchema};

pub type NodeOf<S> = TreeNode<<S as TreeSchema>::Branch, <S as TreeSchema>::Leaf>;

/// Per-node callbacks the engine runs around its writes and reads.
///
/// `on_insert` and `on_remove` run inside the backend's write unit, so an
/// error aborts the whole bulk operation.
pub trait NodeHooks<S: TreeSchema> {
    fn on_insert(&mut self, _node: &NodeOf<S>) -> Result<(), StoreError> {
        Ok(())
    }

    fn on_retrieve(&mut self, _node: &mut NodeOf<S>) -> Result<(), StoreError> {
        Ok(())
    }

    fn on_remove(&mut self, _id: i64, _role: Role) -> Result<(), StoreError> {
        Ok(())
    }
}
