#![forbid(unsafe_code)]

use crate::{NodeOf, StoreError};
use arbor_core::{Role, TreeSchema};
use std::collections::{BTreeMap, BTreeSet};

/// Physical storage behind a [`crate::TreeStore`].
///
/// The engine owns id/parent/sort bookkeeping and hands the backend nodes
/// whose metadata is fully assigned, parents before children.
pub trait TreeBackend<S: TreeSchema> {
    fn schema(&self) -> &S;

    /// Lowest id never handed out, persisted across reopen. Removed and
    /// reserved ids stay below it.
    fn next_id(&self) -> Result<i64, StoreError>;

    /// Raises the persisted high-water mark to `next_id`; never lowers it.
    fn reserve_ids(&mut self, next_id: i64) -> Result<(), StoreError>;

    /// Roles of those `ids` that exist.
    fn roles(&self, ids: &BTreeSet<i64>) -> Result<BTreeMap<i64, Role>, StoreError>;

    /// Sort key for the next child appended under `parent`.
    fn next_sort(&self, parent: i64) -> Result<i64, StoreError>;

    /// Writes all rows as one unit: either every row becomes visible or none.
    /// The high-water mark moves to `next_id` in the same unit.
    /// `after_row` runs once per node inside the unit; its error aborts it.
    fn persist(
        &mut self,
        nodes: &[NodeOf<S>],
        next_id: i64,
        after_row: &mut dyn FnMut(&NodeOf<S>) -> Result<(), StoreError>,
    ) -> Result<(), StoreError>;

    fn fetch(&self, id: i64) -> Result<Option<NodeOf<S>>, StoreError>;

    /// Children of `parent` in ascending sort order.
    fn fetch_children(&self, parent: i64) -> Result<Vec<NodeOf<S>>, StoreError>;

    /// `id` and all of its descendants, deepest first. Empty if `id` is unknown.
    fn subtree(&self, id: i64) -> Result<Vec<(i64, Role)>, StoreError>;

    /// Deletes rows as one unit; `before_commit` runs once per row inside it.
    fn delete(
        &mut self,
        rows: &[(i64, Role)],
        before_commit: &mut dyn FnMut(i64, Role) -> Result<(), StoreError>,
    ) -> Result<usize, StoreError>;

    fn count(&self, role: Role) -> Result<usize, StoreError>;
}
