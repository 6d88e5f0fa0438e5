#![forbid(unsafe_code)]

use crate::{ContentCache, NodeHooks, NodeOf, SqliteTree, StoreError, TreeBackend};
use arbor_core::{FIRST_NODE_ID, ROOT_ID, Role, Settings, TreeSchema};
use std::collections::{BTreeMap, BTreeSet};
use std::marker::PhantomData;
use std::ops::Range;
use std::path::Path;
use std::time::Duration;

/// Counts snapshot returned by [`TreeStore::summary`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StoreSummary {
    pub store: String,
    pub branches: usize,
    pub leaves: usize,
    pub next_id: i64,
    pub cache_enabled: bool,
    pub cached_payloads: usize,
}

impl StoreSummary {
    pub fn nodes(&self) -> usize {
        self.branches + self.leaves
    }
}

/// Hierarchical storage engine over a [`TreeBackend`].
///
/// The engine assigns ids, parents and sort keys, validates tree shape and runs
/// node hooks; the backend only persists rows. One writer at a time: callers
/// serialize access themselves.
pub struct TreeStore<S: TreeSchema, B: TreeBackend<S> = SqliteTree<S>> {
    backend: B,
    next_id: i64,
    cache: Option<ContentCache>,
    hooks: Vec<Box<dyn NodeHooks<S>>>,
    _schema: PhantomData<S>,
}

impl<S: TreeSchema> TreeStore<S> {
    pub fn open(path: impl AsRef<Path>, schema: S) -> Result<Self, StoreError> {
        Self::with_backend(SqliteTree::open(path, schema)?)
    }

    pub fn open_in_memory(schema: S) -> Result<Self, StoreError> {
        Self::with_backend(SqliteTree::open_in_memory(schema)?)
    }

    /// Opens the store under `settings.data_dir`. With `content_cache` off the
    /// per-store cache directory is purged, since caching is disabled for it.
    pub fn open_with_settings(settings: &Settings, schema: S) -> Result<Self, StoreError> {
        let backend = SqliteTree::open(settings.database_path(), schema)?;
        backend.set_busy_timeout(Duration::from_millis(settings.busy_timeout_ms))?;
        let mut store = Self::with_backend(backend)?;
        if settings.content_cache {
            store.enable_content_cache(settings.cache_root())?;
        } else {
            store.disable_content_cache(settings.cache_root())?;
        }
        Ok(store)
    }
}

impl<S: TreeSchema, B: TreeBackend<S>> TreeStore<S, B> {
    pub fn with_backend(backend: B) -> Result<Self, StoreError> {
        let next_id = backend.next_id()?.max(FIRST_NODE_ID);
        Ok(Self {
            backend,
            next_id,
            cache: None,
            hooks: Vec::new(),
            _schema: PhantomData,
        })
    }

    pub fn schema(&self) -> &S {
        self.backend.schema()
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn add_hook(&mut self, hook: Box<dyn NodeHooks<S>>) {
        self.hooks.push(hook);
    }

    pub fn enable_content_cache(&mut self, root: impl AsRef<Path>) -> Result<(), StoreError> {
        let cache = ContentCache::enable(root, self.schema().name())?;
        self.cache = Some(cache);
        Ok(())
    }

    /// Turns the cache off and deletes every cached payload of this store
    /// under `root`, including payloads left behind by earlier sessions.
    pub fn disable_content_cache(&mut self, root: impl AsRef<Path>) -> Result<(), StoreError> {
        if let Some(cache) = self.cache.take() {
            cache.purge()?;
        }
        ContentCache::disable(root, self.schema().name())
    }

    pub fn content_cache(&self) -> Option<&ContentCache> {
        self.cache.as_ref()
    }

    /// Reserves `count` consecutive ids for an importer that wires parent
    /// pointers itself before calling [`TreeStore::insert_bulk`].
    pub fn allocate_ids(&mut self, count: usize) -> Result<Range<i64>, StoreError> {
        let count = i64::try_from(count).map_err(|_| StoreError::InvalidInput("numeric overflow"))?;
        let start = self.next_id;
        let end = start
            .checked_add(count)
            .ok_or(StoreError::InvalidInput("numeric overflow"))?;
        self.backend.reserve_ids(end)?;
        self.next_id = end;
        Ok(start..end)
    }

    /// Inserts branches and leaves in one atomic unit.
    ///
    /// Preset ids and sort keys are honored, missing ones are assigned. Nodes may
    /// come in any order as long as every parent is either the root, already
    /// stored, or part of the batch. The nodes come back with their metadata
    /// filled in, every parent ahead of its children.
    pub fn insert_bulk(&mut self, nodes: Vec<NodeOf<S>>) -> Result<Vec<NodeOf<S>>, StoreError> {
        if nodes.is_empty() {
            return Ok(nodes);
        }
        let mut nodes = nodes;

        let ids = self.assign_ids(&mut nodes)?;
        let order = self.resolve_parents(&nodes, &ids)?;

        let mut slots = nodes.into_iter().map(Some).collect::<Vec<_>>();
        let mut ordered = Vec::with_capacity(slots.len());
        for index in order {
            if let Some(node) = slots[index].take() {
                ordered.push(node);
            }
        }
        self.assign_sorts(&mut ordered)?;
        let next_id = match ordered.iter().filter_map(|node| node.id()).max() {
            Some(max_id) => max_id
                .checked_add(1)
                .ok_or(StoreError::InvalidInput("numeric overflow"))?
                .max(self.next_id),
            None => self.next_id,
        };

        let cache = &mut self.cache;
        let hooks = &mut self.hooks;
        let result = self
            .backend
            .persist(&ordered, next_id, &mut |node: &NodeOf<S>| {
                run_insert_hooks(cache, hooks, node)
            });

        if let Err(err) = result {
            self.discard_cached(&ordered);
            return Err(err);
        }

        self.next_id = next_id;
        tracing::debug!(
            store = self.schema().name(),
            nodes = ordered.len(),
            next_id = self.next_id,
            "bulk insert committed"
        );
        Ok(ordered)
    }

    pub fn get(&mut self, id: i64) -> Result<NodeOf<S>, StoreError> {
        let mut node = self.backend.fetch(id)?.ok_or(StoreError::UnknownId(id))?;
        self.run_retrieve_hooks(&mut node)?;
        Ok(node)
    }

    pub fn contains(&self, id: i64) -> Result<bool, StoreError> {
        if id == ROOT_ID {
            return Ok(true);
        }
        Ok(!self.backend.roles(&BTreeSet::from([id]))?.is_empty())
    }

    /// Children of `parent` in ascending sort order. A leaf has none.
    pub fn get_children(&mut self, parent: i64) -> Result<Vec<NodeOf<S>>, StoreError> {
        if !self.contains(parent)? {
            return Err(StoreError::UnknownId(parent));
        }
        let mut children = self.backend.fetch_children(parent)?;
        for child in &mut children {
            self.run_retrieve_hooks(child)?;
        }
        Ok(children)
    }

    /// Parent chain of `id`, nearest first, excluding the synthetic root.
    pub fn ancestors(&mut self, id: i64) -> Result<Vec<NodeOf<S>>, StoreError> {
        let mut out = Vec::new();
        let mut seen = BTreeSet::from([id]);
        let mut current = self.get(id)?.metadata().parent;
        while current != ROOT_ID {
            if !seen.insert(current) {
                return Err(StoreError::ParentCycle { id: current });
            }
            let node = self.get(current)?;
            current = node.metadata().parent;
            out.push(node);
        }
        Ok(out)
    }

    /// Every node below `id` in pre-order, siblings by sort key.
    pub fn descendants(&mut self, id: i64) -> Result<Vec<NodeOf<S>>, StoreError> {
        let mut out = Vec::new();
        let mut stack = self.get_children(id)?;
        stack.reverse();
        while let Some(node) = stack.pop() {
            if node.role() == Role::Branch {
                if let Some(child_id) = node.id() {
                    let mut children = self.get_children(child_id)?;
                    children.reverse();
                    stack.extend(children);
                }
            }
            out.push(node);
        }
        Ok(out)
    }

    /// Removes `id` and its whole subtree, including cached payloads.
    /// Returns the number of removed rows.
    pub fn remove(&mut self, id: i64) -> Result<usize, StoreError> {
        if id == ROOT_ID {
            return Err(StoreError::InvalidInput("the synthetic root cannot be removed"));
        }
        let subtree = self.backend.subtree(id)?;
        if subtree.is_empty() {
            return Err(StoreError::UnknownId(id));
        }

        let cache = &mut self.cache;
        let hooks = &mut self.hooks;
        let removed = self
            .backend
            .delete(&subtree, &mut |id: i64, role: Role| {
                run_remove_hooks(cache, hooks, id, role)
            })?;

        tracing::debug!(store = self.schema().name(), root = id, removed, "subtree removed");
        Ok(removed)
    }

    pub fn summary(&self) -> Result<StoreSummary, StoreError> {
        let cached_payloads = match &self.cache {
            Some(cache) => cache.len()?,
            None => 0,
        };
        Ok(StoreSummary {
            store: self.schema().name().to_string(),
            branches: self.backend.count(Role::Branch)?,
            leaves: self.backend.count(Role::Leaf)?,
            next_id: self.next_id,
            cache_enabled: self.cache.is_some(),
            cached_payloads,
        })
    }

    fn assign_ids(&self, nodes: &mut [NodeOf<S>]) -> Result<BTreeMap<i64, usize>, StoreError> {
        let mut preset = BTreeSet::new();
        for node in nodes.iter() {
            if let Some(id) = node.id() {
                if id < FIRST_NODE_ID {
                    return Err(StoreError::InvalidInput("node ids start at 2"));
                }
                if !preset.insert(id) {
                    return Err(StoreError::DuplicateId(id));
                }
            }
        }
        if let Some(taken) = self.backend.roles(&preset)?.keys().next() {
            return Err(StoreError::DuplicateId(*taken));
        }

        let mut next = self.next_id;
        let mut ids = BTreeMap::new();
        for (index, node) in nodes.iter_mut().enumerate() {
            let mut meta = node.metadata();
            let id = match meta.id {
                Some(id) => id,
                None => {
                    while preset.contains(&next) {
                        next = bump(next)?;
                    }
                    let id = next;
                    next = bump(next)?;
                    meta.id = Some(id);
                    node.set_metadata(meta);
                    id
                }
            };
            if meta.parent == id {
                return Err(StoreError::ParentCycle { id });
            }
            ids.insert(id, index);
        }
        Ok(ids)
    }

    /// Validates parents and returns batch indexes with parents first.
    fn resolve_parents(
        &self,
        nodes: &[NodeOf<S>],
        ids: &BTreeMap<i64, usize>,
    ) -> Result<Vec<usize>, StoreError> {
        let outside = nodes
            .iter()
            .map(|node| node.metadata().parent)
            .filter(|parent| *parent != ROOT_ID && !ids.contains_key(parent))
            .collect::<BTreeSet<_>>();
        let stored = self.backend.roles(&outside)?;

        let mut batch_parent = vec![None; nodes.len()];
        for (index, node) in nodes.iter().enumerate() {
            let meta = node.metadata();
            let id = meta.id.unwrap_or_default();
            if meta.parent == ROOT_ID {
                continue;
            }
            let parent_role = match ids.get(&meta.parent) {
                Some(parent_index) => {
                    batch_parent[index] = Some(*parent_index);
                    nodes[*parent_index].role()
                }
                None => *stored.get(&meta.parent).ok_or(StoreError::UnresolvedParent {
                    id,
                    parent: meta.parent,
                })?,
            };
            if parent_role == Role::Leaf {
                return Err(StoreError::LeafParent {
                    id,
                    parent: meta.parent,
                });
            }
        }

        topological_order(&batch_parent).map_err(|index| StoreError::ParentCycle {
            id: nodes[index].id().unwrap_or_default(),
        })
    }

    fn assign_sorts(&self, ordered: &mut [NodeOf<S>]) -> Result<(), StoreError> {
        let mut cursors: BTreeMap<i64, i64> = BTreeMap::new();
        for node in ordered.iter_mut() {
            let mut meta = node.metadata();
            let next = match cursors.get(&meta.parent) {
                Some(next) => *next,
                None => self.backend.next_sort(meta.parent)?,
            };
            let sort = meta.sort.unwrap_or(next);
            if sort < 0 {
                return Err(StoreError::InvalidInput("sort keys must be non-negative"));
            }
            cursors.insert(meta.parent, next.max(bump(sort)?));
            meta.sort = Some(sort);
            node.set_metadata(meta);
        }
        Ok(())
    }

    fn run_retrieve_hooks(&mut self, node: &mut NodeOf<S>) -> Result<(), StoreError> {
        if let Some(cache) = self.cache.as_mut() {
            NodeHooks::<S>::on_retrieve(cache, node)?;
        }
        for hook in &mut self.hooks {
            hook.on_retrieve(node)?;
        }
        Ok(())
    }

    fn discard_cached(&self, nodes: &[NodeOf<S>]) {
        let Some(cache) = &self.cache else {
            return;
        };
        for node in nodes.iter().filter(|node| node.role() == Role::Leaf) {
            let Some(id) = node.id() else {
                continue;
            };
            if let Err(err) = cache.delete(id) {
                tracing::warn!(node_id = id, error = %err, "failed to discard payload of aborted insert");
            }
        }
    }
}

fn bump(value: i64) -> Result<i64, StoreError> {
    value
        .checked_add(1)
        .ok_or(StoreError::InvalidInput("numeric overflow"))
}

fn run_insert_hooks<S: TreeSchema>(
    cache: &mut Option<ContentCache>,
    hooks: &mut [Box<dyn NodeHooks<S>>],
    node: &NodeOf<S>,
) -> Result<(), StoreError> {
    if let Some(cache) = cache.as_mut() {
        NodeHooks::<S>::on_insert(cache, node)?;
    }
    for hook in hooks.iter_mut() {
        hook.on_insert(node)?;
    }
    Ok(())
}

fn run_remove_hooks<S: TreeSchema>(
    cache: &mut Option<ContentCache>,
    hooks: &mut [Box<dyn NodeHooks<S>>],
    id: i64,
    role: Role,
) -> Result<(), StoreError> {
    if let Some(cache) = cache.as_mut() {
        NodeHooks::<S>::on_remove(cache, id, role)?;
    }
    for hook in hooks.iter_mut() {
        hook.on_remove(id, role)?;
    }
    Ok(())
}

/// Orders indexes so every in-batch parent precedes its children.
/// Fails with the index of a node on a cycle.
fn topological_order(batch_parent: &[Option<usize>]) -> Result<Vec<usize>, usize> {
    const UNVISITED: u8 = 0;
    const VISITING: u8 = 1;
    const DONE: u8 = 2;

    let mut state = vec![UNVISITED; batch_parent.len()];
    let mut order = Vec::with_capacity(batch_parent.len());
    let mut chain = Vec::new();

    for start in 0..batch_parent.len() {
        let mut current = Some(start);
        while let Some(index) = current {
            match state[index] {
                DONE => break,
                VISITING => return Err(index),
                _ => {
                    state[index] = VISITING;
                    chain.push(index);
                    current = batch_parent[index];
                }
            }
        }
        while let Some(index) = chain.pop() {
            state[index] = DONE;
            order.push(index);
        }
    }
    Ok(order)
}

#[cfg(test)]
mod tests;
