#![forbid(unsafe_code)]

use crate::{NodeHooks, NodeOf, StoreError};
use arbor_core::{NodeCodec, Role, TreeNode, TreeSchema, validate_identifier};
use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

const PAYLOAD_EXTENSION: &str = "txt";

/// Filesystem side channel for leaf payloads, one file per node id.
///
/// The cache is an optimization, never a source of truth: a row without a
/// cache file simply has no payload.
#[derive(Debug)]
pub struct ContentCache {
    store_id: String,
    dir: PathBuf,
}

impl ContentCache {
    /// Creates `<root>/<store_id>` and returns a handle to it.
    pub fn enable(root: impl AsRef<Path>, store_id: &str) -> Result<Self, StoreError> {
        validate_identifier(store_id)?;
        let dir = root.as_ref().join(store_id);
        fs::create_dir_all(&dir)?;
        tracing::info!(store = store_id, dir = %dir.display(), "content cache enabled");
        Ok(Self {
            store_id: store_id.to_string(),
            dir,
        })
    }

    /// Deletes the whole per-store cache directory. Cached payloads are gone
    /// for good afterwards.
    pub fn disable(root: impl AsRef<Path>, store_id: &str) -> Result<(), StoreError> {
        validate_identifier(store_id)?;
        let dir = root.as_ref().join(store_id);
        match fs::remove_dir_all(&dir) {
            Ok(()) => {
                tracing::warn!(store = store_id, dir = %dir.display(), "content cache purged");
                Ok(())
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(()),
            Err(err) => Err(err.into()),
        }
    }

    pub fn purge(self) -> Result<(), StoreError> {
        let root = self
            .dir
            .parent()
            .ok_or(StoreError::InvalidInput("cache directory has no parent"))?;
        Self::disable(root, &self.store_id)
    }

    pub fn store_id(&self) -> &str {
        &self.store_id
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn put(&self, node_id: i64, text: &str) -> Result<(), StoreError> {
        let path = self.path_for(node_id);
        let tmp = path.with_extension(format!("{PAYLOAD_EXTENSION}.tmp"));
        {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(text.as_bytes())?;
        }
        fs::rename(&tmp, &path)?;
        tracing::debug!(store = %self.store_id, node_id, bytes = text.len(), "payload cached");
        Ok(())
    }

    pub fn get(&self, node_id: i64) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(self.path_for(node_id)) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(err) => Err(err.into()),
        }
    }

    /// Removes the payload file; an absent file is not an error.
    pub fn delete(&self, node_id: i64) -> Result<bool, StoreError> {
        match fs::remove_file(self.path_for(node_id)) {
            Ok(()) => {
                tracing::debug!(store = %self.store_id, node_id, "payload evicted");
                Ok(true)
            }
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(false),
            Err(err) => Err(err.into()),
        }
    }

    pub fn len(&self) -> Result<usize, StoreError> {
        let mut count = 0usize;
        for entry in fs::read_dir(&self.dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == PAYLOAD_EXTENSION) {
                count += 1;
            }
        }
        Ok(count)
    }

    pub fn is_empty(&self) -> Result<bool, StoreError> {
        Ok(self.len()? == 0)
    }

    fn path_for(&self, node_id: i64) -> PathBuf {
        self.dir.join(format!("{node_id}.{PAYLOAD_EXTENSION}"))
    }
}

impl<S: TreeSchema> NodeHooks<S> for ContentCache {
    fn on_insert(&mut self, node: &NodeOf<S>) -> Result<(), StoreError> {
        let TreeNode::Leaf(leaf) = node else {
            return Ok(());
        };
        let id = leaf
            .metadata()
            .id
            .ok_or(StoreError::InvalidInput("leaf reached the cache without an id"))?;
        match leaf.extract_payload() {
            Some(payload) => self.put(id, &payload),
            // A reused id must not resurrect an older payload.
            None => self.delete(id).map(|_| ()),
        }
    }

    fn on_retrieve(&mut self, node: &mut NodeOf<S>) -> Result<(), StoreError> {
        let TreeNode::Leaf(leaf) = node else {
            return Ok(());
        };
        let Some(id) = leaf.metadata().id else {
            return Ok(());
        };
        match self.get(id) {
            Ok(Some(payload)) => leaf.inject_payload(payload),
            Ok(None) => {}
            Err(err) => {
                tracing::warn!(store = %self.store_id, node_id = id, error = %err, "unreadable payload treated as absent");
            }
        }
        Ok(())
    }

    fn on_remove(&mut self, id: i64, _role: Role) -> Result<(), StoreError> {
        self.delete(id).map(|_| ())
    }
}
