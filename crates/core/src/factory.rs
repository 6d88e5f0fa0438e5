#![forbid(unsafe_code)]

use crate::{NodeMeta, RowReader, SchemaError, Value};
use std::collections::BTreeMap;
use std::fmt;

type Constructor<T> = Box<dyn Fn(NodeMeta, &mut RowReader) -> Result<T, SchemaError> + Send + Sync>;

/// Kind-keyed constructor table used to materialize rows.
pub struct NodeFactory<T> {
    constructors: BTreeMap<String, Constructor<T>>,
}

impl<T> NodeFactory<T> {
    pub fn new() -> Self {
        Self {
            constructors: BTreeMap::new(),
        }
    }

    pub fn register<F>(mut self, kind: impl Into<String>, constructor: F) -> Self
    where
        F: Fn(NodeMeta, &mut RowReader) -> Result<T, SchemaError> + Send + Sync + 'static,
    {
        self.constructors.insert(kind.into(), Box::new(constructor));
        self
    }

    pub fn contains(&self, kind: &str) -> bool {
        self.constructors.contains_key(kind)
    }

    pub fn kinds(&self) -> impl Iterator<Item = &str> {
        self.constructors.keys().map(String::as_str)
    }

    pub fn build(&self, kind: &str, meta: NodeMeta, values: Vec<Value>) -> Result<T, SchemaError> {
        let constructor = self
            .constructors
            .get(kind)
            .ok_or_else(|| SchemaError::UnknownKind(kind.to_string()))?;
        let mut row = RowReader::new(values);
        let node = constructor(meta, &mut row)?;
        row.finish()?;
        Ok(node)
    }
}

impl<T> Default for NodeFactory<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for NodeFactory<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NodeFactory")
            .field("kinds", &self.constructors.keys().collect::<Vec<_>>())
            .finish()
    }
}
