#![forbid(unsafe_code)]

use crate::SchemaError;

/// Id of the implicit synthetic root. It is never materialized as a row.
pub const ROOT_ID: i64 = 1;

/// First id handed out to a real node.
pub const FIRST_NODE_ID: i64 = 2;

const MAX_IDENTIFIER_LEN: usize = 48;

/// The `(id, parent, sort)` identity tuple shared by branches and leaves.
///
/// `id` and `sort` stay `None` until the store assigns them; an importer may
/// set either up front and the store will honor it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct NodeMeta {
    pub id: Option<i64>,
    pub parent: i64,
    pub sort: Option<i64>,
}

impl NodeMeta {
    pub fn under(parent: i64) -> Self {
        Self {
            id: None,
            parent,
            sort: None,
        }
    }

    pub fn top_level() -> Self {
        Self::under(ROOT_ID)
    }

    pub fn assigned(id: i64, parent: i64, sort: i64) -> Self {
        Self {
            id: Some(id),
            parent,
            sort: Some(sort),
        }
    }

    pub fn with_id(mut self, id: i64) -> Self {
        self.id = Some(id);
        self
    }

    pub fn with_sort(mut self, sort: i64) -> Self {
        self.sort = Some(sort);
        self
    }

    pub fn is_top_level(&self) -> bool {
        self.parent == ROOT_ID
    }

    pub fn is_assigned(&self) -> bool {
        self.id.is_some() && self.sort.is_some()
    }
}

impl Default for NodeMeta {
    fn default() -> Self {
        Self::top_level()
    }
}

/// Validates a store or field name so it can be spliced into DDL.
pub fn validate_identifier(value: &str) -> Result<(), SchemaError> {
    let invalid = || SchemaError::InvalidName(value.to_string());
    if value.is_empty() || value.len() > MAX_IDENTIFIER_LEN {
        return Err(invalid());
    }
    let mut chars = value.chars();
    let Some(first) = chars.next() else {
        return Err(invalid());
    };
    if !first.is_ascii_lowercase() {
        return Err(invalid());
    }
    if chars.any(|ch| !(ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_')) {
        return Err(invalid());
    }
    Ok(())
}
