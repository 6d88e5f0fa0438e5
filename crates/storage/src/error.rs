#![forbid(unsafe_code)]

use arbor_core::SchemaError;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("sqlite: {0}")]
    Sql(#[from] rusqlite::Error),
    #[error("schema violation: {0}")]
    Schema(#[from] SchemaError),
    #[error("schema violation: node {id} references unresolved parent {parent}")]
    UnresolvedParent { id: i64, parent: i64 },
    #[error("schema violation: node {id} is placed under leaf {parent}")]
    LeafParent { id: i64, parent: i64 },
    #[error("schema violation: parent cycle through node {id}")]
    ParentCycle { id: i64 },
    #[error("duplicate node id {0}")]
    DuplicateId(i64),
    #[error("unknown id {0}")]
    UnknownId(i64),
    #[error("corrupt counter {name:?}")]
    CorruptCounter { name: String },
    #[error("invalid input: {0}")]
    InvalidInput(&'static str),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::UnknownId(_))
    }

    pub fn is_schema_violation(&self) -> bool {
        matches!(
            self,
            Self::Schema(_)
                | Self::UnresolvedParent { .. }
                | Self::LeafParent { .. }
                | Self::ParentCycle { .. }
        )
    }
}
