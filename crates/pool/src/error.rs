#![forbid(unsafe_code)]

use arbor_core::SchemaError;
use arbor_storage::StoreError;

#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("storage: {0}")]
    Storage(#[from] StoreError),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("schema violation: {0}")]
    Schema(#[from] SchemaError),
    #[error("assertion cascade exceeded depth {depth}")]
    CascadeLimit { depth: usize },
    #[error("listener {name} failed: {message}")]
    Listener { name: String, message: String },
    #[error("listeners cannot be added while bulk mode is active")]
    BulkModeActive,
}

impl PoolError {
    pub fn listener(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Listener {
            name: name.into(),
            message: message.into(),
        }
    }
}
