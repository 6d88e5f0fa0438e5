#![forbid(unsafe_code)]

use crate::FieldType;

#[derive(Clone, Debug, PartialEq, thiserror::Error)]
pub enum SchemaError {
    #[error("invalid identifier {0:?}")]
    InvalidName(String),
    #[error("duplicate field {0:?}")]
    DuplicateField(String),
    #[error("arity mismatch (expected={expected}, actual={actual})")]
    ArityMismatch { expected: usize, actual: usize },
    #[error("type mismatch at {field} (expected={expected}, actual={actual})")]
    TypeMismatch {
        field: String,
        expected: FieldType,
        actual: &'static str,
    },
    #[error("unknown kind {0:?}")]
    UnknownKind(String),
    #[error("confidence must be within [0, 1], got {0}")]
    InvalidConfidence(f64),
}

#[derive(Debug, thiserror::Error)]
pub enum SettingsError {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
}
