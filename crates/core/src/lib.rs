#![forbid(unsafe_code)]

//! Data model shared by the tree stores and the assertion pool.
//!
//! Nothing in this crate touches disk except [`Settings::load`].

mod error;
mod factory;
mod facts;
mod ids;
mod node;
mod row;
mod schema;
mod settings;

pub use error::{SchemaError, SettingsError};
pub use factory::NodeFactory;
pub use facts::{Assertion, Intelligence, Phase, Rating, resolve};
pub use ids::{FIRST_NODE_ID, NodeMeta, ROOT_ID, validate_identifier};
pub use node::{NodeCodec, Role, TreeNode, TreeSchema};
pub use row::RowReader;
pub use schema::{FieldDef, FieldType, SchemaDescriptor, Value};
pub use settings::{
    CACHE_DIR_ENV, CONTENT_CACHE_ENV, COUNTER_DIR_ENV, DATA_DIR_ENV, MAX_CASCADE_DEPTH_ENV,
    Settings,
};

#[cfg(test)]
mod tests;
