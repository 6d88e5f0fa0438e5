#![forbid(unsafe_code)]

//! Assertion pool: a fact base that analysis modules extend and observe.

mod error;
mod module;
mod pool;

pub use error::PoolError;
pub use module::{AnalysisModule, ModuleHost};
pub use pool::{AssertionListener, AssertionPool, Emitter};
