//! Rulegrid: nested filter rules over a typed record schema.
//!
//! A [`Query`] is a chain of rule groups built through pure structural operations. The same
//! tree can be rendered as a SQL-flavored predicate string by the [`SqlCompiler`], or applied
//! directly to in-memory [`Record`]s by the [`Evaluator`]. Both passes dispatch through the
//! shared [`Operator`] catalog and the [`codec`] so they interpret a stored value identically.
//!
//! # Architecture
//! - Schema registry (fields and their data types)
//! - Operator catalog (legal operators per data type)
//! - Rule tree (groups, rules, structural operations)
//! - Value codec (defaults, parsing, rendering, coercion)
//! - Text compiler and evaluator
//! - Dataset filter driver and session configuration

mod types;
mod schema;
mod record;
mod operators;
mod query;
pub mod codec;
mod compiler;
mod evaluator;
mod dataset;
mod config;

pub use types::*;
pub use schema::*;
pub use record::*;
pub use operators::*;
pub use query::*;
pub use codec::{InvalidMarker, Rendered};
pub use compiler::*;
pub use evaluator::*;
pub use dataset::*;
pub use config::*;

use thiserror::Error;

/// Unified error type for Rulegrid operations.
///
/// Rule semantics never fail: bad values, unknown fields and incomplete rules degrade
/// silently. Errors only come from structural edits, dataset edits and configuration.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error("field not found: {0}")]
    FieldNotFound(String),
    #[error("field already exists: {0}")]
    DuplicateField(String),
    #[error("field name is empty")]
    EmptyFieldName,
    #[error("group index {index} out of range ({len} groups)")]
    GroupIndexOutOfRange { index: usize, len: usize },
    #[error("combinator index {index} out of range ({len} combinators)")]
    CombinatorIndexOutOfRange { index: usize, len: usize },
    #[error("{combinators} combinators cannot join {groups} groups")]
    ChainLength { groups: usize, combinators: usize },
    #[error("no rule or group at path {0:?}")]
    RulePathInvalid(Vec<usize>),
    #[error("row index {index} out of range ({len} rows)")]
    RowIndexOutOfRange { index: usize, len: usize },
    #[error("array index {index} out of range ({len} items)")]
    ArrayIndexOutOfRange { index: usize, len: usize },
    #[error("type mismatch for field '{field}': expected {expected}, got {actual}")]
    TypeMismatch {
        field: String,
        expected: String,
        actual: &'static str,
    },
    #[error("field '{0}' is not an array")]
    NotAnArray(String),
    #[error("invalid configuration: {0}")]
    InvalidConfig(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, QueryError>;
