//! Metatree is a hierarchical, path-addressable parameter store.
//!
//! Parameters live in a tree of named nodes addressed by `/`-delimited paths.
//! Leaves hold either a stored scalar or a bound getter/setter pair, so reads
//! always reflect live state and writes route through per-field validation.
//! A distinguished free-form `metadata` subtree accepts arbitrary nested
//! key/value data, and a `write` action leaf merges that subtree into a
//! structured data file on disk without disturbing unrelated content already
//! present in the file.
//!
//! ## Core Components
//! - [`engine`]: The parameter tree, the concrete store, and the persistence writer.
//! - [`adapter`]: The request boundary mapping path+payload calls to status-coded responses.
//! - [`sdk`]: Remote (TCP) client.
//! - [`server`]: TCP daemon implementation.

pub mod adapter;
pub mod engine;
pub mod sdk;
pub mod server;

use serde_json;
use thiserror::Error;

/// Errors returned by the parameter store.
#[derive(Error, Debug)]
pub enum Error {
    /// The path does not resolve to any node in the tree.
    #[error("invalid path: {0}")]
    PathNotFound(String),
    /// A set was attempted on a leaf that has no setter.
    #[error("parameter {0} is read-only")]
    ReadOnly(String),
    /// The value's shape or type is incompatible with the target node.
    #[error("type mismatch at {0}: {1}")]
    TypeMismatch(String, String),
    /// An internal error occurred.
    #[error("internal error: {0}")]
    Internal(String),
    /// An I/O error occurred during persistence or network communication.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Error during JSON serialization or deserialization.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A specialized Result type for parameter store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Uniform path-addressable read/write access over a parameter tree.
///
/// This is the seam between the store and the request boundary: the adapter
/// and server operate against this trait rather than a concrete store.
pub trait ParameterAccess: Send + Sync {
    /// Resolves `path` and returns the value or rendered subtree.
    ///
    /// When `with_metadata` is true, leaves are rendered with descriptive
    /// annotations (current value, writeability, type name).
    fn get(&self, path: &str, with_metadata: bool) -> Result<serde_json::Value>;

    /// Resolves `path` and applies `value` to the node found there.
    fn set(&self, path: &str, value: serde_json::Value) -> Result<()>;
}
