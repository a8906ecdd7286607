//! Error types for asset map operations.

use std::io;
use thiserror::Error;

/// Errors that can occur in asset map operations
#[derive(Debug, Error)]
pub enum MapError {
    /// Malformed or inside-out boundary, rejected before any mutation
    #[error("invalid boundary: {0}")]
    InvalidBoundary(String),

    /// The boundary does not intersect the indexed world volume
    #[error("boundary lies outside the indexed world volume")]
    OutOfBounds,

    /// Removal reached the node that should hold the asset, but no
    /// matching entry was there
    #[error("asset '{0}' not found at its expected node")]
    AssetNotFound(String),

    /// The store holds a different snapshot version than the caller
    /// last observed
    #[error("snapshot version conflict (expected: {expected}, store has: {actual})")]
    VersionConflict { expected: String, actual: String },

    /// A persisted snapshot that cannot be reassembled into a tree
    #[error("corrupt snapshot: {0}")]
    CorruptSnapshot(String),

    /// Load/save failure from the persistence gateway. An in-memory
    /// mutation already applied is retained so the caller may retry.
    #[error("persistence error: {0}")]
    Persistence(String),

    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for asset map operations
pub type MapResult<T> = Result<T, MapError>;
