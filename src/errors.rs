//! Error Types
//!
//! This module defines the error types used throughout the engine core.
//!
//! # Overview
//!
//! The main error type [`RelicError`] covers all failure modes including:
//! - Resource group lifecycle errors (duplicate or unknown groups)
//! - Archive lookup failures
//! - Malformed mesh streams and unsupported format directions
//!
//! # Usage
//!
//! All public APIs return [`Result<T>`] which is an alias for
//! `std::result::Result<T, RelicError>`.

use thiserror::Error;

/// The main error type for the Relic engine core.
///
/// Each variant corresponds to one condition kind; the payload is a
/// human-readable message naming the originating operation.
#[derive(Error, Debug)]
pub enum RelicError {
    // ========================================================================
    // Naming & Lookup Errors
    // ========================================================================
    /// A named item already exists where a fresh name was required.
    #[error("Duplicate item: {0}")]
    DuplicateItem(String),

    /// A named group, resource manager, resource, or required chunk is
    /// missing.
    #[error("Item not found: {0}")]
    ItemNotFound(String),

    /// An archive lookup was exhausted without a match.
    #[error("File not found: {0}")]
    FileNotFound(String),

    // ========================================================================
    // Input & Stream Errors
    // ========================================================================
    /// Malformed input, e.g. a bad chunk-size header or a mesh exported
    /// without bounds.
    #[error("Invalid parameters: {0}")]
    InvalidParams(String),

    /// A stream-consistency violation, e.g. a vertex-buffer size that does
    /// not match its declared stride.
    #[error("Internal error: {0}")]
    InternalError(String),

    /// A format direction that is not supported.
    #[error("Unsupported: {0}")]
    Unsupported(String),

    // ========================================================================
    // I/O Errors
    // ========================================================================
    /// File or stream I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Zip container error.
    #[error("Zip archive error: {0}")]
    Zip(String),
}

impl From<zip::result::ZipError> for RelicError {
    fn from(err: zip::result::ZipError) -> Self {
        RelicError::Zip(err.to_string())
    }
}

/// Alias for `Result<T, RelicError>`.
pub type Result<T> = std::result::Result<T, RelicError>;

/// Funnels a raised condition through the logging sink before propagating.
///
/// Every error surfaced by the group manager and the serializer goes through
/// here, so failures are recorded even if the caller discards the message.
pub(crate) fn fail<T>(err: RelicError) -> Result<T> {
    log::error!("{err}");
    Err(err)
}
