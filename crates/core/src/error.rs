//! Error types for stowdb
//!
//! This module defines all error types used throughout the system.
//! We use `thiserror` for automatic `Display` and `Error` trait implementations.
//!
//! The variants group into the caller-visible kinds of the store:
//! - store unavailable: `Io`, `StoreUnavailable`, `Serialization`, `IncompleteEntry`
//! - encode failure: `Encode`
//! - decode failure: `Decode`
//! - not found: `NotFound`

use std::io;
use thiserror::Error;

/// Result type alias for stowdb operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error types for stowdb
#[derive(Debug, Error)]
pub enum Error {
    /// I/O error (file operations)
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The underlying byte store could not be opened, read or written
    #[error("Store unavailable: {0}")]
    StoreUnavailable(String),

    /// Log payload serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// The codec rejected a value
    #[error("Encode failed: {0}")]
    Encode(String),

    /// Stored bytes could not be decoded into the requested type
    #[error("Decode failed: {0}")]
    Decode(String),

    /// Key not present in the store
    #[error("Key not found")]
    NotFound,

    /// Data corruption detected
    #[error("Data corruption: {0}")]
    Corruption(String),

    /// Log entry cut short, typically a torn write at the end of the file
    #[error("Incomplete entry at offset {offset}: have {have} bytes, need {needed}")]
    IncompleteEntry {
        /// File offset of the entry
        offset: u64,
        /// Bytes available
        have: usize,
        /// Bytes required
        needed: usize,
    },

    /// The type registry refused an operation
    #[error("Type registry error: {0}")]
    Registry(String),

    /// Configuration could not be read or parsed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// True for a missing key
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound)
    }

    /// True for failures of the underlying byte store
    pub fn is_store_unavailable(&self) -> bool {
        matches!(
            self,
            Error::Io(_)
                | Error::StoreUnavailable(_)
                | Error::Serialization(_)
                | Error::IncompleteEntry { .. }
        )
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Serialization(e.to_string())
    }
}

impl From<rmp_serde::encode::Error> for Error {
    fn from(e: rmp_serde::encode::Error) -> Self {
        Error::Encode(e.to_string())
    }
}

impl From<rmp_serde::decode::Error> for Error {
    fn from(e: rmp_serde::decode::Error) -> Self {
        Error::Decode(e.to_string())
    }
}
