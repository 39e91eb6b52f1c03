//! Core types and traits for stowdb
//!
//! This crate defines the foundational pieces shared by every layer:
//! - Error: error type hierarchy and `Result` alias
//! - ByteStore / Backend: the ordered byte store contract the engine runs on
//! - WriteBatch: multi-key mutation applied as one unit
//! - Key namespaces: `key:`, `prep#`, `prep:`, `prep-count`

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod batch;
pub mod error;
pub mod traits;
pub mod types;

pub use batch::{BatchOp, WriteBatch};
pub use error::{Error, Result};
pub use traits::{Backend, ByteStore};
pub use types::{
    decode_counter, encode_counter, marker_key, parse_record_sequence, record_key,
    strip_value_prefix, value_key, COUNTER_KEY, MARKER_PREFIX, RECORD_PREFIX,
    SEQUENCE_WIDTH, VALUE_PREFIX,
};
