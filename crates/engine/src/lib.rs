//! Typed value store engine
//!
//! This crate composes the lower layers into a store of serde values:
//! - `DedupEncoder`: splits first-sighting type descriptors from value bytes
//! - `OrderedDecoder`: lock-protected decoder fed descriptors in order
//! - `TypeRegistry`: durable log of first sightings, replayed on open
//! - `Store`: open/close/put/get/has/delete over any `Backend`
//!
//! The engine is the only component that knows how the registry and the
//! value entries share one key space.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod backend;
pub mod config;
pub mod decoder;
pub mod dedup;
pub mod registry;
pub mod store;

pub use backend::DiskBackend;
pub use config::{StoreConfig, CONFIG_FILE_NAME};
pub use decoder::OrderedDecoder;
pub use dedup::{DedupEncoder, Encoded};
pub use registry::{Registration, RegistrationRecord, ReplayStats, TypeRegistry};
pub use store::Store;
