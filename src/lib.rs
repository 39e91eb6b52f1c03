//! stowdb - embedded store for serde values
//!
//! stowdb keeps arbitrary `Serialize`/`Deserialize` values in an ordered
//! byte store. Each value is written without its type descriptor; the
//! descriptor of every distinct type is recorded once in a type registry
//! that lives in the same store and is replayed whenever the store opens.
//!
//! # Quick Start
//!
//! ```ignore
//! use stowdb::Store;
//!
//! let mut store = Store::at("./data");
//! store.put("name", "adam")?;
//! store.close()?;
//!
//! let name: String = store.get("name")?;
//! assert_eq!(name, "adam");
//! ```
//!
//! # Architecture
//!
//! - `stowdb-core`: error type, byte store traits, key namespaces
//! - `stowdb-durability`: checksummed append-only log
//! - `stowdb-storage`: in-memory and log-backed byte stores
//! - `stowdb-codec`: self-describing serde codec
//! - `stowdb-engine`: deduplicating encoder, ordered decoder, registry, store

pub use stowdb_core::{Backend, ByteStore, Error, Result, WriteBatch};
pub use stowdb_durability::DurabilityMode;
pub use stowdb_engine::{
    DedupEncoder, DiskBackend, Encoded, OrderedDecoder, Registration, RegistrationRecord,
    ReplayStats, Store, StoreConfig, TypeRegistry, CONFIG_FILE_NAME,
};
pub use stowdb_storage::{DiskOptions, DiskStore, MemoryBackend, MemoryStore};

/// Codec used by the store
pub mod codec {
    pub use stowdb_codec::*;
}
