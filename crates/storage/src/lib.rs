//! Storage layer for stowdb
//!
//! This crate implements the ordered byte stores the engine runs on:
//! - MemoryStore: BTreeMap-based table with RwLock
//! - MemoryBackend: hands out one shared MemoryStore, so data survives
//!   close/reopen within the process
//! - DiskStore: MemoryStore rebuilt from an append-only log at open,
//!   guarded by an exclusive lock file

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod disk;
pub mod memory;

pub use disk::{DiskOptions, DiskStore, LOCK_FILE_NAME, LOG_FILE_NAME};
pub use memory::{MemoryBackend, MemoryStore};
