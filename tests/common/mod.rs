//! Shared test utilities for the integration suites.
//!
//! Import via `#[path = "../common/mod.rs"] mod common;` from a suite's
//! main.rs.

#![allow(dead_code)]

use serde::{Deserialize, Serialize};
use stowdb::{Store, StoreConfig};
use tempfile::TempDir;

/// The record type used throughout the scenarios
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExampleThing {
    pub name: String,
    pub age: u32,
}

impl ExampleThing {
    pub fn new(name: &str, age: u32) -> Self {
        Self {
            name: name.to_string(),
            age,
        }
    }
}

/// Disk store in a fresh temporary directory
///
/// Keep the `TempDir` alive for as long as the store is used.
pub fn disk_store() -> (TempDir, Store) {
    let temp_dir = TempDir::new().expect("temp dir");
    let store = Store::with_config(temp_dir.path(), StoreConfig::with_durability("always"));
    (temp_dir, store)
}

/// Close and reopen, returning the replayed type count
pub fn cycle(store: &mut Store) -> usize {
    store.close().expect("close");
    store.open().expect("open");
    assert!(store.replay_error().is_none(), "replay failed");
    store.replay_stats().expect("replay stats").records
}
