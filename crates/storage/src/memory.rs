//! MemoryStore: ordered in-memory table
//!
//! This module implements `ByteStore` using:
//! - `BTreeMap<Vec<u8>, Vec<u8>>` for ordered byte-key storage
//! - `parking_lot::RwLock` for thread-safe access
//!
//! Batches are applied under a single write lock, so readers never observe
//! half of a batch.
//!
//! `MemoryStore` is also the table inside `DiskStore`; the disk store logs a
//! mutation and then applies it here.

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;

use parking_lot::RwLock;
use stowdb_core::{Backend, BatchOp, ByteStore, Result, WriteBatch};

/// Ordered byte table using BTreeMap with RwLock
#[derive(Debug, Default)]
pub struct MemoryStore {
    data: RwLock<BTreeMap<Vec<u8>, Vec<u8>>>,
}

impl MemoryStore {
    /// Create a new empty MemoryStore
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of entries across every namespace
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// True when the table holds no entries
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }

    /// Copy of every entry in key order
    pub fn snapshot(&self) -> Vec<(Vec<u8>, Vec<u8>)> {
        self.data
            .read()
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect()
    }

    /// Drop every entry
    pub fn clear(&self) {
        self.data.write().clear();
    }

    /// Apply one batch operation to an already-locked map
    fn apply_op(data: &mut BTreeMap<Vec<u8>, Vec<u8>>, op: BatchOp) {
        match op {
            BatchOp::Put { key, value } => {
                data.insert(key, value);
            }
            BatchOp::Delete { key } => {
                data.remove(&key);
            }
        }
    }

    /// Apply operations in order under one write lock
    pub fn apply_ops(&self, ops: Vec<BatchOp>) {
        let mut data = self.data.write();
        for op in ops {
            Self::apply_op(&mut data, op);
        }
    }
}

impl ByteStore for MemoryStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        Ok(self.data.read().get(key).cloned())
    }

    fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.data.read().contains_key(key))
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.data.write().insert(key.to_vec(), value.to_vec());
        Ok(())
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.data.write().remove(key);
        Ok(())
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        let data = self.data.read();
        Ok(data
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }

    fn count_prefix(&self, prefix: &[u8]) -> Result<usize> {
        let data = self.data.read();
        Ok(data
            .range::<[u8], _>((Bound::Included(prefix), Bound::Unbounded))
            .take_while(|(k, _)| k.starts_with(prefix))
            .count())
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        self.apply_ops(batch.into_ops());
        Ok(())
    }
}

/// Backend over one shared `MemoryStore`
///
/// Every `open` returns a handle to the same table, so a store closed and
/// reopened through this backend sees its earlier writes. Nothing reaches
/// disk.
#[derive(Debug, Clone, Default)]
pub struct MemoryBackend {
    store: Arc<MemoryStore>,
}

impl MemoryBackend {
    /// Backend over a fresh empty table
    pub fn new() -> Self {
        Self::default()
    }

    /// Backend over an existing table
    pub fn from_store(store: Arc<MemoryStore>) -> Self {
        Self { store }
    }

    /// The shared table
    pub fn store(&self) -> &Arc<MemoryStore> {
        &self.store
    }
}

impl Backend for MemoryBackend {
    type Store = Arc<MemoryStore>;

    fn open(&self) -> Result<Self::Store> {
        Ok(Arc::clone(&self.store))
    }

    fn location(&self) -> String {
        "memory".to_string()
    }
}
