//! Core traits for storage abstraction
//!
//! This module defines the `ByteStore` and `Backend` traits that let the
//! engine run on any ordered byte store without knowing how it persists.

use std::sync::Arc;

use crate::batch::{BatchOp, WriteBatch};
use crate::error::Result;

/// Ordered byte key-value store
///
/// Keys compare lexicographically as raw bytes. The engine keeps its type
/// registry and its value entries side by side in one store, separated only
/// by key prefix, so `scan_prefix` must return keys in ascending order.
///
/// Thread safety: all methods take `&self` and must be safe to call from
/// multiple threads (requires Send + Sync).
pub trait ByteStore: Send + Sync {
    /// Get the value for key
    ///
    /// Returns None if the key doesn't exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>>;

    /// Point existence check
    fn contains(&self, key: &[u8]) -> Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    /// Insert or overwrite key
    fn put(&self, key: &[u8], value: &[u8]) -> Result<()>;

    /// Remove key; removing an absent key is not an error
    fn delete(&self, key: &[u8]) -> Result<()>;

    /// All entries whose key starts with `prefix`, in ascending key order
    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>>;

    /// Number of entries whose key starts with `prefix`
    fn count_prefix(&self, prefix: &[u8]) -> Result<usize> {
        Ok(self.scan_prefix(prefix)?.len())
    }

    /// Apply a batch of mutations
    ///
    /// The default applies the operations in order and stops at the first
    /// failure, so it is NOT atomic. Implementations that can apply the
    /// whole batch as one unit should override it.
    fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        for op in batch.into_ops() {
            match op {
                BatchOp::Put { key, value } => self.put(&key, &value)?,
                BatchOp::Delete { key } => self.delete(&key)?,
            }
        }
        Ok(())
    }

    /// Push buffered writes down to durable storage
    fn flush(&self) -> Result<()> {
        Ok(())
    }

    /// Flush and release resources; later calls may fail
    fn close(&self) -> Result<()> {
        self.flush()
    }
}

impl<T: ByteStore + ?Sized> ByteStore for Arc<T> {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        (**self).get(key)
    }

    fn contains(&self, key: &[u8]) -> Result<bool> {
        (**self).contains(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        (**self).put(key, value)
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        (**self).delete(key)
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        (**self).scan_prefix(prefix)
    }

    fn count_prefix(&self, prefix: &[u8]) -> Result<usize> {
        (**self).count_prefix(prefix)
    }

    fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        (**self).write_batch(batch)
    }

    fn flush(&self) -> Result<()> {
        (**self).flush()
    }

    fn close(&self) -> Result<()> {
        (**self).close()
    }
}

/// Opens a `ByteStore`
///
/// A backend is the closed form of a store: it remembers where the data
/// lives and produces a fresh handle on every `open`. The engine keeps the
/// backend for its whole lifetime and drops the handle on close.
pub trait Backend {
    /// Store handle produced by `open`
    type Store: ByteStore;

    /// Open (or create) the store
    ///
    /// # Errors
    ///
    /// Returns an error if the store cannot be opened.
    fn open(&self) -> Result<Self::Store>;

    /// Human-readable location, used in logs
    fn location(&self) -> String;
}
