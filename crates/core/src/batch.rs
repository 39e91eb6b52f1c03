//! Multi-key mutations
//!
//! A `WriteBatch` groups puts and deletes that a store applies as one unit.
//! Stores that can make the batch atomic (the in-memory table, the log-backed
//! disk store) do so; the default `ByteStore::write_batch` applies the
//! operations one by one.

use serde::{Deserialize, Serialize};

/// One mutation inside a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BatchOp {
    /// Insert or overwrite a key
    Put {
        /// Raw key
        key: Vec<u8>,
        /// Raw value
        value: Vec<u8>,
    },
    /// Remove a key (absent keys are ignored)
    Delete {
        /// Raw key
        key: Vec<u8>,
    },
}

impl BatchOp {
    /// Key touched by this operation
    pub fn key(&self) -> &[u8] {
        match self {
            BatchOp::Put { key, .. } | BatchOp::Delete { key } => key,
        }
    }
}

/// Ordered list of mutations
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct WriteBatch {
    ops: Vec<BatchOp>,
}

impl WriteBatch {
    /// Empty batch
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue a put
    pub fn put(&mut self, key: impl Into<Vec<u8>>, value: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(BatchOp::Put {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    /// Queue a delete
    pub fn delete(&mut self, key: impl Into<Vec<u8>>) -> &mut Self {
        self.ops.push(BatchOp::Delete { key: key.into() });
        self
    }

    /// Operations in submission order
    pub fn ops(&self) -> &[BatchOp] {
        &self.ops
    }

    /// Consume into the operations
    pub fn into_ops(self) -> Vec<BatchOp> {
        self.ops
    }

    /// Number of queued operations
    pub fn len(&self) -> usize {
        self.ops.len()
    }

    /// True when nothing is queued
    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }
}
