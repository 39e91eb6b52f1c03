//! Ordered decoder
//!
//! The codec decoder carries a positional type table, so it must see every
//! descriptor in the order the paired encoder produced them. This wrapper
//! serializes access to one decoder instance behind a mutex.
//!
//! Clones share the instance and contend on its lock. `fork` deep-copies
//! the instance, giving a handle that can be used concurrently with the
//! original without contention.

use std::sync::Arc;

use parking_lot::Mutex;
use serde::de::DeserializeOwned;
use stowdb_codec::{Decoder, TypeDecoder};
use stowdb_core::Result;

/// Lock-protected handle to a codec decoder
#[derive(Debug)]
pub struct OrderedDecoder<D = Decoder> {
    inner: Arc<Mutex<D>>,
}

impl<D> Clone for OrderedDecoder<D> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl Default for OrderedDecoder<Decoder> {
    fn default() -> Self {
        Self::new()
    }
}

impl OrderedDecoder<Decoder> {
    /// Handle over a fresh decoder that knows no types
    pub fn new() -> Self {
        Self::with_codec(Decoder::new())
    }
}

impl<D: TypeDecoder> OrderedDecoder<D> {
    /// Handle over the given decoder instance
    pub fn with_codec(codec: D) -> Self {
        Self {
            inner: Arc::new(Mutex::new(codec)),
        }
    }

    /// Feed `descriptor ++ example` to the decoder
    ///
    /// Advances the type table by exactly one type. The example value is
    /// decoded and discarded.
    ///
    /// # Errors
    ///
    /// Returns `Error::Decode` if the descriptor is not the next one the
    /// decoder expects, or the bytes are not a descriptor plus one value.
    pub fn register(&self, registration: &[u8]) -> Result<()> {
        self.inner.lock().register(registration)
    }

    /// Decode pure value bytes into `T`
    ///
    /// # Errors
    ///
    /// Returns `Error::Decode` if the value's type was never registered or
    /// the bytes do not decode as `T`.
    pub fn decode<T: DeserializeOwned>(&self, bytes: &[u8]) -> Result<T> {
        self.inner.lock().decode(bytes)
    }

    /// Number of types registered so far
    pub fn registered_types(&self) -> usize {
        self.inner.lock().known_types()
    }

    /// True if both handles use the same decoder instance
    pub fn shares_instance_with(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl<D: TypeDecoder + Clone> OrderedDecoder<D> {
    /// Independent handle over a copy of the current decoder state
    pub fn fork(&self) -> Self {
        Self::with_codec(self.inner.lock().clone())
    }
}
