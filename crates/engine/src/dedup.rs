//! Deduplicating encoder
//!
//! The codec only reveals that a type is new by writing a descriptor in
//! front of the value. To split the two apart, every value is encoded twice
//! into one buffer:
//!
//! ```text
//! pass 1: [descriptor][value]     s1 bytes
//! pass 2:             [value]     s2 bytes
//! ```
//!
//! When `s1 == s2` the type was already known and there is no descriptor.
//! Otherwise the descriptor is the first `s1 - s2` bytes and the value is
//! what pass 2 wrote. A new type whose descriptor happens to make both
//! passes the same length would be reported as known; the codec's frame
//! headers make that impossible for `stowdb_codec::Encoder`, but other
//! `TypeEncoder`s inherit the limitation.

use serde::Serialize;
use stowdb_codec::{Encoder, TypeEncoder};
use stowdb_core::{Error, Result};

/// A value split into its descriptor and its pure value bytes
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Encoded {
    /// Descriptor bytes, empty unless this was the type's first sighting
    pub descriptor: Vec<u8>,
    /// Value bytes without any descriptor
    pub value: Vec<u8>,
}

impl Encoded {
    /// True if the encoding introduced a new type
    pub fn is_first_sighting(&self) -> bool {
        !self.descriptor.is_empty()
    }

    /// `descriptor ++ value`, the payload of a registration record
    pub fn registration_bytes(&self) -> Vec<u8> {
        let mut bytes = Vec::with_capacity(self.descriptor.len() + self.value.len());
        bytes.extend_from_slice(&self.descriptor);
        bytes.extend_from_slice(&self.value);
        bytes
    }
}

/// Wraps a codec encoder and separates descriptors from values
///
/// Not safe for concurrent use; `encode` takes `&mut self`.
#[derive(Debug)]
pub struct DedupEncoder<E = Encoder> {
    codec: E,
    buf: Vec<u8>,
}

impl Default for DedupEncoder<Encoder> {
    fn default() -> Self {
        Self::new()
    }
}

impl DedupEncoder<Encoder> {
    /// Encoder over a fresh codec instance
    pub fn new() -> Self {
        Self::with_codec(Encoder::new())
    }
}

impl<E: TypeEncoder> DedupEncoder<E> {
    /// Encoder over the given codec instance
    pub fn with_codec(codec: E) -> Self {
        Self {
            codec,
            buf: Vec::new(),
        }
    }

    /// The wrapped codec
    pub fn codec(&self) -> &E {
        &self.codec
    }

    /// Encode `value`, splitting off its descriptor if the type is new
    ///
    /// # Errors
    ///
    /// Returns the codec's error if either pass fails, or `Error::Encode` if
    /// the second pass came out longer than the first.
    pub fn encode<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<Encoded> {
        self.buf.clear();

        self.codec.encode(value, &mut self.buf)?;
        let s1 = self.buf.len();

        self.codec.encode(value, &mut self.buf)?;
        let s2 = self.buf.len() - s1;

        if s2 > s1 {
            return Err(Error::Encode(format!(
                "second encoding ({} bytes) is longer than the first ({} bytes)",
                s2, s1
            )));
        }

        Ok(Encoded {
            descriptor: self.buf[..s1 - s2].to_vec(),
            value: self.buf[s1..].to_vec(),
        })
    }

    /// Teach the codec the type recorded in `registration`
    pub fn absorb(&mut self, registration: &[u8]) -> Result<()> {
        self.codec.absorb(registration)
    }
}
