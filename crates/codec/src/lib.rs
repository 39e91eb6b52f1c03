//! Self-describing codec for stowdb
//!
//! Values are serialized with serde into a stream of frames. The first value
//! of each type written by an `Encoder` is preceded by a descriptor frame
//! naming the type's shape; a `Decoder` must see those descriptors in the
//! same order before it can decode values of the type.
//!
//! The engine only talks to the codec through `TypeEncoder` and
//! `TypeDecoder`.

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod decoder;
pub mod encoder;
pub mod frame;
pub mod shape;

pub use decoder::Decoder;
pub use encoder::Encoder;
pub use frame::{Frame, FrameKind, FrameReader, DESCRIPTOR_TAG, HEADER_LEN, VALUE_TAG};
pub use shape::{shape_of, ShapeError};

use serde::de::DeserializeOwned;
use serde::Serialize;
use stowdb_core::Result;

/// Encoding half of a self-describing codec
pub trait TypeEncoder {
    /// Append `value` to `out`
    ///
    /// Must be deterministic, and must emit a type descriptor before the
    /// value exactly the first time this instance sees the value's type.
    ///
    /// # Errors
    ///
    /// Returns `Error::Encode` if the value cannot be serialized. Nothing is
    /// appended and the type table is unchanged in that case.
    fn encode<T: Serialize + ?Sized>(&mut self, value: &T, out: &mut Vec<u8>) -> Result<()>;

    /// Learn the type introduced by a first-sighting encoding
    ///
    /// `registration` is `descriptor ++ example` as produced by an encoder in
    /// the same position of the type order.
    fn absorb(&mut self, registration: &[u8]) -> Result<()>;
}

/// Decoding half of a self-describing codec
pub trait TypeDecoder {
    /// Learn one type from `descriptor ++ example`; the example is discarded
    fn register(&mut self, registration: &[u8]) -> Result<()>;

    /// Decode a value whose type has been registered
    fn decode<T: DeserializeOwned>(&mut self, bytes: &[u8]) -> Result<T>;

    /// Number of registered types
    fn known_types(&self) -> usize;
}
