//! Stream encoder

use std::collections::HashMap;

use serde::Serialize;
use stowdb_core::{Error, Result};

use crate::frame::{write_frame, FrameKind, FrameReader};
use crate::shape::shape_of;
use crate::TypeEncoder;

/// Encoder with a per-instance type table
///
/// The first value of each shape is preceded by a descriptor frame that
/// assigns the shape the next type id. Later values of that shape are a
/// single value frame. Encoding the same value twice therefore yields
/// `descriptor ++ value` and then `value`, with identical value bytes.
#[derive(Debug, Clone)]
pub struct Encoder {
    types: HashMap<String, u32>,
    next_id: u32,
}

impl Default for Encoder {
    fn default() -> Self {
        Self::new()
    }
}

impl Encoder {
    /// Encoder that knows no types
    pub fn new() -> Self {
        Self {
            types: HashMap::new(),
            next_id: 1,
        }
    }

    /// Number of descriptors this encoder has emitted or absorbed
    pub fn known_types(&self) -> usize {
        (self.next_id - 1) as usize
    }

    /// Type id assigned to `shape`, if any
    pub fn type_id(&self, shape: &str) -> Option<u32> {
        self.types.get(shape).copied()
    }
}

impl TypeEncoder for Encoder {
    fn encode<T: Serialize + ?Sized>(&mut self, value: &T, out: &mut Vec<u8>) -> Result<()> {
        let shape = shape_of(value).map_err(|e| Error::Encode(e.to_string()))?;
        let payload = rmp_serde::to_vec_named(value)?;

        let type_id = match self.types.get(&shape) {
            Some(&id) => id,
            None => {
                let id = self.next_id;
                write_frame(out, FrameKind::Descriptor, id, shape.as_bytes())?;
                self.types.insert(shape, id);
                self.next_id += 1;
                id
            }
        };
        write_frame(out, FrameKind::Value, type_id, &payload)
    }

    fn absorb(&mut self, registration: &[u8]) -> Result<()> {
        let frame = FrameReader::new(registration)
            .next()
            .ok_or_else(|| Error::Corruption("empty registration".to_string()))??;

        if frame.kind != FrameKind::Descriptor {
            return Err(Error::Corruption(
                "registration does not start with a descriptor".to_string(),
            ));
        }
        if frame.type_id != self.next_id {
            return Err(Error::Corruption(format!(
                "registration carries type id {}, expected {}",
                frame.type_id, self.next_id
            )));
        }
        let shape = std::str::from_utf8(frame.body)
            .map_err(|_| Error::Corruption("descriptor is not valid UTF-8".to_string()))?;

        // A repeated descriptor keeps its first id but still takes a position
        self.types.entry(shape.to_string()).or_insert(frame.type_id);
        self.next_id += 1;
        Ok(())
    }
}
