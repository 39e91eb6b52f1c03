//! Stream decoder

use serde::de::{DeserializeOwned, IgnoredAny};
use stowdb_core::{Error, Result};

use crate::frame::{Frame, FrameKind, FrameReader};
use crate::TypeDecoder;

/// Decoder with a positional type table
///
/// Type ids index the table in registration order, so descriptors must
/// arrive in exactly the order the paired encoder produced them.
#[derive(Debug, Clone, Default)]
pub struct Decoder {
    types: Vec<String>,
}

impl Decoder {
    /// Decoder that knows no types
    pub fn new() -> Self {
        Self::default()
    }

    /// Shape registered under `type_id`
    pub fn shape(&self, type_id: u32) -> Option<&str> {
        let index = (type_id as usize).checked_sub(1)?;
        self.types.get(index).map(String::as_str)
    }

    fn next_id(&self) -> u32 {
        self.types.len() as u32 + 1
    }

    /// Shape carried by a descriptor frame that must come next in order
    fn check_descriptor<'a>(&self, frame: &Frame<'a>, expected_id: u32) -> Result<&'a str> {
        if frame.type_id != expected_id {
            return Err(Error::Decode(format!(
                "descriptor for type {} arrived out of order, expected type {}",
                frame.type_id, expected_id
            )));
        }
        std::str::from_utf8(frame.body)
            .map_err(|_| Error::Decode("descriptor is not valid UTF-8".to_string()))
    }

    fn check_value_id(&self, frame: &Frame<'_>, known: u32) -> Result<()> {
        if frame.type_id == 0 || frame.type_id > known {
            return Err(Error::Decode(format!(
                "value of type {} was never registered ({} types known)",
                frame.type_id, known
            )));
        }
        Ok(())
    }
}

fn value_frame<'a>(frame: Option<Result<Frame<'a>>>) -> Result<Frame<'a>> {
    let frame = frame.ok_or_else(|| Error::Decode("stream ends before a value".to_string()))??;
    if frame.kind != FrameKind::Value {
        return Err(Error::Decode("expected a value frame".to_string()));
    }
    Ok(frame)
}

impl TypeDecoder for Decoder {
    fn register(&mut self, registration: &[u8]) -> Result<()> {
        let mut reader = FrameReader::new(registration);

        let descriptor = reader
            .next()
            .ok_or_else(|| Error::Decode("empty registration".to_string()))??;
        if descriptor.kind != FrameKind::Descriptor {
            return Err(Error::Decode(
                "registration does not start with a descriptor".to_string(),
            ));
        }
        let shape = self.check_descriptor(&descriptor, self.next_id())?;

        let example = value_frame(reader.next())?;
        self.check_value_id(&example, self.next_id())?;
        rmp_serde::from_slice::<IgnoredAny>(example.body)?;

        if !reader.is_exhausted() {
            return Err(Error::Decode(
                "registration holds more than one descriptor and example".to_string(),
            ));
        }

        self.types.push(shape.to_string());
        Ok(())
    }

    fn decode<T: DeserializeOwned>(&mut self, bytes: &[u8]) -> Result<T> {
        let mut reader = FrameReader::new(bytes);
        loop {
            let frame = next_frame(reader.next())?;
            match frame.kind {
                FrameKind::Descriptor => {
                    let shape = self.check_descriptor(&frame, self.next_id())?;
                    self.types.push(shape.to_string());
                }
                FrameKind::Value => {
                    self.check_value_id(&frame, self.types.len() as u32)?;
                    if !reader.is_exhausted() {
                        return Err(Error::Decode("trailing bytes after value".to_string()));
                    }
                    return Ok(rmp_serde::from_slice(frame.body)?);
                }
            }
        }
    }

    fn known_types(&self) -> usize {
        self.types.len()
    }
}

fn next_frame<'a>(frame: Option<Result<Frame<'a>>>) -> Result<Frame<'a>> {
    frame.ok_or_else(|| Error::Decode("stream ends before a value".to_string()))?
}
