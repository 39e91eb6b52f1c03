//! Frame format
//!
//! An encoded stream is a sequence of frames:
//!
//! ```text
//! [tag: u8][type_id: u32 LE][len: u32 LE][body: len bytes]
//! ```
//!
//! - tag `0xD5`: descriptor frame, body is the UTF-8 shape of type `type_id`
//! - tag `0xA7`: value frame, body is the MessagePack encoding of a value of
//!   type `type_id`

use byteorder::{ByteOrder, LittleEndian, WriteBytesExt};
use stowdb_core::{Error, Result};

/// Tag of a descriptor frame
pub const DESCRIPTOR_TAG: u8 = 0xD5;

/// Tag of a value frame
pub const VALUE_TAG: u8 = 0xA7;

/// Bytes before the body: tag(1) + type_id(4) + len(4)
pub const HEADER_LEN: usize = 9;

/// What a frame carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    /// Type descriptor
    Descriptor,
    /// Encoded value
    Value,
}

impl FrameKind {
    /// Wire tag
    pub fn tag(self) -> u8 {
        match self {
            FrameKind::Descriptor => DESCRIPTOR_TAG,
            FrameKind::Value => VALUE_TAG,
        }
    }

    /// Kind for a wire tag
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            DESCRIPTOR_TAG => Some(FrameKind::Descriptor),
            VALUE_TAG => Some(FrameKind::Value),
            _ => None,
        }
    }
}

/// One frame borrowed from an encoded stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    /// What the body holds
    pub kind: FrameKind,
    /// Type the frame belongs to
    pub type_id: u32,
    /// Frame body
    pub body: &'a [u8],
}

impl Frame<'_> {
    /// Size of the frame on the wire
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN + self.body.len()
    }
}

/// Append one frame to `out`
///
/// # Errors
///
/// Returns `Error::Encode` if the body does not fit a u32 length.
pub fn write_frame(out: &mut Vec<u8>, kind: FrameKind, type_id: u32, body: &[u8]) -> Result<()> {
    let len = u32::try_from(body.len())
        .map_err(|_| Error::Encode(format!("frame body of {} bytes is too large", body.len())))?;
    out.reserve(HEADER_LEN + body.len());
    out.write_u8(kind.tag())?;
    out.write_u32::<LittleEndian>(type_id)?;
    out.write_u32::<LittleEndian>(len)?;
    out.extend_from_slice(body);
    Ok(())
}

/// Iterator over the frames of an encoded stream
///
/// Yields `Error::Decode` once for a malformed frame and then stops.
#[derive(Debug, Clone)]
pub struct FrameReader<'a> {
    buf: &'a [u8],
    pos: usize,
    failed: bool,
}

impl<'a> FrameReader<'a> {
    /// Reader positioned at the start of `buf`
    pub fn new(buf: &'a [u8]) -> Self {
        Self {
            buf,
            pos: 0,
            failed: false,
        }
    }

    /// True once every byte has been consumed
    pub fn is_exhausted(&self) -> bool {
        self.pos >= self.buf.len()
    }

    fn read_frame(&mut self) -> Result<Frame<'a>> {
        let rest = &self.buf[self.pos..];
        if rest.len() < HEADER_LEN {
            return Err(Error::Decode(format!(
                "truncated frame header at offset {}: {} of {} bytes",
                self.pos,
                rest.len(),
                HEADER_LEN
            )));
        }

        let kind = FrameKind::from_tag(rest[0]).ok_or_else(|| {
            Error::Decode(format!(
                "unknown frame tag {:#04x} at offset {}",
                rest[0], self.pos
            ))
        })?;
        let type_id = LittleEndian::read_u32(&rest[1..5]);
        let len = LittleEndian::read_u32(&rest[5..9]) as usize;

        let body = rest.get(HEADER_LEN..HEADER_LEN + len).ok_or_else(|| {
            Error::Decode(format!(
                "truncated frame body at offset {}: need {} bytes, have {}",
                self.pos,
                len,
                rest.len() - HEADER_LEN
            ))
        })?;

        self.pos += HEADER_LEN + len;
        Ok(Frame {
            kind,
            type_id,
            body,
        })
    }
}

impl<'a> Iterator for FrameReader<'a> {
    type Item = Result<Frame<'a>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed || self.is_exhausted() {
            return None;
        }
        let frame = self.read_frame();
        if frame.is_err() {
            self.failed = true;
        }
        Some(frame)
    }
}
