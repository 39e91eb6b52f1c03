//! Log record encoding and decoding
//!
//! This module provides encoding/decoding for log records with CRC32 checksums
//! for corruption detection.
//!
//! ## Record Format
//!
//! ```text
//! [length: u32][type: u8][payload: bytes][crc32: u32]
//! ```
//!
//! - **length**: Total size of type + payload + crc (NOT including length itself)
//! - **type**: Record type tag (1=Put, 2=Delete, 3=Batch)
//! - **payload**: bincode-serialized LogRecord
//! - **crc32**: CRC32 checksum over \[type\]\[payload\]
//!
//! A batch is a single record, so it is either replayed whole or not at all.

use crate::wal::LogRecord;
use crc32fast::Hasher;
use std::io::{Cursor, Read, Write};
use stowdb_core::error::{Error, Result};

/// Record type tags
const TYPE_PUT: u8 = 1;
const TYPE_DELETE: u8 = 2;
const TYPE_BATCH: u8 = 3;

/// Minimum value of the length field: type(1) + crc(4)
const MIN_RECORD_LEN: usize = 5;

fn type_tag(record: &LogRecord) -> u8 {
    match record {
        LogRecord::Put { .. } => TYPE_PUT,
        LogRecord::Delete { .. } => TYPE_DELETE,
        LogRecord::Batch { .. } => TYPE_BATCH,
    }
}

fn length_field(total_len: usize) -> Result<u32> {
    u32::try_from(total_len).map_err(|_| {
        Error::Serialization(format!(
            "log record of {} bytes exceeds the u32 length field",
            total_len
        ))
    })
}

/// Encode log record to bytes
///
/// Format: `[length: u32][type: u8][payload: bytes][crc32: u32]`
///
/// Returns byte buffer ready for file I/O.
///
/// # Errors
///
/// Returns an error if serialization fails or the record does not fit the
/// u32 length field.
pub fn encode_record(record: &LogRecord) -> Result<Vec<u8>> {
    let tag = type_tag(record);
    let payload = bincode::serialize(record)?;

    // type(1) + payload + crc(4)
    let total_len = 1 + payload.len() + 4;
    let mut buf = Vec::with_capacity(4 + total_len);

    buf.write_all(&length_field(total_len)?.to_le_bytes())?;
    buf.write_all(&[tag])?;
    buf.write_all(&payload)?;

    let mut hasher = Hasher::new();
    hasher.update(&[tag]);
    hasher.update(&payload);
    buf.write_all(&hasher.finalize().to_le_bytes())?;

    Ok(buf)
}

/// Decode log record from bytes with CRC validation
///
/// Returns the decoded record and the number of bytes consumed.
///
/// # Errors
///
/// - `Error::IncompleteEntry` if the buffer ends before the record does
///   (a torn write at the end of the log)
/// - `Error::Corruption` with offset information on an invalid length,
///   CRC mismatch, undecodable payload or type tag mismatch
pub fn decode_record(buf: &[u8], offset: u64) -> Result<(LogRecord, usize)> {
    let mut cursor = Cursor::new(buf);

    let mut len_buf = [0u8; 4];
    cursor
        .read_exact(&mut len_buf)
        .map_err(|_| Error::IncompleteEntry {
            offset,
            have: buf.len(),
            needed: 4,
        })?;
    let total_len = u32::from_le_bytes(len_buf) as usize;

    // Validate before arithmetic (prevent underflow)
    if total_len < MIN_RECORD_LEN {
        return Err(Error::Corruption(format!(
            "offset {}: Invalid record length {} (minimum is {} bytes: type(1) + crc(4))",
            offset, total_len, MIN_RECORD_LEN
        )));
    }

    if buf.len() < 4 + total_len {
        return Err(Error::IncompleteEntry {
            offset,
            have: buf.len(),
            needed: 4 + total_len,
        });
    }

    // [len(4)][tag(1)][payload][crc(4)], record ends at 4 + total_len
    let tag = buf[4];
    let crc_start = total_len;
    let payload = &buf[5..crc_start];
    let mut crc_buf = [0u8; 4];
    crc_buf.copy_from_slice(&buf[crc_start..crc_start + 4]);
    let expected_crc = u32::from_le_bytes(crc_buf);

    let mut hasher = Hasher::new();
    hasher.update(&[tag]);
    hasher.update(payload);
    let actual_crc = hasher.finalize();

    if actual_crc != expected_crc {
        return Err(Error::Corruption(format!(
            "offset {}: CRC mismatch: expected {:08x}, got {:08x}",
            offset, expected_crc, actual_crc
        )));
    }

    let record: LogRecord = bincode::deserialize(payload).map_err(|e| {
        Error::Corruption(format!("offset {}: Deserialization failed: {}", offset, e))
    })?;

    let expected_tag = type_tag(&record);
    if tag != expected_tag {
        return Err(Error::Corruption(format!(
            "offset {}: Type tag mismatch: expected {}, got {}",
            offset, expected_tag, tag
        )));
    }

    Ok((record, 4 + total_len))
}
