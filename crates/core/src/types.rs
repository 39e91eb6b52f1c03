//! Key namespaces
//!
//! Value entries and type-registry bookkeeping share one ordered key space
//! and are told apart by prefix:
//!
//! | Prefix | Entry | Value |
//! |---|---|---|
//! | `key:<encoded key>` | stored record | encoded value bytes (no descriptor) |
//! | `prep#<sequence>` | registration record | descriptor ++ example value bytes |
//! | `prep:<descriptor>` | presence marker | empty |
//! | `prep-count` | registration counter | decimal ASCII integer |
//!
//! Sequences are written as zero-padded decimal so that byte order and
//! numeric order agree when scanning `prep#`.

use crate::error::{Error, Result};

/// Prefix of every value entry
pub const VALUE_PREFIX: &[u8] = b"key:";

/// Prefix of every registration record
pub const RECORD_PREFIX: &[u8] = b"prep#";

/// Prefix of every presence marker
pub const MARKER_PREFIX: &[u8] = b"prep:";

/// Key of the registration counter
pub const COUNTER_KEY: &[u8] = b"prep-count";

/// Digits used for a record sequence (fits any u64)
pub const SEQUENCE_WIDTH: usize = 20;

fn prefixed(prefix: &[u8], rest: &[u8]) -> Vec<u8> {
    let mut key = Vec::with_capacity(prefix.len() + rest.len());
    key.extend_from_slice(prefix);
    key.extend_from_slice(rest);
    key
}

/// Storage key for a value whose encoded key bytes are `encoded_key`
pub fn value_key(encoded_key: &[u8]) -> Vec<u8> {
    prefixed(VALUE_PREFIX, encoded_key)
}

/// Encoded key bytes of a value entry, or None for other namespaces
pub fn strip_value_prefix(key: &[u8]) -> Option<&[u8]> {
    key.strip_prefix(VALUE_PREFIX)
}

/// Storage key of registration record `sequence`
pub fn record_key(sequence: u64) -> Vec<u8> {
    let digits = format!("{:0width$}", sequence, width = SEQUENCE_WIDTH);
    prefixed(RECORD_PREFIX, digits.as_bytes())
}

/// Sequence number of a registration record key
pub fn parse_record_sequence(key: &[u8]) -> Option<u64> {
    let digits = key.strip_prefix(RECORD_PREFIX)?;
    if digits.is_empty() || !digits.iter().all(u8::is_ascii_digit) {
        return None;
    }
    std::str::from_utf8(digits).ok()?.parse().ok()
}

/// Storage key of the presence marker for `descriptor`
pub fn marker_key(descriptor: &[u8]) -> Vec<u8> {
    prefixed(MARKER_PREFIX, descriptor)
}

/// Counter value as stored
pub fn encode_counter(count: u64) -> Vec<u8> {
    count.to_string().into_bytes()
}

/// Parse a stored counter value
///
/// # Errors
///
/// Returns `Error::Corruption` if the bytes are not a decimal integer.
pub fn decode_counter(bytes: &[u8]) -> Result<u64> {
    std::str::from_utf8(bytes)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .ok_or_else(|| {
            Error::Corruption(format!(
                "registration counter is not a decimal integer: {:?}",
                String::from_utf8_lossy(bytes)
            ))
        })
}
