//! Durability layer for stowdb
//!
//! This crate handles everything that touches disk for the log-backed store:
//!
//! - Log record framing with CRC32 checksums (`encoding`)
//! - Durability modes: Always, Standard (default), Cache (`mode`)
//! - The append-only log file and its recovery scan (`wal`)
//! - Rewriting the log down to live entries (`compaction`)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod compaction;
pub mod encoding;
pub mod mode;
pub mod wal;

pub use compaction::{rewrite_log, CompactionInfo};
pub use encoding::{decode_record, encode_record};
pub use mode::DurabilityMode;
pub use wal::{LogRecord, Recovered, Wal};
