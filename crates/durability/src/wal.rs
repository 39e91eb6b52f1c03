//! Append-only log file
//!
//! The disk store keeps its whole table in memory and logs every mutation
//! here before applying it. Reopening the store replays the log.
//!
//! ## File Operations
//!
//! - `Wal::recover()` - Scan a log, returning valid records and the valid length
//! - `Wal::open()` - Open existing log or create new one, positioned at the end
//! - `Wal::append()` - Write encoded record to end of file
//! - `Wal::flush()` - Flush buffered writes
//! - `Wal::fsync()` - Force sync to disk
//! - `Wal::size()` - Get current file size
//!
//! ## Torn Tails
//!
//! A crash mid-append leaves a partial record at the end of the file.
//! `recover` stops at the first record that is incomplete or fails its
//! checksum and reports where the valid prefix ends; `open` truncates the
//! file there so new appends never land behind garbage.

use crate::encoding::{decode_record, encode_record};
use crate::mode::DurabilityMode;
use serde::{Deserialize, Serialize};
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Instant;
use stowdb_core::error::{Error, Result};
use stowdb_core::{BatchOp, WriteBatch};
use tracing::warn;

/// One logged mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LogRecord {
    /// Insert or overwrite a key
    Put {
        /// Raw key
        key: Vec<u8>,
        /// Raw value
        value: Vec<u8>,
    },
    /// Remove a key
    Delete {
        /// Raw key
        key: Vec<u8>,
    },
    /// Several mutations applied as one unit
    Batch {
        /// Operations in submission order
        ops: Vec<BatchOp>,
    },
}

impl From<WriteBatch> for LogRecord {
    fn from(batch: WriteBatch) -> Self {
        LogRecord::Batch {
            ops: batch.into_ops(),
        }
    }
}

/// Result of scanning a log file
#[derive(Debug, Default)]
pub struct Recovered {
    /// Records of the valid prefix, in file order
    pub records: Vec<LogRecord>,
    /// Length of the valid prefix in bytes
    pub valid_len: u64,
    /// Length of the file as found
    pub file_len: u64,
}

impl Recovered {
    /// Bytes past the valid prefix (torn or corrupt tail)
    pub fn discarded_bytes(&self) -> u64 {
        self.file_len - self.valid_len
    }
}

/// Append-only log with configurable durability
///
/// # Example
///
/// ```ignore
/// use stowdb_durability::{DurabilityMode, LogRecord, Wal};
///
/// let recovered = Wal::recover("data/data.log")?;
/// let mut wal = Wal::open("data/data.log", DurabilityMode::default(), Some(recovered.valid_len))?;
/// wal.append(&LogRecord::Delete { key: b"key:x".to_vec() })?;
/// ```
pub struct Wal {
    /// File path
    path: PathBuf,

    /// Buffered writer for appends
    writer: BufWriter<File>,

    /// Current file offset
    current_offset: u64,

    /// Durability mode
    durability_mode: DurabilityMode,

    /// Last fsync time (for standard mode)
    last_fsync: Instant,

    /// Writes since last fsync (for standard mode)
    writes_since_fsync: usize,
}

impl Wal {
    /// Scan the log at `path`
    ///
    /// A missing file recovers as empty. Scanning stops at the first record
    /// that is incomplete or corrupt.
    ///
    /// # Errors
    ///
    /// Returns an error only if the file exists but cannot be read.
    pub fn recover<P: AsRef<Path>>(path: P) -> Result<Recovered> {
        let path = path.as_ref();
        let mut buf = Vec::new();
        match File::open(path) {
            Ok(mut file) => {
                file.read_to_end(&mut buf)?;
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(Recovered::default());
            }
            Err(e) => return Err(e.into()),
        }

        let mut records = Vec::new();
        let mut offset = 0usize;
        while offset < buf.len() {
            match decode_record(&buf[offset..], offset as u64) {
                Ok((record, consumed)) => {
                    records.push(record);
                    offset += consumed;
                }
                Err(e) => {
                    warn!(
                        target: "stowdb::log",
                        path = %path.display(),
                        offset,
                        error = %e,
                        "Log scan stopped before end of file"
                    );
                    break;
                }
            }
        }

        Ok(Recovered {
            records,
            valid_len: offset as u64,
            file_len: buf.len() as u64,
        })
    }

    /// Open existing log or create new one with specified durability mode
    ///
    /// Creates parent directories if they don't exist. If `truncate_to` is
    /// given, the file is cut to that length first (see `Recovered::valid_len`).
    ///
    /// # Errors
    ///
    /// Returns an error if file operations fail.
    pub fn open<P: AsRef<Path>>(
        path: P,
        durability_mode: DurabilityMode,
        truncate_to: Option<u64>,
    ) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        if let Some(len) = truncate_to {
            let file = OpenOptions::new()
                .create(true)
                .truncate(false)
                .write(true)
                .open(&path)?;
            if file.metadata()?.len() > len {
                file.set_len(len)?;
                file.sync_all()?;
            }
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(&path)?;
        let current_offset = file.metadata()?.len();

        Ok(Self {
            path,
            writer: BufWriter::new(file),
            current_offset,
            durability_mode,
            last_fsync: Instant::now(),
            writes_since_fsync: 0,
        })
    }

    /// Append record with durability mode handling
    ///
    /// - Always: fsync after every write
    /// - Standard: fsync after batch_size writes OR interval_ms elapsed
    /// - Cache: flush to the OS only
    ///
    /// Returns the offset the record was written at.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    pub fn append(&mut self, record: &LogRecord) -> Result<u64> {
        let offset = self.current_offset;
        let encoded = encode_record(record)?;

        self.writer.write_all(&encoded).map_err(|e| {
            Error::StoreUnavailable(format!(
                "Failed to write log record at offset {}: {}",
                offset, e
            ))
        })?;
        self.current_offset += encoded.len() as u64;

        match self.durability_mode {
            DurabilityMode::Always => self.fsync()?,
            DurabilityMode::Standard {
                interval_ms,
                batch_size,
            } => {
                self.writes_since_fsync += 1;
                let elapsed = self.last_fsync.elapsed().as_millis() as u64;
                if elapsed >= interval_ms || self.writes_since_fsync >= batch_size {
                    self.fsync()?;
                } else {
                    self.flush()?;
                }
            }
            DurabilityMode::Cache => self.flush()?,
        }

        Ok(offset)
    }

    /// Flush buffered writes to OS buffers
    pub fn flush(&mut self) -> Result<()> {
        self.writer
            .flush()
            .map_err(|e| Error::StoreUnavailable(format!("Failed to flush log: {}", e)))
    }

    /// Force sync to disk (flush + fsync)
    pub fn fsync(&mut self) -> Result<()> {
        self.flush()?;
        self.writer
            .get_mut()
            .sync_all()
            .map_err(|e| Error::StoreUnavailable(format!("Failed to fsync log: {}", e)))?;
        self.writes_since_fsync = 0;
        self.last_fsync = Instant::now();
        Ok(())
    }

    /// Get current file size (offset for next write)
    pub fn size(&self) -> u64 {
        self.current_offset
    }

    /// Get file path
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Get durability mode
    pub fn durability_mode(&self) -> DurabilityMode {
        self.durability_mode
    }
}

impl Drop for Wal {
    fn drop(&mut self) {
        match self.durability_mode {
            DurabilityMode::Cache => {
                let _ = self.flush();
            }
            _ => {
                let _ = self.fsync();
            }
        }
    }
}
