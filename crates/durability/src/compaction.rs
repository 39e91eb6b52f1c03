//! Log compaction
//!
//! Overwrites and deletes leave dead records behind in the log. Compaction
//! rewrites the log so it holds exactly one `Put` per live entry.
//!
//! # Algorithm
//!
//! 1. Write every live entry to `<log>.compact` as `Put` records
//! 2. fsync the temporary file
//! 3. Rename it over the log
//! 4. fsync the parent directory so the rename itself is durable
//!
//! A crash before step 3 leaves the original log untouched; the stale
//! temporary file is overwritten by the next compaction.

use crate::encoding::encode_record;
use crate::wal::LogRecord;
use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};
use stowdb_core::error::Result;
use tracing::info;

/// Information about a finished compaction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CompactionInfo {
    /// Live entries written to the new log
    pub records_written: usize,
    /// Log size before compaction
    pub bytes_before: u64,
    /// Log size after compaction
    pub bytes_after: u64,
}

impl CompactionInfo {
    /// Bytes reclaimed (zero if the log grew)
    pub fn reclaimed_bytes(&self) -> u64 {
        self.bytes_before.saturating_sub(self.bytes_after)
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut name = path.as_os_str().to_owned();
    name.push(".compact");
    PathBuf::from(name)
}

/// Rewrite the log at `path` to contain only `entries`
///
/// The caller must hold off appends for the duration and reopen its log
/// handle afterwards.
///
/// # Errors
///
/// Returns an error if writing, syncing or renaming fails. On error the
/// original log is left in place.
pub fn rewrite_log<'a, I>(path: &Path, entries: I) -> Result<CompactionInfo>
where
    I: IntoIterator<Item = (&'a [u8], &'a [u8])>,
{
    let bytes_before = std::fs::metadata(path).map(|m| m.len()).unwrap_or(0);
    let tmp = temp_path(path);

    let mut records_written = 0;
    {
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(&tmp)?;
        let mut writer = BufWriter::new(file);
        for (key, value) in entries {
            let record = LogRecord::Put {
                key: key.to_vec(),
                value: value.to_vec(),
            };
            writer.write_all(&encode_record(&record)?)?;
            records_written += 1;
        }
        writer.flush()?;
        writer.get_ref().sync_all()?;
    }

    std::fs::rename(&tmp, path)?;
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            // Not every platform can fsync a directory
            if let Ok(dir) = File::open(parent) {
                let _ = dir.sync_all();
            }
        }
    }

    let bytes_after = std::fs::metadata(path)?.len();
    let compaction = CompactionInfo {
        records_written,
        bytes_before,
        bytes_after,
    };

    info!(
        target: "stowdb::log",
        path = %path.display(),
        records = compaction.records_written,
        bytes_reclaimed = compaction.reclaimed_bytes(),
        "Log compaction completed"
    );

    Ok(compaction)
}
