//! Log-backed disk store
//!
//! A `DiskStore` is a directory holding:
//!
//! ```text
//! <dir>/
//! ├── data.log    append-only mutation log
//! ├── .lock       exclusive process lock (fs2)
//! └── stowdb.toml store configuration (owned by the engine)
//! ```
//!
//! Every mutation is appended to the log and then applied to an in-memory
//! `MemoryStore`. Reads are served from the table. On open the log is
//! replayed from the start; a torn or corrupt tail is cut off so that later
//! appends land after the last good record.

use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use stowdb_core::{ByteStore, Error, Result, WriteBatch};
use stowdb_durability::{rewrite_log, CompactionInfo, DurabilityMode, LogRecord, Wal};
use tracing::{debug, info, warn};

use crate::memory::MemoryStore;

/// Name of the mutation log inside the store directory
pub const LOG_FILE_NAME: &str = "data.log";

/// Name of the process lock file inside the store directory
pub const LOCK_FILE_NAME: &str = ".lock";

/// Options for opening a `DiskStore`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DiskOptions {
    /// When appended records are fsynced
    pub durability: DurabilityMode,
    /// Rewrite the log down to live entries on close
    pub compact_on_close: bool,
}

/// Handles held while the store is open
struct OpenLog {
    wal: Wal,
    // Dropping the file releases the lock
    _lock: File,
}

/// Ordered byte store persisted as a mutation log
pub struct DiskStore {
    dir: PathBuf,
    table: MemoryStore,
    log: RwLock<Option<OpenLog>>,
    options: DiskOptions,
}

impl std::fmt::Debug for DiskStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DiskStore")
            .field("dir", &self.dir)
            .field("entries", &self.table.len())
            .field("open", &self.is_open())
            .field("options", &self.options)
            .finish()
    }
}

fn closed() -> Error {
    Error::StoreUnavailable("store is closed".to_string())
}

impl DiskStore {
    /// Open the store in `dir`, creating it if needed
    ///
    /// # Errors
    ///
    /// - `Error::StoreUnavailable` if another handle already holds the lock
    /// - `Error::Io` if the directory or log cannot be created or read
    pub fn open<P: AsRef<Path>>(dir: P, options: DiskOptions) -> Result<Self> {
        let dir = dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&dir)?;

        let lock_path = dir.join(LOCK_FILE_NAME);
        let lock = OpenOptions::new()
            .create(true)
            .truncate(false)
            .read(true)
            .write(true)
            .open(&lock_path)?;
        fs2::FileExt::try_lock_exclusive(&lock).map_err(|_| {
            Error::StoreUnavailable(format!(
                "store at '{}' is already in use by another handle",
                dir.display()
            ))
        })?;

        let log_path = dir.join(LOG_FILE_NAME);
        let recovered = Wal::recover(&log_path)?;
        let table = MemoryStore::new();
        let record_count = recovered.records.len();
        for record in recovered.records.iter().cloned() {
            apply_record(&table, record);
        }

        if recovered.discarded_bytes() > 0 {
            warn!(
                target: "stowdb::disk",
                path = %log_path.display(),
                discarded_bytes = recovered.discarded_bytes(),
                "Truncating unreadable log tail"
            );
        }

        let wal = Wal::open(&log_path, options.durability, Some(recovered.valid_len))?;

        info!(
            target: "stowdb::disk",
            path = %dir.display(),
            records = record_count,
            entries = table.len(),
            durability = options.durability.description(),
            "Disk store opened"
        );

        Ok(Self {
            dir,
            table,
            log: RwLock::new(Some(OpenLog { wal, _lock: lock })),
            options,
        })
    }

    /// Directory the store lives in
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the mutation log
    pub fn log_path(&self) -> PathBuf {
        self.dir.join(LOG_FILE_NAME)
    }

    /// Options the store was opened with
    pub fn options(&self) -> DiskOptions {
        self.options
    }

    /// False once `close` has run
    pub fn is_open(&self) -> bool {
        self.log.read().is_some()
    }

    /// Current size of the log in bytes
    pub fn log_size(&self) -> Result<u64> {
        let guard = self.log.read();
        let open = guard.as_ref().ok_or_else(closed)?;
        Ok(open.wal.size())
    }

    /// Rewrite the log so it holds one record per live entry
    ///
    /// # Errors
    ///
    /// Returns `Error::StoreUnavailable` if the store is closed, or the
    /// underlying I/O error if the rewrite fails.
    pub fn compact(&self) -> Result<CompactionInfo> {
        let mut guard = self.log.write();
        let open = guard.as_mut().ok_or_else(closed)?;
        Self::compact_locked(&self.table, open)
    }

    fn compact_locked(table: &MemoryStore, open: &mut OpenLog) -> Result<CompactionInfo> {
        open.wal.fsync()?;
        let path = open.wal.path().to_path_buf();
        let mode = open.wal.durability_mode();
        let entries = table.snapshot();
        let compaction = rewrite_log(
            &path,
            entries.iter().map(|(k, v)| (k.as_slice(), v.as_slice())),
        )?;
        // The old handle points at the replaced file
        open.wal = Wal::open(&path, mode, None)?;
        Ok(compaction)
    }

    fn append(&self, record: LogRecord) -> Result<()> {
        let mut guard = self.log.write();
        let open = guard.as_mut().ok_or_else(closed)?;
        open.wal.append(&record)?;
        apply_record(&self.table, record);
        Ok(())
    }

    fn ensure_open(&self) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(closed())
        }
    }
}

fn apply_record(table: &MemoryStore, record: LogRecord) {
    match record {
        LogRecord::Put { key, value } => {
            table.apply_ops(vec![stowdb_core::BatchOp::Put { key, value }]);
        }
        LogRecord::Delete { key } => {
            table.apply_ops(vec![stowdb_core::BatchOp::Delete { key }]);
        }
        LogRecord::Batch { ops } => table.apply_ops(ops),
    }
}

impl ByteStore for DiskStore {
    fn get(&self, key: &[u8]) -> Result<Option<Vec<u8>>> {
        self.ensure_open()?;
        self.table.get(key)
    }

    fn contains(&self, key: &[u8]) -> Result<bool> {
        self.ensure_open()?;
        self.table.contains(key)
    }

    fn put(&self, key: &[u8], value: &[u8]) -> Result<()> {
        self.append(LogRecord::Put {
            key: key.to_vec(),
            value: value.to_vec(),
        })
    }

    fn delete(&self, key: &[u8]) -> Result<()> {
        self.ensure_open()?;
        if !self.table.contains(key)? {
            return Ok(());
        }
        self.append(LogRecord::Delete { key: key.to_vec() })
    }

    fn scan_prefix(&self, prefix: &[u8]) -> Result<Vec<(Vec<u8>, Vec<u8>)>> {
        self.ensure_open()?;
        self.table.scan_prefix(prefix)
    }

    fn count_prefix(&self, prefix: &[u8]) -> Result<usize> {
        self.ensure_open()?;
        self.table.count_prefix(prefix)
    }

    /// One log record per batch, so recovery sees all of it or none
    fn write_batch(&self, batch: WriteBatch) -> Result<()> {
        if batch.is_empty() {
            return self.ensure_open();
        }
        self.append(LogRecord::from(batch))
    }

    fn flush(&self) -> Result<()> {
        let mut guard = self.log.write();
        let open = guard.as_mut().ok_or_else(closed)?;
        open.wal.fsync()
    }

    fn close(&self) -> Result<()> {
        let mut guard = self.log.write();
        let Some(mut open) = guard.take() else {
            debug!(target: "stowdb::disk", path = %self.dir.display(), "Close on closed store");
            return Ok(());
        };

        open.wal.fsync()?;
        if self.options.compact_on_close {
            Self::compact_locked(&self.table, &mut open)?;
        }
        drop(open);
        self.table.clear();

        info!(target: "stowdb::disk", path = %self.dir.display(), "Disk store closed");
        Ok(())
    }
}
