//! Disk backend
//!
//! Opens a `DiskStore` in a data directory, reading `stowdb.toml` from that
//! directory unless an explicit config was supplied.

use std::path::{Path, PathBuf};

use stowdb_core::{Backend, Result};
use stowdb_storage::{DiskOptions, DiskStore};
use tracing::debug;

use crate::config::{StoreConfig, CONFIG_FILE_NAME};

/// Backend for a store directory on disk
#[derive(Debug, Clone)]
pub struct DiskBackend {
    dir: PathBuf,
    config: Option<StoreConfig>,
}

impl DiskBackend {
    /// Backend that takes its config from `<dir>/stowdb.toml`
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            config: None,
        }
    }

    /// Backend with an explicit config; the config file is ignored
    pub fn with_config<P: AsRef<Path>>(dir: P, config: StoreConfig) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            config: Some(config),
        }
    }

    /// Data directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Config in effect for the next `open`
    ///
    /// Writes the default config file first if the directory has none.
    pub fn resolve_config(&self) -> Result<StoreConfig> {
        if let Some(config) = &self.config {
            return Ok(config.clone());
        }
        std::fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(CONFIG_FILE_NAME);
        StoreConfig::write_default_if_missing(&path)?;
        StoreConfig::from_file(&path)
    }
}

impl Backend for DiskBackend {
    type Store = DiskStore;

    fn open(&self) -> Result<DiskStore> {
        let config = self.resolve_config()?;
        let options = DiskOptions {
            durability: config.durability_mode()?,
            compact_on_close: config.compact_on_close,
        };
        debug!(
            target: "stowdb::store",
            path = %self.dir.display(),
            durability = %config.durability,
            compact_on_close = config.compact_on_close,
            "Opening disk store"
        );
        DiskStore::open(&self.dir, options)
    }

    fn location(&self) -> String {
        self.dir.display().to_string()
    }
}
