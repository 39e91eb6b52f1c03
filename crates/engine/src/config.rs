//! Store configuration via `stowdb.toml`
//!
//! On first open of a disk store, a default `stowdb.toml` is created in the
//! data directory. To change settings, edit the file and reopen the store.

use serde::{Deserialize, Serialize};
use std::path::Path;
use stowdb_core::{Error, Result};
use stowdb_durability::DurabilityMode;

/// Config file name placed in the store data directory.
pub const CONFIG_FILE_NAME: &str = "stowdb.toml";

/// Store configuration loaded from `stowdb.toml`.
///
/// # Example
///
/// ```toml
/// # "standard" (default), "always" or "cache"
/// durability = "standard"
///
/// # Rewrite the log down to live entries when the store closes
/// compact_on_close = false
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Durability mode: `"standard"`, `"always"` or `"cache"`.
    #[serde(default = "default_durability_str")]
    pub durability: String,
    /// Compact the log on close.
    #[serde(default)]
    pub compact_on_close: bool,
}

fn default_durability_str() -> String {
    "standard".to_string()
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            durability: default_durability_str(),
            compact_on_close: false,
        }
    }
}

impl StoreConfig {
    /// Config with the given durability string and no compaction.
    pub fn with_durability(durability: &str) -> Self {
        Self {
            durability: durability.to_string(),
            ..Self::default()
        }
    }

    /// Parse the durability string into a `DurabilityMode`.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidConfig` for anything other than `"standard"`,
    /// `"always"` or `"cache"`.
    pub fn durability_mode(&self) -> Result<DurabilityMode> {
        match self.durability.as_str() {
            "standard" => Ok(DurabilityMode::standard_default()),
            "always" => Ok(DurabilityMode::Always),
            "cache" => Ok(DurabilityMode::Cache),
            other => Err(Error::InvalidConfig(format!(
                "Invalid durability mode '{}' in {}. Expected \"standard\", \"always\" or \"cache\".",
                other, CONFIG_FILE_NAME
            ))),
        }
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# stowdb store configuration
#
# Durability mode: "standard" (default), "always" or "cache"
#   "standard" = periodic fsync (~100ms), may lose last interval on crash
#   "always"   = fsync every write, zero data loss
#   "cache"    = never fsync, for scratch data
durability = "standard"

# Rewrite the data log down to live entries when the store closes
compact_on_close = false
"#
    }

    /// Read and parse config from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::InvalidConfig(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        let config: StoreConfig = toml::from_str(&content).map_err(|e| {
            Error::InvalidConfig(format!(
                "Failed to parse config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        // Validate the durability value eagerly
        config.durability_mode()?;
        Ok(config)
    }

    /// Write the default config file if it does not already exist.
    pub fn write_default_if_missing(path: &Path) -> Result<()> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml())?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::InvalidConfig(format!("Failed to serialize config: {}", e)))?;
        std::fs::write(path, content)?;
        Ok(())
    }
}
