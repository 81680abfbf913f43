//! Configuration for BasaltKV
//!
//! Centralized configuration with sensible defaults.

use std::path::{Path, PathBuf};

/// Main configuration for a BasaltKV instance
#[derive(Debug, Clone)]
pub struct Config {
    // -------------------------------------------------------------------------
    // Storage Configuration
    // -------------------------------------------------------------------------
    /// Directory for all segment files
    pub data_dir: PathBuf,

    /// Max approximate size of the active memtable before rotation (in bytes)
    pub memtable_size_limit: usize,

    /// Segment count at which compaction is triggered
    pub max_segment_count: usize,

    // -------------------------------------------------------------------------
    // Network Configuration
    // -------------------------------------------------------------------------
    /// TCP listen address
    pub listen_addr: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            memtable_size_limit: 32 * 1024 * 1024, // 32 MiB
            max_segment_count: 100,
            listen_addr: "127.0.0.1:9001".to_string(),
        }
    }
}

impl Config {
    /// Create a new config builder
    pub fn builder() -> ConfigBuilder {
        ConfigBuilder::default()
    }
}

/// Builder for Config
#[derive(Default)]
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    /// Set the data directory
    pub fn data_dir<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.config.data_dir = path.as_ref().to_path_buf();
        self
    }

    /// Set the memtable rotation threshold in bytes
    pub fn memtable_size_limit(mut self, bytes: usize) -> Self {
        self.config.memtable_size_limit = bytes;
        self
    }

    /// Set the segment count that triggers compaction
    pub fn max_segment_count(mut self, count: usize) -> Self {
        self.config.max_segment_count = count;
        self
    }

    /// Set the TCP listen address
    pub fn listen_addr<S: Into<String>>(mut self, addr: S) -> Self {
        self.config.listen_addr = addr.into();
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}
