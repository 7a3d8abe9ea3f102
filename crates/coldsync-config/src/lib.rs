//! Configuration management for coldsync
//!
//! Settings are layered: built-in defaults, then an optional YAML or TOML
//! file, then `COLDSYNC__SECTION__KEY` environment variables. Command-line
//! flags are applied on top by the binary.
//!
//! # Examples
//!
//! ```rust
//! use coldsync_config::ConfigBuilder;
//!
//! let config = ConfigBuilder::new()
//!     .add_defaults()
//!     .add_source_file("coldsync.yaml")
//!     .add_env_prefix("COLDSYNC")
//!     .build()
//!     .expect("Failed to load configuration");
//!
//! println!("Workers: {}", config.transfer.workers.get());
//! ```

#![warn(missing_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

use coldsync_types::{BufferSize, CompressionLevel, RestoreTier, StorageClass, ThreadCount};
use serde::{Deserialize, Serialize};

pub mod builder;
pub mod error;
pub mod loader;

pub use builder::ConfigBuilder;
pub use error::{ConfigError, ConfigResult};
pub use loader::ConfigLoader;

/// Environment variable prefix
pub const ENV_PREFIX: &str = "COLDSYNC";

/// Separator between the prefix, section and key of an environment variable
pub const ENV_SEPARATOR: &str = "__";

/// Main configuration structure for coldsync
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Transfer scheduling and upload placement
    pub transfer: TransferConfig,
    /// zstd codec settings
    pub compression: CompressionConfig,
    /// Archival restore requests
    pub restore: RestoreConfig,
    /// Remote store connection
    pub store: StoreConfig,
    /// Logging output
    pub logging: LoggingConfig,
}

/// Transfer scheduling and upload placement
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TransferConfig {
    /// Maximum number of concurrent transfers
    pub workers: ThreadCount,
    /// Storage class for flat backups
    pub storage_class: StorageClass,
    /// Storage class for grouped backups
    pub grouped_storage_class: StorageClass,
    /// Warn when one upload's uncompressed payload exceeds this many bytes
    pub memory_warn_bytes: u64,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            workers: ThreadCount::default(),
            storage_class: StorageClass::Glacier,
            grouped_storage_class: StorageClass::Standard,
            memory_warn_bytes: 1024 * 1024 * 1024, // 1GB
        }
    }
}

/// zstd codec settings
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompressionConfig {
    /// Compression level
    pub level: CompressionLevel,
    /// Streaming buffer size
    pub buffer_size: BufferSize,
}

/// Archival restore requests
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RestoreConfig {
    /// How long restored copies stay readable
    pub days: u32,
    /// Retrieval priority
    pub tier: RestoreTier,
}

impl Default for RestoreConfig {
    fn default() -> Self {
        Self {
            days: 2,
            tier: RestoreTier::Standard,
        }
    }
}

/// Remote store connection.
///
/// Credentials are not configured here; the provider's default chain applies.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Region override
    pub region: Option<String>,
    /// Custom endpoint for S3-compatible stores
    pub endpoint_url: Option<String>,
    /// Use path-style addressing
    pub force_path_style: bool,
}

/// Logging output
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level
    pub level: String,
    /// Enable JSON formatting
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_follow_backup_conventions() {
        let config = Config::default();
        assert_eq!(config.transfer.storage_class, StorageClass::Glacier);
        assert_eq!(config.transfer.grouped_storage_class, StorageClass::Standard);
        assert_eq!(config.restore.days, 2);
        assert_eq!(config.restore.tier, RestoreTier::Standard);
        assert_eq!(config.compression.level.get(), CompressionLevel::DEFAULT);
        assert!(config.store.endpoint_url.is_none());
    }

    #[test]
    fn test_yaml_serialization_uses_kebab_case_classes() {
        let yaml = serde_yaml::to_string(&Config::default()).unwrap();
        assert!(yaml.contains("storage_class: glacier"));
        assert!(yaml.contains("tier: standard"));
    }
}
