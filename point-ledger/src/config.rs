//! Configuration for the point ledger

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Ledger configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Data directory for RocksDB
    pub data_dir: PathBuf,

    /// Service name
    pub service_name: String,

    /// Service version
    pub service_version: String,

    /// Point policy configuration
    pub point: PointPolicyConfig,

    /// RocksDB configuration
    pub rocksdb: RocksDbConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data/point-ledger"),
            service_name: "point-ledger".to_string(),
            service_version: env!("CARGO_PKG_VERSION").to_string(),
            point: PointPolicyConfig::default(),
            rocksdb: RocksDbConfig::default(),
        }
    }
}

/// Point policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PointPolicyConfig {
    /// Ledger switched on at all; when false every grant/spend is a no-op
    pub enabled: bool,

    /// Default credit lifetime in days; 0 disables expiration entirely
    pub term_days: u32,
}

impl Default for PointPolicyConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            term_days: 0, // No expiration unless configured
        }
    }
}

/// RocksDB configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RocksDbConfig {
    /// Write buffer size (MB)
    pub write_buffer_size_mb: usize,

    /// Max write buffers
    pub max_write_buffer_number: i32,

    /// Target file size (MB)
    pub target_file_size_mb: u64,

    /// Max background jobs (compaction + flush)
    pub max_background_jobs: i32,

    /// Level 0 file num compaction trigger
    pub level0_file_num_compaction_trigger: i32,

    /// Enable statistics
    pub enable_statistics: bool,
}

impl Default for RocksDbConfig {
    fn default() -> Self {
        Self {
            write_buffer_size_mb: 64,
            max_write_buffer_number: 4,
            target_file_size_mb: 64,
            max_background_jobs: 4,
            level0_file_num_compaction_trigger: 4,
            enable_statistics: false,
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(data_dir) = std::env::var("POINT_LEDGER_DATA_DIR") {
            config.data_dir = PathBuf::from(data_dir);
        }

        if let Ok(enabled) = std::env::var("POINT_LEDGER_ENABLED") {
            config.point.enabled = enabled != "0" && enabled.to_lowercase() != "false";
        }

        if let Ok(term) = std::env::var("POINT_LEDGER_TERM_DAYS") {
            config.point.term_days = term
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid POINT_LEDGER_TERM_DAYS: {}", e)))?;
        }

        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.service_name, "point-ledger");
        assert!(config.point.enabled);
        assert_eq!(config.point.term_days, 0);
    }

    #[test]
    fn test_parse_toml() {
        let toml = r#"
            data_dir = "/tmp/ledger"
            service_name = "point-ledger"
            service_version = "0.1.0"

            [point]
            enabled = true
            term_days = 30

            [rocksdb]
            write_buffer_size_mb = 8
            max_write_buffer_number = 2
            target_file_size_mb = 8
            max_background_jobs = 2
            level0_file_num_compaction_trigger = 4
            enable_statistics = false
        "#;

        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.point.term_days, 30);
        assert_eq!(config.rocksdb.write_buffer_size_mb, 8);
    }
}
