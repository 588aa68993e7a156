/*!
 * Configuration types for permsync
 */

use permsync_core_classifier::MODERN_PERMISSION_VERSION;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{PermSyncError, Result};

/// Engine configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Write JSON logs to this file instead of stdout
    #[serde(default)]
    pub log_file: Option<PathBuf>,

    /// Force debug logging
    #[serde(default)]
    pub verbose: bool,

    /// Bounded queue depth of the async front end
    #[serde(default = "default_event_queue_depth")]
    pub event_queue_depth: usize,

    #[serde(default)]
    pub classifier: ClassifierConfig,

    #[serde(default)]
    pub vpn: VpnConfig,

    #[serde(default)]
    pub batching: BatchingConfig,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::Info,
            log_file: None,
            verbose: false,
            event_queue_depth: default_event_queue_depth(),
            classifier: ClassifierConfig::default(),
            vpn: VpnConfig::default(),
            batching: BatchingConfig::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClassifierConfig {
    /// First platform version that requires the explicit network permission
    #[serde(default = "default_modern_permission_version")]
    pub modern_permission_version: u32,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            modern_permission_version: default_modern_permission_version(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VpnConfig {
    /// Never bind SYSTEM-classified UIDs to a tunnel filter
    #[serde(default)]
    pub exempt_system_uids: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchingConfig {
    /// Merge commands carrying the same value into one multi-UID command
    #[serde(default = "default_true")]
    pub coalesce: bool,
}

impl Default for BatchingConfig {
    fn default() -> Self {
        Self {
            coalesce: default_true(),
        }
    }
}

/// Log level for diagnostic output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// Only errors
    Error,

    /// Warnings and errors
    Warn,

    /// Info, warnings, and errors
    #[default]
    Info,

    /// Debug and above
    Debug,

    /// All messages including traces
    Trace,
}

impl LogLevel {
    /// Convert to tracing::Level
    pub fn to_tracing_level(&self) -> tracing::Level {
        match self {
            LogLevel::Error => tracing::Level::ERROR,
            LogLevel::Warn => tracing::Level::WARN,
            LogLevel::Info => tracing::Level::INFO,
            LogLevel::Debug => tracing::Level::DEBUG,
            LogLevel::Trace => tracing::Level::TRACE,
        }
    }
}

// Default value functions for serde
fn default_true() -> bool {
    true
}

fn default_modern_permission_version() -> u32 {
    MODERN_PERMISSION_VERSION
}

fn default_event_queue_depth() -> usize {
    64
}

impl MonitorConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: MonitorConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            PermSyncError::Config(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&contents)
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| PermSyncError::Config(format!("TOML encode error: {}", e)))?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.classifier.modern_permission_version == 0 {
            return Err(PermSyncError::Config(
                "classifier.modern_permission_version must be positive".to_string(),
            ));
        }
        if self.event_queue_depth == 0 {
            return Err(PermSyncError::Config(
                "event_queue_depth must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}
