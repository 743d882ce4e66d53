//! TOML configuration for an inspection session
//!
//! Every section and key is optional; missing values take the defaults below.
//!
//! ```toml
//! [session]
//! storage_key = "elevatorInspection"
//! autosave_interval_secs = 10
//! save_debounce_ms = 250
//! repair_resave_delay_ms = 500
//!
//! [report]
//! title = "ÉTAT DES LIEUX ASCENSEUR"
//! yes_label = "Oui"
//! no_label = "Non"
//! footer = "Fin du rapport"
//!
//! [store]
//! quota_bytes = 5242880
//! ```

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse TOML configuration: {0}")]
    Parse(#[from] toml::de::Error),
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InspectionConfig {
    #[serde(default)]
    pub session: SessionConfig,
    #[serde(default)]
    pub report: ReportConfig,
    #[serde(default)]
    pub store: StoreConfig,
}

impl InspectionConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_str(&content)
    }

    #[allow(clippy::should_implement_trait)]
    pub fn from_str(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }
}

/// Persistence and autosave timing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Session store key holding the snapshot
    pub storage_key: String,
    /// Periodic save interval (default: 10)
    pub autosave_interval_secs: u64,
    /// Window in which save requests are coalesced into one write (default: 250)
    pub save_debounce_ms: u64,
    /// Delay before re-saving a snapshot that lost photos during repair (default: 500)
    pub repair_resave_delay_ms: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            storage_key: "elevatorInspection".to_string(),
            autosave_interval_secs: 10,
            save_debounce_ms: 250,
            repair_resave_delay_ms: 500,
        }
    }
}

impl SessionConfig {
    pub fn autosave_interval(&self) -> Duration {
        Duration::from_secs(self.autosave_interval_secs.max(1))
    }

    pub fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    pub fn repair_resave_delay(&self) -> Duration {
        Duration::from_millis(self.repair_resave_delay_ms)
    }
}

/// Report wording
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReportConfig {
    pub title: String,
    pub yes_label: String,
    pub no_label: String,
    pub footer: String,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            title: "ÉTAT DES LIEUX ASCENSEUR".to_string(),
            yes_label: "Oui".to_string(),
            no_label: "Non".to_string(),
            footer: "Fin du rapport".to_string(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Maximum size of a stored value in bytes; unlimited when unset
    pub quota_bytes: Option<usize>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = InspectionConfig::from_str("").unwrap();
        assert_eq!(config, InspectionConfig::default());
        assert_eq!(config.session.storage_key, "elevatorInspection");
        assert_eq!(config.session.autosave_interval(), Duration::from_secs(10));
    }

    #[test]
    fn test_partial_sections() {
        let toml = r#"
            [session]
            autosave_interval_secs = 30

            [store]
            quota_bytes = 1024
        "#;
        let config = InspectionConfig::from_str(toml).unwrap();
        assert_eq!(config.session.autosave_interval_secs, 30);
        assert_eq!(config.session.storage_key, "elevatorInspection");
        assert_eq!(config.store.quota_bytes, Some(1024));
        assert_eq!(config.report.yes_label, "Oui");
    }

    #[test]
    fn test_malformed_toml() {
        assert!(matches!(
            InspectionConfig::from_str("[session\nstorage_key = 1"),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn test_missing_file() {
        let err = InspectionConfig::from_file("/nonexistent/inspection.toml").unwrap_err();
        assert!(err.to_string().contains("/nonexistent/inspection.toml"));
    }
}
