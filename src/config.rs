//! Monitor configuration
//!
//! TOML configuration for the console monitor, stored in the
//! platform-specific config directory (`fluidlink/monitor.toml`).

use anyhow::{anyhow, Context, Result};
use fluidlink_link::LinkDescriptor;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Console monitor settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MonitorConfig {
    /// Machine to connect to
    pub machine: LinkDescriptor,
    /// Engine tick interval in milliseconds
    pub tick_ms: u64,
    /// How long to wait for the link to establish before giving up,
    /// in milliseconds
    pub connect_timeout_ms: u64,
    /// Interval between printed status lines, in milliseconds
    pub status_print_ms: u64,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            machine: LinkDescriptor::default(),
            tick_ms: 50,
            connect_timeout_ms: 10_000,
            status_print_ms: 1000,
        }
    }
}

impl MonitorConfig {
    /// Platform config file location (`<config dir>/fluidlink/monitor.toml`).
    pub fn default_path() -> Result<PathBuf> {
        let dir = dirs::config_dir().ok_or_else(|| anyhow!("no config directory on this platform"))?;
        Ok(dir.join("fluidlink").join("monitor.toml"))
    }

    /// Load config from a TOML file.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file {}", path.display()))?;
        let config: Self =
            toml::from_str(&content).with_context(|| format!("invalid config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Save config to a TOML file, creating parent directories.
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        self.validate()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        let content = toml::to_string_pretty(self).context("failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("failed to write config file {}", path.display()))?;
        Ok(())
    }

    /// Load from the default location; first run writes defaults there.
    pub fn load_or_default() -> Result<Self> {
        let path = Self::default_path()?;
        if path.exists() {
            Self::load_from_file(&path)
        } else {
            let config = Self::default();
            config.save_to_file(&path)?;
            Ok(config)
        }
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.machine.host.is_empty() {
            return Err(anyhow!("machine host must not be empty"));
        }
        if self.tick_ms == 0 || self.tick_ms > 100 {
            return Err(anyhow!("tick_ms must be in 1..=100"));
        }
        if self.connect_timeout_ms == 0 {
            return Err(anyhow!("connect_timeout_ms must be > 0"));
        }
        Ok(())
    }

    /// Engine tick interval as a duration.
    pub fn tick_interval(&self) -> Duration {
        Duration::from_millis(self.tick_ms)
    }

    /// Link-establishment timeout as a duration.
    pub fn connect_timeout(&self) -> Duration {
        Duration::from_millis(self.connect_timeout_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        MonitorConfig::default().validate().unwrap();
    }

    #[test]
    fn round_trips_through_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("monitor.toml");

        let mut config = MonitorConfig::default();
        config.machine = LinkDescriptor::new("192.168.1.50", 81);
        config.tick_ms = 25;
        config.save_to_file(&path).unwrap();

        let loaded = MonitorConfig::load_from_file(&path).unwrap();
        assert_eq!(loaded.machine, config.machine);
        assert_eq!(loaded.tick_ms, 25);
    }

    #[test]
    fn invalid_tick_rejected() {
        let config = MonitorConfig {
            tick_ms: 500,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(MonitorConfig::load_from_file(Path::new("/nonexistent/monitor.toml")).is_err());
    }
}
