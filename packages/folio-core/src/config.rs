//! Analytics configuration and data locations.

use crate::Result;
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Market-relative assumptions for the cross-sectional risk view.
///
/// A real beta needs a benchmark return series, which this crate does not
/// carry. These defaults stand in until a caller supplies measured values.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct MarketAssumptions {
    pub beta: f64,
    pub alpha: f64,
}

impl Default for MarketAssumptions {
    fn default() -> Self {
        Self {
            beta: 1.0,
            alpha: 0.0,
        }
    }
}

/// Constants used by the performance and risk calculators.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase", default)]
pub struct AnalyticsConfig {
    /// Annual risk-free rate (0.02 = 2%)
    pub risk_free_rate: f64,
    /// Trading days used to annualize daily volatility
    pub trading_days_per_year: f64,
    /// Calendar days per year used to annualize returns
    pub days_per_year: f64,
    /// One-tailed z-score for the parametric VaR (1.65 ≈ 95%)
    pub var_z_score: f64,
    /// Delay before auto-capturing a snapshot after positions change
    pub capture_debounce_ms: i64,
    pub market: MarketAssumptions,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.02,
            trading_days_per_year: 252.0,
            days_per_year: 365.25,
            var_z_score: 1.65,
            capture_debounce_ms: 5_000,
            market: MarketAssumptions::default(),
        }
    }
}

/// Top-level configuration: where data lives and how analytics are computed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FolioConfig {
    #[serde(default = "FolioConfig::default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default)]
    pub analytics: AnalyticsConfig,
}

impl Default for FolioConfig {
    fn default() -> Self {
        Self {
            data_dir: Self::default_data_dir(),
            analytics: AnalyticsConfig::default(),
        }
    }
}

impl FolioConfig {
    /// Get the default data directory.
    ///
    /// Default: `~/.folio`
    /// Can be overridden with the `FOLIO_DATA_DIR` environment variable.
    pub fn default_data_dir() -> PathBuf {
        if let Ok(path) = env::var("FOLIO_DATA_DIR") {
            return PathBuf::from(path);
        }

        directories::BaseDirs::new()
            .map(|dirs| dirs.home_dir().join(".folio"))
            .unwrap_or_else(|| PathBuf::from(".folio"))
    }

    /// Get the config file path.
    ///
    /// `FOLIO_CONFIG_FILE` wins, otherwise `config.json` inside the data directory.
    pub fn default_path() -> PathBuf {
        if let Ok(path) = env::var("FOLIO_CONFIG_FILE") {
            return PathBuf::from(path);
        }
        Self::default_data_dir().join("config.json")
    }

    /// Load configuration from the default path, falling back to defaults.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::default_path())
    }

    /// Load configuration from a specific path. A missing file yields defaults.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!(path = %path.display(), "no config file, using defaults");
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Write configuration to a specific path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_analytics_defaults() {
        let config = AnalyticsConfig::default();
        assert_eq!(config.risk_free_rate, 0.02);
        assert_eq!(config.trading_days_per_year, 252.0);
        assert_eq!(config.var_z_score, 1.65);
        assert_eq!(config.market.beta, 1.0);
    }

    #[test]
    fn test_partial_config_fills_defaults() {
        let config: FolioConfig =
            serde_json::from_str(r#"{"dataDir":"/tmp/folio","analytics":{"riskFreeRate":0.04}}"#)
                .unwrap();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/folio"));
        assert_eq!(config.analytics.risk_free_rate, 0.04);
        assert_eq!(config.analytics.capture_debounce_ms, 5_000);
        assert_eq!(config.analytics.market, MarketAssumptions::default());
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempdir().unwrap();
        let config = FolioConfig::load_from_path(&dir.path().join("nope.json")).unwrap();
        assert_eq!(config.analytics, AnalyticsConfig::default());
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested/config.json");

        let mut config = FolioConfig {
            data_dir: dir.path().to_path_buf(),
            ..Default::default()
        };
        config.analytics.market.beta = 1.2;
        config.save_to_path(&path).unwrap();

        let loaded = FolioConfig::load_from_path(&path).unwrap();
        assert_eq!(loaded, config);
    }
}
