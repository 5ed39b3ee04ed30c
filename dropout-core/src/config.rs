//! Configuration file support
//!
//! Loads deployment-specific configuration from JSON files.
//!
//! Search order:
//! 1. Explicit path (--config CLI flag)
//! 2. `.dropoutrc.json` in the working directory
//! 3. `dropout.config.json` in the working directory
//!
//! All fields are optional. Weights and risk-level thresholds are fixed and
//! cannot be configured; only the local-currency income bands can.

use crate::assessment::RiskScorer;
use crate::risk::IncomeBands;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Configuration loaded from a JSON config file
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DropoutConfig {
    /// Custom income bands in local currency units
    #[serde(default)]
    pub income_bands: Option<IncomeBandConfig>,

    /// Currency label shown in text output (e.g. "BDT")
    #[serde(default)]
    pub currency: Option<String>,
}

/// Custom income bands; unset fields keep their defaults
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct IncomeBandConfig {
    /// Extreme-poverty normalization floor (default: 5000)
    pub extreme_floor: Option<f64>,
    /// Lower edge of the low-income band (default: 12000)
    pub low_floor: Option<f64>,
    /// Lower edge of the adequate-income band (default: 20000)
    pub mid_floor: Option<f64>,
    /// Normalization cap (default: 50000)
    pub cap: Option<f64>,
}

/// Resolved configuration ready for use
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedConfig {
    pub income_bands: IncomeBands,
    pub currency: Option<String>,
    /// Path the config was loaded from (None if defaults)
    pub config_path: Option<PathBuf>,
}

impl DropoutConfig {
    fn bands(&self) -> IncomeBands {
        let defaults = IncomeBands::default();
        match &self.income_bands {
            Some(b) => IncomeBands {
                extreme_floor: b.extreme_floor.unwrap_or(defaults.extreme_floor),
                low_floor: b.low_floor.unwrap_or(defaults.low_floor),
                mid_floor: b.mid_floor.unwrap_or(defaults.mid_floor),
                cap: b.cap.unwrap_or(defaults.cap),
            },
            None => defaults,
        }
    }

    /// Validate the configuration for logical errors
    pub fn validate(&self) -> Result<()> {
        self.bands().validate()?;

        if let Some(ref currency) = self.currency {
            if currency.trim().is_empty() {
                anyhow::bail!("currency must not be empty");
            }
        }

        Ok(())
    }

    /// Resolve config into the form used by the scorer
    pub fn resolve(&self) -> Result<ResolvedConfig> {
        self.validate()?;
        Ok(ResolvedConfig {
            income_bands: self.bands(),
            currency: self.currency.clone(),
            config_path: None,
        })
    }
}

impl ResolvedConfig {
    /// Build a ResolvedConfig with all defaults (no config file)
    pub fn defaults() -> Result<Self> {
        DropoutConfig::default().resolve()
    }

    /// Scorer configured with these bands
    pub fn scorer(&self) -> Result<RiskScorer> {
        RiskScorer::with_bands(self.income_bands)
    }
}

/// Discover and load a config file from a directory
///
/// Returns `None` if no config file is found (use defaults).
pub fn discover_config(dir: &Path) -> Result<Option<(DropoutConfig, PathBuf)>> {
    for name in [".dropoutrc.json", "dropout.config.json"] {
        let path = dir.join(name);
        if path.exists() {
            let config = load_config_file(&path)?;
            return Ok(Some((config, path)));
        }
    }
    Ok(None)
}

/// Load config from an explicit file path
pub fn load_config_file(path: &Path) -> Result<DropoutConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file: {}", path.display()))?;

    let config: DropoutConfig = serde_json::from_str(&content)
        .with_context(|| format!("failed to parse config file: {}", path.display()))?;

    config
        .validate()
        .with_context(|| format!("invalid config in: {}", path.display()))?;

    Ok(config)
}

/// Load and resolve config
///
/// If `config_path` is provided, loads from that file.
/// Otherwise, discovers config in `dir`.
/// Returns default config if nothing is found.
pub fn load_and_resolve(dir: &Path, config_path: Option<&Path>) -> Result<ResolvedConfig> {
    let (config, source_path) = if let Some(path) = config_path {
        let config = load_config_file(path)?;
        (config, Some(path.to_path_buf()))
    } else {
        match discover_config(dir)? {
            Some((config, path)) => (config, Some(path)),
            None => (DropoutConfig::default(), None),
        }
    };

    let mut resolved = config.resolve()?;
    resolved.config_path = source_path;
    Ok(resolved)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_default_config_is_valid() {
        let config = DropoutConfig::default();
        config.validate().expect("default config should be valid");
        let resolved = config.resolve().expect("default config should resolve");
        assert_eq!(resolved.income_bands, IncomeBands::default());
        assert!(resolved.currency.is_none());
    }

    #[test]
    fn test_parse_minimal_config() {
        let config: DropoutConfig = serde_json::from_str("{}").unwrap();
        config.validate().unwrap();
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            "income_bands": {
                "extreme_floor": 50,
                "low_floor": 120,
                "mid_floor": 200,
                "cap": 500
            },
            "currency": "USD"
        }"#;
        let config: DropoutConfig = serde_json::from_str(json).unwrap();
        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.income_bands.low_floor, 120.0);
        assert_eq!(resolved.income_bands.cap, 500.0);
        assert_eq!(resolved.currency.as_deref(), Some("USD"));
    }

    #[test]
    fn test_reject_unknown_fields() {
        let result: Result<DropoutConfig, _> = serde_json::from_str(r#"{"weights": {}}"#);
        assert!(result.is_err(), "weights are fixed and must be rejected");
    }

    #[test]
    fn test_reject_unordered_bands() {
        let json = r#"{"income_bands": {"low_floor": 30000}}"#;
        let config: DropoutConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reject_negative_band() {
        let json = r#"{"income_bands": {"extreme_floor": -1}}"#;
        let config: DropoutConfig = serde_json::from_str(json).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_reject_empty_currency() {
        let config: DropoutConfig = serde_json::from_str(r#"{"currency": "  "}"#).unwrap();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_bands_use_defaults_for_rest() {
        let json = r#"{"income_bands": {"cap": 80000}}"#;
        let config: DropoutConfig = serde_json::from_str(json).unwrap();
        let resolved = config.resolve().unwrap();
        assert_eq!(resolved.income_bands.extreme_floor, 5000.0); // default
        assert_eq!(resolved.income_bands.low_floor, 12000.0); // default
        assert_eq!(resolved.income_bands.mid_floor, 20000.0); // default
        assert_eq!(resolved.income_bands.cap, 80000.0);
    }

    #[test]
    fn test_discover_dropoutrc() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join(".dropoutrc.json");
        fs::write(&config_path, r#"{"currency": "BDT"}"#).unwrap();

        let (config, path) = discover_config(dir.path()).unwrap().unwrap();
        assert_eq!(config.currency.as_deref(), Some("BDT"));
        assert_eq!(path, config_path);
    }

    #[test]
    fn test_discover_priority_order() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".dropoutrc.json"), r#"{"currency": "A"}"#).unwrap();
        fs::write(dir.path().join("dropout.config.json"), r#"{"currency": "B"}"#).unwrap();

        let (config, _) = discover_config(dir.path()).unwrap().unwrap();
        assert_eq!(
            config.currency.as_deref(),
            Some("A"),
            ".dropoutrc.json should take priority"
        );
    }

    #[test]
    fn test_no_config_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(discover_config(dir.path()).unwrap().is_none());
    }

    #[test]
    fn test_invalid_file_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("dropout.config.json");
        fs::write(&config_path, r#"{"income_bands": {"mid_floor": 1}}"#).unwrap();

        let err = load_config_file(&config_path).unwrap_err();
        assert!(format!("{:#}", err).contains("invalid config in"));
    }

    #[test]
    fn test_load_and_resolve_explicit_path() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("custom.json");
        fs::write(&config_path, r#"{"income_bands": {"cap": 60000}}"#).unwrap();

        let resolved = load_and_resolve(dir.path(), Some(&config_path)).unwrap();
        assert_eq!(resolved.income_bands.cap, 60000.0);
        assert_eq!(resolved.config_path, Some(config_path));
        assert_eq!(resolved.scorer().unwrap().bands().cap, 60000.0);
    }

    #[test]
    fn test_load_and_resolve_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = load_and_resolve(dir.path(), None).unwrap();
        assert!(resolved.config_path.is_none());
        assert_eq!(resolved, ResolvedConfig::defaults().unwrap());
    }
}
