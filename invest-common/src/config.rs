//! Configuration management for the INVEST decision networks.
//!
//! The workspace shares a configuration directory at `~/.invest/`. The base
//! file is `config.json`; `learning.json`, `networks.json` and `pipeline.json`
//! are merged over it when present (see [`crate::config_loader`]).
//!
//! # Configuration Priority
//!
//! 1. Environment variables (INVEST_* prefix)
//! 2. Modular files
//! 3. `config.json`
//! 4. Default values
//!
//! # Environment Variable Mapping
//!
//! - `INVEST_LOG_LEVEL` → observability.log_level
//! - `INVEST_LOG_FORMAT` → observability.log_format
//! - `INVEST_SCORING` → learning.scoring (mle, bic, mdl)
//! - `INVEST_ABLATION` → pipeline.ablation (v, q, none)
//! - `INVEST_EXTENSION` → networks.systematic_risk_extension

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::config_loader::load_modular_config;
use crate::util::{normalize_token, parse_flag};

/// Get the configuration directory path.
pub fn config_dir() -> PathBuf {
    directories::UserDirs::new().map_or_else(
        || PathBuf::from(".invest"),
        |dirs| dirs.home_dir().join(".invest"),
    )
}

/// Get the configuration file path.
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

// ============================================================================
// Learning Configuration
// ============================================================================

/// Scoring criterion used when re-estimating CPTs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScoringMethod {
    /// Maximum likelihood, no complexity penalty
    Mle,
    /// Bayesian information criterion, 0.5·ln(N) per free parameter
    Bic,
    /// Minimum description length, log2(N) per free parameter
    #[default]
    Mdl,
}

impl ScoringMethod {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Mle => "mle",
            Self::Bic => "bic",
            Self::Mdl => "mdl",
        }
    }
}

impl fmt::Display for ScoringMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ScoringMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "mle" => Ok(Self::Mle),
            "bic" => Ok(Self::Bic),
            "mdl" => Ok(Self::Mdl),
            other => Err(format!("Unknown scoring method: {other}")),
        }
    }
}

/// Parameter learning configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LearningConfig {
    /// Run the learner before screening
    #[serde(default = "default_true")]
    pub enabled: bool,

    /// Scoring criterion
    #[serde(default)]
    pub scoring: ScoringMethod,

    /// Laplace pseudo-count added to every CPT cell
    #[serde(default = "default_laplace_smoothing")]
    pub laplace_smoothing: f64,

    /// EM stops once the log-likelihood change is below this value
    #[serde(default = "default_tolerance")]
    pub tolerance: f64,

    /// EM iteration cap
    #[serde(default = "default_max_iterations")]
    pub max_iterations: usize,

    /// Whether the MDL penalty shifts the estimate (otherwise it only affects the reported score)
    #[serde(default = "default_true")]
    pub mdl_penalty: bool,
}

fn default_true() -> bool {
    true
}

fn default_laplace_smoothing() -> f64 {
    0.01
}

fn default_tolerance() -> f64 {
    1e-4
}

fn default_max_iterations() -> usize {
    100
}

impl Default for LearningConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            scoring: ScoringMethod::default(),
            laplace_smoothing: default_laplace_smoothing(),
            tolerance: default_tolerance(),
            max_iterations: default_max_iterations(),
            mdl_penalty: true,
        }
    }
}

// ============================================================================
// Network Configuration
// ============================================================================

/// Network topology switches.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NetworkConfig {
    /// Add the `SystematicRisk` node to the Quality network
    #[serde(default, alias = "extension")]
    pub systematic_risk_extension: bool,
}

// ============================================================================
// Pipeline Configuration
// ============================================================================

/// Which network the ablation rule replaces the Recommendation network with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AblationTarget {
    /// Recommend from the Value decision alone
    #[serde(rename = "v", alias = "value")]
    Value,
    /// Recommend from the Quality decision alone
    #[serde(rename = "q", alias = "quality")]
    Quality,
}

impl AblationTarget {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Value => "v",
            Self::Quality => "q",
        }
    }
}

impl fmt::Display for AblationTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AblationTarget {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match normalize_token(s).as_str() {
            "v" | "value" => Ok(Self::Value),
            "q" | "quality" => Ok(Self::Quality),
            other => Err(format!("Unknown ablation target: {other}")),
        }
    }
}

/// Decision pipeline configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Replace the Recommendation network with a fixed rule
    #[serde(default)]
    pub ablation: Option<AblationTarget>,

    /// Evaluate batch screening in parallel
    #[serde(default = "default_true")]
    pub parallel: bool,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ablation: None,
            parallel: true,
        }
    }
}

// ============================================================================
// Observability Configuration
// ============================================================================

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level", alias = "level")]
    pub log_level: String,

    /// Log format (json, pretty)
    #[serde(default = "default_log_format", alias = "format")]
    pub log_format: String,
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_format() -> String {
    "pretty".into()
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

// ============================================================================
// Root Configuration
// ============================================================================

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Parameter learning
    #[serde(default)]
    pub learning: LearningConfig,

    /// Network topology switches
    #[serde(default)]
    pub networks: NetworkConfig,

    /// Decision pipeline
    #[serde(default)]
    pub pipeline: PipelineConfig,

    /// Logging
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

impl Config {
    /// Load configuration from the default directory.
    pub fn load() -> Result<Self> {
        let dir = config_dir();
        if !dir.exists() {
            tracing::info!("Config directory not found, using defaults");
            return Ok(Self::default());
        }
        Self::load_dir(&dir)
    }

    /// Load `config.json` plus modular files from a directory.
    pub fn load_dir(dir: &Path) -> Result<Self> {
        let merged = load_modular_config(Some(dir.to_path_buf()))?;
        serde_json::from_value(merged)
            .with_context(|| format!("Failed to parse config from {}", dir.display()))
    }

    /// Load configuration from a specific file.
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {}", path.display()))?;

        serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config from {}", path.display()))
    }

    /// Load configuration with environment variable overrides.
    pub fn load_with_env() -> Result<Self> {
        let mut config = Self::load()?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from an arbitrary key lookup.
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(level) = lookup("INVEST_LOG_LEVEL") {
            self.observability.log_level = level;
        }
        if let Some(format) = lookup("INVEST_LOG_FORMAT") {
            self.observability.log_format = format;
        }

        if let Some(raw) = lookup("INVEST_SCORING") {
            match raw.parse() {
                Ok(scoring) => self.learning.scoring = scoring,
                Err(e) => tracing::warn!(error = %e, "Ignoring INVEST_SCORING"),
            }
        }

        if let Some(raw) = lookup("INVEST_ABLATION") {
            let token = normalize_token(&raw);
            if token.is_empty() || token == "none" || token == "off" {
                self.pipeline.ablation = None;
            } else {
                match raw.parse() {
                    Ok(target) => self.pipeline.ablation = Some(target),
                    Err(e) => tracing::warn!(error = %e, "Ignoring INVEST_ABLATION"),
                }
            }
        }

        if let Some(raw) = lookup("INVEST_EXTENSION") {
            match parse_flag(&raw) {
                Ok(flag) => self.networks.systematic_risk_extension = flag,
                Err(e) => tracing::warn!(error = %e, "Ignoring INVEST_EXTENSION"),
            }
        }
    }

    /// Save configuration to the default path.
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_path())
    }

    /// Save configuration to a specific file, creating parent directories.
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(dir) = path.parent() {
            if !dir.as_os_str().is_empty() && !dir.exists() {
                fs::create_dir_all(dir).with_context(|| {
                    format!("Failed to create config directory {}", dir.display())
                })?;
            }
        }

        let content = serde_json::to_string_pretty(self)?;
        fs::write(path, content)
            .with_context(|| format!("Failed to write config to {}", path.display()))
    }
}
