//! Modular configuration loader.
//!
//! Supports loading configuration from multiple files:
//! - `config.json` - Base configuration
//! - `learning.json` - Parameter learning section
//! - `networks.json` - Network topology switches
//! - `pipeline.json` - Decision pipeline section
//!
//! Each modular file holds the body of its section and is deep-merged into the
//! matching key of the base configuration.

use anyhow::{Context, Result};
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};

use crate::config::config_dir;

/// Configuration file names
pub const CONFIG_FILES: &[&str] = &[
    "config.json",
    "learning.json",
    "networks.json",
    "pipeline.json",
];

/// Modular file name and the config section it fills.
const SECTION_FILES: &[(&str, &str)] = &[
    ("learning.json", "learning"),
    ("networks.json", "networks"),
    ("pipeline.json", "pipeline"),
];

/// Load a JSON file and return its contents as a Value.
/// Returns None if file doesn't exist.
fn load_json_file(path: &Path) -> Result<Option<Value>> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let value: Value = serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse {}", path.display()))?;

    Ok(Some(value))
}

/// Deep merge two JSON values.
/// Source values override target values, with object merging at each level.
pub fn merge_json(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, source_value) in source_map {
                match target_map.get_mut(&key) {
                    Some(target_value) => merge_json(target_value, source_value),
                    None => {
                        target_map.insert(key, source_value);
                    }
                }
            }
        }
        (target, source) => {
            *target = source;
        }
    }
}

/// Load modular configuration from the config directory.
///
/// Priority (lowest to highest):
/// 1. `config.json`
/// 2. Section files (`learning.json`, `networks.json`, `pipeline.json`)
/// 3. Environment variables (applied separately)
pub fn load_modular_config(dir: Option<PathBuf>) -> Result<Value> {
    let cfg_dir = dir.unwrap_or_else(config_dir);

    let mut config = load_json_file(&cfg_dir.join("config.json"))?
        .unwrap_or(Value::Object(Default::default()));

    tracing::debug!("Loading modular config from {}", cfg_dir.display());

    for (file, section) in SECTION_FILES {
        let Some(body) = load_json_file(&cfg_dir.join(file))? else {
            continue;
        };
        if let Some(config_obj) = config.as_object_mut() {
            match config_obj.get_mut(*section) {
                Some(existing) => merge_json(existing, body),
                None => {
                    config_obj.insert((*section).to_string(), body);
                }
            }
        }
        tracing::debug!("Loaded {}", file);
    }

    Ok(config)
}

/// Check which modular config files exist.
pub fn check_modular_files(dir: Option<PathBuf>) -> Vec<(String, bool)> {
    let cfg_dir = dir.unwrap_or_else(config_dir);

    CONFIG_FILES
        .iter()
        .map(|file| (file.to_string(), cfg_dir.join(file).exists()))
        .collect()
}
