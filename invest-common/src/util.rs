//! Utility functions shared by the INVEST crates.

use serde::de::DeserializeOwned;
use std::fs;
use std::path::Path;

use crate::error::{Error, Result, ResultExt};

/// Normalize a label or column token for comparison.
///
/// Trims, lowercases, and drops every character that is not alphanumeric, so
/// `"Fair Value"`, `"fair_value"` and `"FairValue"` compare equal.
pub fn normalize_token(s: &str) -> String {
    s.trim()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}

/// Case-insensitive label match after normalization.
pub fn tokens_match(a: &str, b: &str) -> bool {
    normalize_token(a) == normalize_token(b)
}

/// Parse a boolean flag as written in environment variables.
pub fn parse_flag(s: &str) -> Result<bool> {
    match s.trim().to_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(Error::InvalidInput(format!("Invalid flag value: {other}"))),
    }
}

/// Read and deserialize a JSON file.
pub fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T> {
    let content =
        fs::read_to_string(path).context(format!("Failed to read {}", path.display()))?;
    serde_json::from_str(&content).context(format!("Failed to parse {}", path.display()))
}

/// Format a probability vector with fixed precision for log output.
pub fn format_distribution(values: &[f64]) -> String {
    let parts: Vec<String> = values.iter().map(|v| format!("{v:.5}")).collect();
    format!("[{}]", parts.join(", "))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_token() {
        assert_eq!(normalize_token("  FairValue "), "fairvalue");
        assert_eq!(normalize_token("Fair Value"), "fairvalue");
        assert_eq!(normalize_token("PE_Relative-Market"), "perelativemarket");
        assert_eq!(normalize_token(""), "");
    }

    #[test]
    fn test_tokens_match() {
        assert!(tokens_match("EqualTo", "equalto"));
        assert!(tokens_match("InflationPlus", "inflation plus"));
        assert!(!tokens_match("Above", "Below"));
    }

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true").unwrap());
        assert!(parse_flag(" ON ").unwrap());
        assert!(!parse_flag("0").unwrap());
        assert!(parse_flag("maybe").unwrap_err().is_invalid_input());
    }

    #[test]
    fn test_format_distribution() {
        assert_eq!(format_distribution(&[0.5, 0.25]), "[0.50000, 0.25000]");
        assert_eq!(format_distribution(&[]), "[]");
    }

    #[test]
    fn test_read_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("rows.json");
        std::fs::write(&path, r#"[{"RelDE": "Below"}]"#).unwrap();
        let value: serde_json::Value = read_json(&path).unwrap();
        assert_eq!(value[0]["RelDE"], "Below");

        let missing = read_json::<serde_json::Value>(&dir.path().join("none.json")).unwrap_err();
        assert!(missing.to_string().starts_with("Failed to read"));

        std::fs::write(&path, "not json").unwrap();
        let bad = read_json::<serde_json::Value>(&path).unwrap_err();
        assert!(bad.to_string().starts_with("Failed to parse"));
    }
}
