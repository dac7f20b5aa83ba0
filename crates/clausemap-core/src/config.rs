use crate::error::ClauseMapError;
use crate::extraction::BackendKind;
use crate::locate::matcher::{MatchOptions, DEFAULT_MAX_EXTENSION};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Upper bound accepted for `max_extension`.
pub const MAX_EXTENSION_LIMIT: usize = 1000;

/// What to report for a clause that has no candidate on its page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "policy", rename_all = "snake_case")]
pub enum FallbackPolicy {
    /// Report a zero-sized box at the origin of `page`.
    ZeroBox {
        #[serde(default = "default_fallback_page")]
        page: u32,
    },
    /// Leave the clause out of the positioned output.
    Omit,
}

impl Default for FallbackPolicy {
    fn default() -> Self {
        FallbackPolicy::ZeroBox {
            page: default_fallback_page(),
        }
    }
}

fn default_fallback_page() -> u32 {
    1
}

fn default_max_extension() -> usize {
    DEFAULT_MAX_EXTENSION
}

fn default_parallel() -> bool {
    true
}

/// Settings for a placement run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorConfig {
    /// Fragments a run may grow past its start.
    #[serde(default = "default_max_extension")]
    pub max_extension: usize,
    #[serde(default)]
    pub fallback: FallbackPolicy,
    #[serde(default)]
    pub backend: BackendKind,
    /// Locate clauses on a rayon pool. Output order is unaffected.
    #[serde(default = "default_parallel")]
    pub parallel: bool,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        LocatorConfig {
            max_extension: DEFAULT_MAX_EXTENSION,
            fallback: FallbackPolicy::default(),
            backend: BackendKind::default(),
            parallel: true,
        }
    }
}

impl LocatorConfig {
    pub fn match_options(&self) -> MatchOptions {
        MatchOptions {
            max_extension: self.max_extension,
        }
    }
}

/// Load a locator config from a JSON file.
pub fn load_config(path: &Path) -> Result<LocatorConfig, ClauseMapError> {
    let content = std::fs::read_to_string(path).map_err(|e| ClauseMapError::ConfigLoad {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;
    parse_config(&content, path)
}

/// Parse a locator config from a JSON string.
pub fn parse_config(json: &str, source: &Path) -> Result<LocatorConfig, ClauseMapError> {
    let config: LocatorConfig =
        serde_json::from_str(json).map_err(|e| ClauseMapError::ConfigLoad {
            path: source.to_path_buf(),
            reason: e.to_string(),
        })?;
    validate_config(&config)?;
    Ok(config)
}

/// Parse a locator config from a JSON string (no file path context).
pub fn parse_config_str(json: &str) -> Result<LocatorConfig, ClauseMapError> {
    let config: LocatorConfig = serde_json::from_str(json).map_err(ClauseMapError::Json)?;
    validate_config(&config)?;
    Ok(config)
}

pub fn validate_config(config: &LocatorConfig) -> Result<(), ClauseMapError> {
    if config.max_extension == 0 || config.max_extension > MAX_EXTENSION_LIMIT {
        return Err(ClauseMapError::ConfigInvalid(format!(
            "max_extension must be between 1 and {MAX_EXTENSION_LIMIT}, got {}",
            config.max_extension
        )));
    }

    if let FallbackPolicy::ZeroBox { page: 0 } = config.fallback {
        return Err(ClauseMapError::ConfigInvalid(
            "fallback page numbers start at 1".into(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_object_gives_defaults() {
        let config = parse_config_str("{}").unwrap();
        assert_eq!(config, LocatorConfig::default());
        assert_eq!(config.fallback, FallbackPolicy::ZeroBox { page: 1 });
    }

    #[test]
    fn test_parse_full_config() {
        let json = r#"{
            "max_extension": 20,
            "fallback": { "policy": "omit" },
            "backend": "pdftotext",
            "parallel": false
        }"#;
        let config = parse_config_str(json).unwrap();
        assert_eq!(config.max_extension, 20);
        assert_eq!(config.fallback, FallbackPolicy::Omit);
        assert_eq!(config.backend, BackendKind::Pdftotext);
        assert!(!config.parallel);
        assert_eq!(config.match_options().max_extension, 20);
    }

    #[test]
    fn test_zero_box_page_defaults_to_one() {
        let config = parse_config_str(r#"{ "fallback": { "policy": "zero_box" } }"#).unwrap();
        assert_eq!(config.fallback, FallbackPolicy::ZeroBox { page: 1 });
    }

    #[test]
    fn test_out_of_range_extension_rejected() {
        assert!(parse_config_str(r#"{ "max_extension": 0 }"#).is_err());
        assert!(parse_config_str(r#"{ "max_extension": 5000 }"#).is_err());
    }

    #[test]
    fn test_zero_fallback_page_rejected() {
        let err = parse_config_str(r#"{ "fallback": { "policy": "zero_box", "page": 0 } }"#)
            .unwrap_err();
        assert!(matches!(err, ClauseMapError::ConfigInvalid(_)));
    }

    #[test]
    fn test_unknown_policy_rejected() {
        let err = parse_config_str(r#"{ "fallback": { "policy": "guess" } }"#).unwrap_err();
        assert!(matches!(err, ClauseMapError::Json(_)));
    }

    #[test]
    fn test_load_config_reports_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("locator.json");
        std::fs::write(&path, "{ not json").unwrap();
        match load_config(&path).unwrap_err() {
            ClauseMapError::ConfigLoad { path: p, .. } => assert_eq!(p, path),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_default_round_trips_through_json() {
        let json = serde_json::to_string(&LocatorConfig::default()).unwrap();
        assert_eq!(parse_config_str(&json).unwrap(), LocatorConfig::default());
    }
}
