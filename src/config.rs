//! Configuration management for the pattern detector
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (pattern-detect.toml)
//! - Environment variables (PATTERN_DETECT__*)
//!
//! ## Example config file (pattern-detect.toml):
//! ```toml
//! [search]
//! deduplicate = true
//! absorb_inheritance_siblings = true
//!
//! [feedback]
//! include_pattern_notes = true
//! record_bindings = false
//!
//! [[rules.extra]]
//! scope = "node"
//! topic = "visibility"
//! operator = "equal"
//! ```

use config_crate::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};

use crate::compare::{resolve, RuleSpec};
use crate::error::Result;
use crate::search::SearchOptions;

/// Main configuration for the detector
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DetectorConfig {
    /// Search settings
    #[serde(default)]
    pub search: SearchConfig,

    /// Feedback settings
    #[serde(default)]
    pub feedback: FeedbackConfig,

    /// Rules added to every loaded pattern
    #[serde(default)]
    pub rules: RulesConfig,
}

/// Search configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Report one solution per bound system-node set
    #[serde(default = "default_true")]
    pub deduplicate: bool,

    /// Let a multi-child inheritance edge bind every compatible child
    #[serde(default = "default_true")]
    pub absorb_inheritance_siblings: bool,
}

/// Feedback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedbackConfig {
    #[serde(default = "default_true")]
    pub include_pattern_notes: bool,

    /// Add a MATCH naming the bound role for each solution entity
    #[serde(default = "default_true")]
    pub record_bindings: bool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RulesConfig {
    #[serde(default)]
    pub extra: Vec<RuleSpec>,
}

fn default_true() -> bool {
    true
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            deduplicate: true,
            absorb_inheritance_siblings: true,
        }
    }
}

impl Default for FeedbackConfig {
    fn default() -> Self {
        Self {
            include_pattern_notes: true,
            record_bindings: true,
        }
    }
}

impl DetectorConfig {
    /// Load configuration, layering an explicit file over the defaults
    pub fn load_from(config_path: Option<&str>) -> std::result::Result<Self, ConfigError> {
        let mut builder = Config::builder();

        let config_locations = [
            "pattern-detect.toml",
            ".pattern-detect.toml",
            "config/pattern-detect.toml",
        ];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "patterns", "pattern-detect") {
            let xdg_config = config_dir.config_dir().join("pattern-detect.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // PATTERN_DETECT__SEARCH__DEDUPLICATE=false
        builder = builder.add_source(
            Environment::with_prefix("PATTERN_DETECT")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        config.try_deserialize()
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }

    /// In-memory options handed to a search
    pub fn search_options(&self) -> SearchOptions {
        SearchOptions {
            deduplicate: self.search.deduplicate,
            absorb_inheritance_siblings: self.search.absorb_inheritance_siblings,
            include_pattern_notes: self.feedback.include_pattern_notes,
            record_bindings: self.feedback.record_bindings,
        }
    }

    /// Check that every extra rule resolves
    pub fn validate(&self) -> Result<()> {
        for rule in &self.rules.extra {
            resolve(rule)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DetectError;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = DetectorConfig::default();
        assert_eq!(config.search_options(), SearchOptions::default());
        assert!(config.rules.extra.is_empty());
    }

    #[test]
    fn test_serialize_config() {
        let config = DetectorConfig::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("[search]"));
        assert!(toml_str.contains("[feedback]"));
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("detect.toml");
        std::fs::write(
            &path,
            r#"
[search]
deduplicate = false

[[rules.extra]]
scope = "node"
topic = "leaf"
operator = "equal"
"#,
        )
        .unwrap();

        let config = DetectorConfig::load_from(path.to_str()).unwrap();
        assert!(!config.search.deduplicate);
        assert!(config.search.absorb_inheritance_siblings);
        assert_eq!(config.rules.extra, vec![RuleSpec::new("node", "leaf", "equal")]);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_save_round_trip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("saved.toml");

        let mut config = DetectorConfig::default();
        config.feedback.record_bindings = false;
        config.rules.extra.push(RuleSpec::new("relation", "types", "equal"));
        config.save(path.to_str().unwrap()).unwrap();

        let loaded = DetectorConfig::load_from(path.to_str()).unwrap();
        assert!(!loaded.feedback.record_bindings);
        assert!(loaded.feedback.include_pattern_notes);
        assert_eq!(loaded.rules.extra, config.rules.extra);
    }

    #[test]
    fn test_validate_rejects_unknown_rule() {
        let mut config = DetectorConfig::default();
        config.rules.extra.push(RuleSpec::new("relation", "weight", "equal"));
        assert!(matches!(config.validate(), Err(DetectError::UnknownRule { .. })));
    }
}
