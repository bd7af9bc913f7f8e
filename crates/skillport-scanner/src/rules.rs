//! Scan rule definitions and custom rules configuration.
//!
//! A rule is a value: regex pattern plus metadata plus an optional pure
//! filter over `(match, line)`. Detectors are named collections of rules;
//! there is no inheritance anywhere in this engine.

use crate::types::{Category, Severity};
use anyhow::{Context, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Secondary check applied after the regex matches. Receives the matched
/// text and the full line; the issue is emitted only if it returns true.
pub type RuleFilter = fn(&str, &str) -> bool;

#[derive(Debug, Clone)]
pub struct ScanRule {
    pub id: String,
    pub category: Category,
    pub severity: Severity,
    pub pattern: String,
    pub message: String,
    pub remediation: Option<String>,
    pub filter: Option<RuleFilter>,
}

impl ScanRule {
    pub fn new(
        id: &str,
        category: Category,
        severity: Severity,
        pattern: &str,
        message: &str,
    ) -> Self {
        Self {
            id: id.to_string(),
            category,
            severity,
            pattern: pattern.to_string(),
            message: message.to_string(),
            remediation: None,
            filter: None,
        }
    }

    pub fn with_remediation(mut self, remediation: &str) -> Self {
        self.remediation = Some(remediation.to_string());
        self
    }

    pub fn with_filter(mut self, filter: RuleFilter) -> Self {
        self.filter = Some(filter);
        self
    }

    pub fn compile(&self) -> Result<Regex> {
        Regex::new(&self.pattern)
            .with_context(|| format!("Failed to compile regex for rule '{}'", self.id))
    }
}

/// A custom rule as authored in `.skillport-rules.yaml`. Custom rules are
/// regex-only; filters exist only on built-in rules.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CustomRule {
    pub id: String,
    pub pattern: String,
    pub category: Category,
    pub severity: Severity,
    pub message: String,
    #[serde(default)]
    pub remediation: Option<String>,
}

impl CustomRule {
    pub fn into_rule(self) -> ScanRule {
        ScanRule {
            id: self.id,
            category: self.category,
            severity: self.severity,
            pattern: self.pattern,
            message: self.message,
            remediation: self.remediation,
            filter: None,
        }
    }
}

/// Scanner configuration, loadable from a YAML file next to the scanned
/// content.
///
/// ```yaml
/// # .skillport-rules.yaml
/// use_default_rules: true
/// disabled_rules:
///   - NET004
/// rules:
///   - id: ORG001
///     pattern: "internal\\.corp\\.example"
///     category: network
///     severity: high
///     message: "References an internal host"
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct RulesConfig {
    #[serde(default)]
    pub rules: Vec<CustomRule>,
    #[serde(default)]
    pub disabled_rules: Vec<String>,
    #[serde(default = "default_use_defaults")]
    pub use_default_rules: bool,
}

fn default_use_defaults() -> bool {
    true
}

pub const CONFIG_FILE_NAMES: &[&str] = &[".skillport-rules.yaml", ".skillport-rules.yml"];

impl RulesConfig {
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read rules config: {}", path.display()))?;
        serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse rules config: {}", path.display()))
    }

    /// Look for a rules file in the given directory; defaults otherwise.
    pub fn load_or_default(dir: Option<&Path>) -> Self {
        if let Some(dir) = dir {
            for name in CONFIG_FILE_NAMES {
                let path = dir.join(name);
                if path.exists() {
                    match Self::load_from_file(&path) {
                        Ok(config) => return config,
                        Err(e) => tracing::warn!("{:#}", e),
                    }
                }
            }
        }
        Self::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rules_config_yaml() {
        let yaml = r#"
use_default_rules: false
disabled_rules: [NET004]
rules:
  - id: ORG001
    pattern: "internal\\.corp"
    category: network
    severity: high
    message: "internal host"
"#;
        let config: RulesConfig = serde_yaml::from_str(yaml).unwrap();
        assert!(!config.use_default_rules);
        assert_eq!(config.disabled_rules, vec!["NET004".to_string()]);
        assert_eq!(config.rules.len(), 1);
        let rule = config.rules[0].clone().into_rule();
        assert_eq!(rule.severity, Severity::High);
        assert!(rule.compile().is_ok());
    }

    #[test]
    fn test_load_or_default_without_file() {
        let config = RulesConfig::load_or_default(None);
        assert!(config.use_default_rules);
        assert!(config.rules.is_empty());
    }
}
