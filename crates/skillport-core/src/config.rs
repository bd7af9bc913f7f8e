//! Persisted CLI configuration and environment loading.
//!
//! `config.json` lives under the config dir at mode 0o600; the marketplace
//! URL and token can always be overridden by SKILLPORT_API_URL /
//! SKILLPORT_AUTH_TOKEN.

use crate::paths;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::Path;

pub const DEFAULT_API_URL: &str = "https://api.skillport.dev";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    #[serde(default = "default_api_url")]
    pub api_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub token_expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_key_id: Option<String>,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            auth_token: None,
            token_expires_at: None,
            default_key_id: None,
        }
    }
}

impl CliConfig {
    /// Load from disk; missing or unreadable config is the default config.
    pub fn load() -> Self {
        let path = paths::config_file_path();
        match fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str(&content).unwrap_or_else(|e| {
                tracing::warn!("Ignoring malformed config {}: {}", path.display(), e);
                Self::default()
            }),
            Err(_) => Self::default(),
        }
    }

    pub fn save(&self) -> Result<()> {
        let path = paths::config_file_path();
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config dir: {}", parent.display()))?;
        }
        let data = serde_json::to_string_pretty(self)?;
        fs::write(&path, data)
            .with_context(|| format!("Failed to write config: {}", path.display()))?;
        restrict_permissions(&path)?;
        Ok(())
    }

    /// Marketplace URL: env override wins, then config, then default.
    pub fn effective_api_url(&self) -> String {
        env::var(paths::ENV_API_URL)
            .ok()
            .filter(|v| !v.is_empty())
            .unwrap_or_else(|| self.api_url.clone())
    }

    /// Auth token: env override wins; expired stored tokens are dropped.
    pub fn effective_auth_token(&self) -> Option<String> {
        if let Ok(token) = env::var(paths::ENV_AUTH_TOKEN) {
            if !token.is_empty() {
                return Some(token);
            }
        }
        let token = self.auth_token.clone()?;
        if let Some(expires) = self.token_expires_at {
            if expires <= Utc::now() {
                return None;
            }
        }
        Some(token)
    }
}

/// Owner-only permissions for secret-bearing files. No-op off unix.
pub fn restrict_permissions(path: &Path) -> Result<()> {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = fs::Permissions::from_mode(0o600);
        fs::set_permissions(path, perms)
            .with_context(|| format!("Failed to chmod 600: {}", path.display()))?;
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let cfg = CliConfig::default();
        assert_eq!(cfg.api_url, DEFAULT_API_URL);
        assert!(cfg.auth_token.is_none());
    }

    #[test]
    fn test_expired_token_is_dropped() {
        let cfg = CliConfig {
            auth_token: Some("tok".to_string()),
            token_expires_at: Some(Utc::now() - chrono::Duration::hours(1)),
            ..Default::default()
        };
        // Only meaningful when the env override is absent.
        if env::var(paths::ENV_AUTH_TOKEN).is_err() {
            assert!(cfg.effective_auth_token().is_none());
        }
    }

    #[cfg(unix)]
    #[test]
    fn test_restrict_permissions() {
        use std::os::unix::fs::PermissionsExt;
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("secret");
        fs::write(&path, "x").unwrap();
        restrict_permissions(&path).unwrap();
        let mode = fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
