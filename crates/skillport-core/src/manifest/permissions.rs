//! Permission declarations carried by every manifest.
//!
//! The three sub-records (network, filesystem, exec) are mandatory;
//! integrations are optional per-service levels.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Network access declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "lowercase")]
pub enum NetworkPermission {
    /// No outbound network access.
    None,
    /// Access restricted to the listed domains.
    Allowlist { domains: Vec<String> },
}

impl Default for NetworkPermission {
    fn default() -> Self {
        Self::None
    }
}

/// Filesystem access declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FilesystemPermission {
    #[serde(default)]
    pub read_paths: Vec<String>,
    #[serde(default)]
    pub write_paths: Vec<String>,
}

/// Process execution declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecPermission {
    #[serde(default)]
    pub allowed_commands: Vec<String>,
    /// Whether the skill may spawn an unrestricted shell.
    #[serde(default)]
    pub shell: bool,
}

/// Access level granted to a named integration (e.g. "slack", "github").
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntegrationLevel {
    None,
    Read,
    Write,
    Send,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permissions {
    #[serde(default)]
    pub network: NetworkPermission,
    #[serde(default)]
    pub filesystem: FilesystemPermission,
    #[serde(default)]
    pub exec: ExecPermission,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub integrations: Option<BTreeMap<String, IntegrationLevel>>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_permission_serde_shape() {
        let none: NetworkPermission = serde_json::from_str(r#"{"mode":"none"}"#).unwrap();
        assert_eq!(none, NetworkPermission::None);

        let allow: NetworkPermission =
            serde_json::from_str(r#"{"mode":"allowlist","domains":["api.example.com"]}"#).unwrap();
        assert_eq!(
            allow,
            NetworkPermission::Allowlist {
                domains: vec!["api.example.com".to_string()]
            }
        );
    }

    #[test]
    fn test_permissions_default_is_locked_down() {
        let p = Permissions::default();
        assert_eq!(p.network, NetworkPermission::None);
        assert!(p.filesystem.read_paths.is_empty());
        assert!(p.filesystem.write_paths.is_empty());
        assert!(!p.exec.shell);
        assert!(p.integrations.is_none());
    }
}
