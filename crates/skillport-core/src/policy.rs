//! Declarative `.skillportrc` policy.
//!
//! Project scope takes precedence over the user config dir; a missing or
//! malformed file falls through to built-in defaults and is never an error.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

pub const POLICY_FILE_NAME: &str = ".skillportrc";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AutoInstallPolicy {
    #[serde(default = "default_max_risk_score")]
    pub max_risk_score: u32,
    #[serde(default)]
    pub require_platform_sig: bool,
    #[serde(default = "default_max_per_session")]
    pub max_per_session: u32,
}

fn default_max_risk_score() -> u32 {
    30
}

fn default_max_per_session() -> u32 {
    5
}

impl Default for AutoInstallPolicy {
    fn default() -> Self {
        Self {
            max_risk_score: default_max_risk_score(),
            require_platform_sig: false,
            max_per_session: default_max_per_session(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub allowed_hosts: Vec<String>,
    #[serde(default)]
    pub workspace_boundary: bool,
    /// Actions that always need a human in the loop.
    #[serde(default)]
    pub requires_approval: Vec<String>,
    #[serde(default)]
    pub auto_install: AutoInstallPolicy,
}

/// `.skillportrc` top-level shape.
#[derive(Debug, Clone, Default, Deserialize)]
struct PolicyFile {
    #[serde(default)]
    policy: Policy,
}

/// Context a policy decision is evaluated against.
#[derive(Debug, Clone, Default)]
pub struct PolicyContext {
    pub non_interactive: bool,
    pub risk_score: u32,
    pub has_platform_sig: bool,
    pub session_install_count: u32,
}

#[derive(Debug, Clone, Serialize)]
pub struct PolicyDecision {
    pub allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub hints: Vec<String>,
}

impl PolicyDecision {
    fn allow() -> Self {
        Self {
            allowed: true,
            reason: None,
            hints: Vec::new(),
        }
    }

    fn deny(reason: String, hints: Vec<String>) -> Self {
        Self {
            allowed: false,
            reason: Some(reason),
            hints,
        }
    }
}

fn try_load(path: &Path) -> Option<Policy> {
    let content = fs::read_to_string(path).ok()?;
    match serde_json::from_str::<PolicyFile>(&content) {
        Ok(file) => Some(file.policy),
        Err(e) => {
            tracing::warn!(
                "Ignoring malformed policy file {}: {}",
                path.display(),
                e
            );
            None
        }
    }
}

/// Load the first valid `.skillportrc`: project dir, then user config dir,
/// then built-in defaults.
pub fn load_policy(project_dir: &Path, user_config_dir: &Path) -> Policy {
    for dir in [project_dir, user_config_dir] {
        let path = dir.join(POLICY_FILE_NAME);
        if path.exists() {
            if let Some(policy) = try_load(&path) {
                return policy;
            }
        }
    }
    Policy::default()
}

impl Policy {
    /// Evaluate an action against this policy. Fail-closed: anything listed
    /// in `requires_approval` is denied without a human present.
    pub fn check(&self, action: &str, ctx: &PolicyContext) -> PolicyDecision {
        if ctx.non_interactive && self.requires_approval.iter().any(|a| a == action) {
            return PolicyDecision::deny(
                format!("action '{}' requires interactive approval", action),
                vec![format!(
                    "remove '{}' from policy.requires_approval in {} to allow it non-interactively",
                    action, POLICY_FILE_NAME
                )],
            );
        }

        if action == "install" && ctx.non_interactive {
            let auto = &self.auto_install;
            if ctx.risk_score > auto.max_risk_score {
                return PolicyDecision::deny(
                    format!(
                        "risk score {} exceeds auto-install limit {}",
                        ctx.risk_score, auto.max_risk_score
                    ),
                    vec![format!(
                        "raise policy.auto_install.max_risk_score in {} (currently {})",
                        POLICY_FILE_NAME, auto.max_risk_score
                    )],
                );
            }
            if auto.require_platform_sig && !ctx.has_platform_sig {
                return PolicyDecision::deny(
                    "archive has no platform signature".to_string(),
                    vec![format!(
                        "set policy.auto_install.require_platform_sig to false in {} to accept unsigned listings",
                        POLICY_FILE_NAME
                    )],
                );
            }
            if ctx.session_install_count >= auto.max_per_session {
                return PolicyDecision::deny(
                    format!(
                        "session install count {} reached auto-install limit {}",
                        ctx.session_install_count, auto.max_per_session
                    ),
                    vec![format!(
                        "raise policy.auto_install.max_per_session in {}",
                        POLICY_FILE_NAME
                    )],
                );
            }
        }

        PolicyDecision::allow()
    }

    /// Empty allowlist means every host is allowed; otherwise exact match.
    pub fn is_host_allowed(&self, host: &str) -> bool {
        self.allowed_hosts.is_empty() || self.allowed_hosts.iter().any(|h| h == host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let p = Policy::default();
        assert_eq!(p.auto_install.max_risk_score, 30);
        assert_eq!(p.auto_install.max_per_session, 5);
        assert!(!p.auto_install.require_platform_sig);
    }

    #[test]
    fn test_requires_approval_fail_closed() {
        let p = Policy {
            requires_approval: vec!["publish".to_string()],
            ..Default::default()
        };
        let ctx = PolicyContext {
            non_interactive: true,
            ..Default::default()
        };
        let decision = p.check("publish", &ctx);
        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("publish"));
        assert!(!decision.hints.is_empty());

        // Interactive: the human is the approval.
        let decision = p.check("publish", &PolicyContext::default());
        assert!(decision.allowed);
    }

    #[test]
    fn test_auto_install_risk_limit() {
        let p = Policy {
            auto_install: AutoInstallPolicy {
                max_risk_score: 15,
                ..Default::default()
            },
            ..Default::default()
        };
        let decision = p.check(
            "install",
            &PolicyContext {
                non_interactive: true,
                risk_score: 20,
                ..Default::default()
            },
        );
        assert!(!decision.allowed);
        assert!(decision.reason.unwrap().contains("15"));
    }

    #[test]
    fn test_auto_install_session_limit() {
        let p = Policy::default();
        let decision = p.check(
            "install",
            &PolicyContext {
                non_interactive: true,
                session_install_count: 5,
                ..Default::default()
            },
        );
        assert!(!decision.allowed);
    }

    #[test]
    fn test_platform_sig_requirement() {
        let p = Policy {
            auto_install: AutoInstallPolicy {
                require_platform_sig: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let ctx = PolicyContext {
            non_interactive: true,
            has_platform_sig: false,
            ..Default::default()
        };
        assert!(!p.check("install", &ctx).allowed);
        let ctx = PolicyContext {
            has_platform_sig: true,
            non_interactive: true,
            ..Default::default()
        };
        assert!(p.check("install", &ctx).allowed);
    }

    #[test]
    fn test_host_allowlist() {
        let p = Policy::default();
        assert!(p.is_host_allowed("anything.example"));
        let p = Policy {
            allowed_hosts: vec!["market.skillport.dev".to_string()],
            ..Default::default()
        };
        assert!(p.is_host_allowed("market.skillport.dev"));
        assert!(!p.is_host_allowed("evil.example"));
    }

    #[test]
    fn test_malformed_policy_falls_back_to_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(POLICY_FILE_NAME), "{not json").unwrap();
        let p = load_policy(dir.path(), dir.path());
        assert_eq!(p.auto_install.max_risk_score, 30);
    }

    #[test]
    fn test_project_scope_takes_precedence() {
        let project = tempfile::tempdir().unwrap();
        let user = tempfile::tempdir().unwrap();
        fs::write(
            project.path().join(POLICY_FILE_NAME),
            r#"{"policy":{"auto_install":{"max_risk_score":10}}}"#,
        )
        .unwrap();
        fs::write(
            user.path().join(POLICY_FILE_NAME),
            r#"{"policy":{"auto_install":{"max_risk_score":90}}}"#,
        )
        .unwrap();
        let p = load_policy(project.path(), user.path());
        assert_eq!(p.auto_install.max_risk_score, 10);
    }
}
