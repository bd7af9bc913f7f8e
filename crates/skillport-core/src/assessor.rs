//! Permission risk assessment.
//!
//! Maps declared permissions to a 5-level classification per category and
//! an overall maximum, used by install consent and the `plan` command.

use crate::manifest::{IntegrationLevel, NetworkPermission, Permissions};
use serde::{Deserialize, Serialize};

/// Risk levels, totally ordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Safe => "safe",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize)]
pub struct PermissionAssessment {
    pub network: RiskLevel,
    pub filesystem: RiskLevel,
    pub exec: RiskLevel,
    pub integrations: RiskLevel,
    pub overall: RiskLevel,
}

fn assess_network(perms: &Permissions) -> RiskLevel {
    match &perms.network {
        NetworkPermission::None => RiskLevel::Safe,
        NetworkPermission::Allowlist { domains } if domains.len() <= 2 => RiskLevel::Low,
        NetworkPermission::Allowlist { .. } => RiskLevel::Medium,
    }
}

/// Write targets that make a skill critical regardless of anything else.
fn is_sensitive_write_path(p: &str) -> bool {
    p == "/"
        || p == "~"
        || p.starts_with("~/")
        || p == "/etc"
        || p.starts_with("/etc/")
        || p == "/usr"
        || p.starts_with("/usr/")
}

fn assess_filesystem(perms: &Permissions) -> RiskLevel {
    let fs = &perms.filesystem;
    if fs.read_paths.is_empty() && fs.write_paths.is_empty() {
        return RiskLevel::Safe;
    }
    if fs.write_paths.is_empty() {
        return RiskLevel::Low;
    }
    if fs.write_paths.iter().any(|p| is_sensitive_write_path(p)) {
        RiskLevel::Critical
    } else {
        RiskLevel::Medium
    }
}

fn assess_exec(perms: &Permissions) -> RiskLevel {
    let exec = &perms.exec;
    if exec.allowed_commands.is_empty() && !exec.shell {
        return RiskLevel::Safe;
    }
    if exec.shell {
        return RiskLevel::High;
    }
    if exec.allowed_commands.len() <= 3 {
        RiskLevel::Medium
    } else {
        RiskLevel::High
    }
}

fn assess_integrations(perms: &Permissions) -> RiskLevel {
    let Some(integrations) = perms.integrations.as_ref() else {
        return RiskLevel::Safe;
    };
    if integrations.is_empty() {
        return RiskLevel::Safe;
    }
    let max = integrations.values().max().copied().unwrap_or(IntegrationLevel::None);
    match max {
        IntegrationLevel::Send | IntegrationLevel::Write => RiskLevel::High,
        IntegrationLevel::Read => RiskLevel::Medium,
        IntegrationLevel::None => RiskLevel::Low,
    }
}

/// Assess declared permissions. `overall` is the pointwise maximum of the
/// four categories.
pub fn assess(perms: &Permissions) -> PermissionAssessment {
    let network = assess_network(perms);
    let filesystem = assess_filesystem(perms);
    let exec = assess_exec(perms);
    let integrations = assess_integrations(perms);
    let overall = network.max(filesystem).max(exec).max(integrations);
    PermissionAssessment {
        network,
        filesystem,
        exec,
        integrations,
        overall,
    }
}

impl PermissionAssessment {
    /// One-line human summary for plan/inspect output.
    pub fn summary(&self) -> String {
        format!(
            "network={} filesystem={} exec={} integrations={} overall={}",
            self.network.as_str(),
            self.filesystem.as_str(),
            self.exec.as_str(),
            self.integrations.as_str(),
            self.overall.as_str()
        )
    }
}
