//! Host environment probe.
//!
//! Answers three questions before an install: does the OS match, are the
//! declared binaries on the search path, are the declared environment
//! variables set.

use crate::manifest::{Manifest, OsTarget};
use serde::Serialize;
use std::env;
use std::path::PathBuf;

/// Normalize the host OS identifier. Anything else is unsupported.
pub fn detect_os() -> Option<OsTarget> {
    match env::consts::OS {
        "macos" => Some(OsTarget::Macos),
        "linux" => Some(OsTarget::Linux),
        "windows" => Some(OsTarget::Windows),
        _ => None,
    }
}

/// Resolve a binary on the OS search path. False on not-found or error.
pub fn binary_exists(name: &str) -> bool {
    let Some(path_var) = env::var_os("PATH") else {
        return false;
    };
    let candidates: Vec<String> = if cfg!(windows) {
        let exts = env::var("PATHEXT").unwrap_or_else(|_| ".EXE;.BAT;.CMD".to_string());
        exts.split(';')
            .filter(|e| !e.is_empty())
            .map(|ext| format!("{}{}", name, ext.to_lowercase()))
            .chain(std::iter::once(name.to_string()))
            .collect()
    } else {
        vec![name.to_string()]
    };
    for dir in env::split_paths(&path_var) {
        for candidate in &candidates {
            let full: PathBuf = dir.join(candidate);
            if full.is_file() {
                return true;
            }
        }
    }
    false
}

/// Non-empty environment variable lookup.
pub fn env_var_exists(name: &str) -> bool {
    env::var(name).map(|v| !v.is_empty()).unwrap_or(false)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CheckKind {
    Os,
    Binary,
    EnvVar,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CheckStatus {
    Ok,
    Warn,
    Missing,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvCheck {
    pub name: String,
    pub kind: CheckKind,
    pub status: CheckStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct EnvironmentReport {
    pub checks: Vec<EnvCheck>,
    /// True iff the OS is compatible and nothing non-optional is missing.
    pub ready: bool,
}

/// Probe the host against a manifest's declared requirements.
pub fn check_environment(manifest: &Manifest) -> EnvironmentReport {
    let mut checks = Vec::new();
    let mut ready = true;

    let host_os = detect_os();
    let os_ok = host_os.map(|os| manifest.supports_os(os)).unwrap_or(false);
    if !os_ok {
        ready = false;
    }
    checks.push(EnvCheck {
        name: host_os.map(|o| o.as_str().to_string()).unwrap_or_else(|| env::consts::OS.to_string()),
        kind: CheckKind::Os,
        status: if os_ok { CheckStatus::Ok } else { CheckStatus::Missing },
        detail: Some(format!(
            "skill supports: {}",
            manifest
                .os_compat
                .iter()
                .map(|o| o.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        )),
    });

    for dep in &manifest.dependencies.binaries {
        let found = binary_exists(&dep.name);
        let status = match (found, dep.optional) {
            (true, _) => CheckStatus::Ok,
            (false, true) => CheckStatus::Warn,
            (false, false) => {
                ready = false;
                CheckStatus::Missing
            }
        };
        checks.push(EnvCheck {
            name: dep.name.clone(),
            kind: CheckKind::Binary,
            status,
            detail: dep.optional.then(|| "optional".to_string()),
        });
    }

    for dep in &manifest.dependencies.env {
        let found = env_var_exists(&dep.name);
        let status = match (found, dep.required) {
            (true, _) => CheckStatus::Ok,
            (false, false) => CheckStatus::Warn,
            (false, true) => {
                ready = false;
                CheckStatus::Missing
            }
        };
        checks.push(EnvCheck {
            name: dep.name.clone(),
            kind: CheckKind::EnvVar,
            status,
            detail: (!dep.required).then(|| "optional".to_string()),
        });
    }

    EnvironmentReport { checks, ready }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::manifest::{self, BinaryDependency, RawManifest};

    fn manifest_with_bin(name: &str, optional: bool) -> Manifest {
        let raw: RawManifest = serde_json::from_value(serde_json::json!({
            "ssp_version": "1.0",
            "id": "alice/demo",
            "version": "1.0.0",
            "author": { "signing_key_id": "0123456789abcdef" },
            "os_compat": ["macos", "linux", "windows"],
            "entrypoints": ["SKILL.md"],
            "dependencies": { "binaries": [{ "name": name, "optional": optional }] },
            "permissions": {
                "network": { "mode": "none" },
                "filesystem": {},
                "exec": {}
            }
        }))
        .unwrap();
        manifest::validate(raw).unwrap()
    }

    #[test]
    fn test_detect_os_is_known_on_ci() {
        // The test suite only runs on the three supported platforms.
        assert!(detect_os().is_some());
    }

    #[test]
    fn test_missing_required_binary_blocks_ready() {
        let m = manifest_with_bin("definitely-not-a-real-binary-xyz", false);
        let report = check_environment(&m);
        assert!(!report.ready);
        assert!(report
            .checks
            .iter()
            .any(|c| c.kind == CheckKind::Binary && c.status == CheckStatus::Missing));
    }

    #[test]
    fn test_missing_optional_binary_warns_only() {
        let m = manifest_with_bin("definitely-not-a-real-binary-xyz", true);
        let report = check_environment(&m);
        assert!(report.ready);
        assert!(report
            .checks
            .iter()
            .any(|c| c.kind == CheckKind::Binary && c.status == CheckStatus::Warn));
    }

    #[test]
    fn test_env_var_exists() {
        assert!(binary_exists("sh") || cfg!(windows));
        assert!(!env_var_exists("SKILLPORT_TEST_UNSET_VAR_XYZ"));
    }
}
