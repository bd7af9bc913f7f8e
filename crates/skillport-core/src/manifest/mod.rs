//! Manifest schema: the contract between a skill and its runtime.
//!
//! Two forms exist on purpose. [`RawManifest`] is the on-wire document with
//! everything optional; [`Manifest`] is the validated form with defaults
//! applied. Signatures are always computed over the canonical serialization
//! of the validated form, and the extract path must surface the stored
//! bytes untouched; re-serializing a manifest at rest would invalidate
//! existing signatures.

pub mod permissions;

pub use permissions::{
    ExecPermission, FilesystemPermission, IntegrationLevel, NetworkPermission, Permissions,
};

use crate::error::SkillPortError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The only archive format version this crate reads or writes.
pub const SSP_VERSION: &str = "1.0";

const KEY_ID_LEN: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Platform {
    Openclaw,
    ClaudeCode,
    Universal,
}

impl Default for Platform {
    fn default() -> Self {
        Self::Openclaw
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeclaredRisk {
    Low,
    Medium,
    High,
}

impl Default for DeclaredRisk {
    fn default() -> Self {
        Self::Medium
    }
}

/// Operating systems a skill may declare compatibility with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OsTarget {
    Macos,
    Linux,
    Windows,
}

impl OsTarget {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Macos => "macos",
            Self::Linux => "linux",
            Self::Windows => "windows",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DangerSeverity {
    Low,
    Medium,
    High,
    Critical,
}

/// Declared hazard the author wants surfaced before install.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DangerFlag {
    pub severity: DangerSeverity,
    pub description: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Author {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// First 16 hex chars of SHA-256 over the author's public key PEM.
    /// Lenient on parse (the export path fills it in); the validator
    /// requires the final shape.
    #[serde(default)]
    pub signing_key_id: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BinaryDependency {
    pub name: String,
    #[serde(default)]
    pub optional: bool,
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EnvDependency {
    pub name: String,
    #[serde(default = "default_true")]
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dependencies {
    #[serde(default)]
    pub binaries: Vec<BinaryDependency>,
    #[serde(default)]
    pub env: Vec<EnvDependency>,
}

/// Coarse capability summary, distinct from the detailed permission records.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Scope {
    #[serde(default)]
    pub files: bool,
    #[serde(default)]
    pub network: bool,
    #[serde(default)]
    pub processes: bool,
    #[serde(default)]
    pub env_vars: bool,
}

/// Validated manifest with defaults applied. Field order here is the
/// canonical serialization order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Manifest {
    pub ssp_version: String,
    pub id: String,
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub openclaw_compat: Option<String>,
    #[serde(default)]
    pub platform: Platform,
    #[serde(default)]
    pub declared_risk: DeclaredRisk,
    pub author: Author,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub os_compat: Vec<OsTarget>,
    pub entrypoints: Vec<String>,
    #[serde(default)]
    pub dependencies: Dependencies,
    pub permissions: Permissions,
    #[serde(default)]
    pub danger_flags: Vec<DangerFlag>,
    #[serde(default)]
    pub inputs: Vec<String>,
    #[serde(default)]
    pub outputs: Vec<String>,
    #[serde(default)]
    pub scope: Scope,
    #[serde(default)]
    pub hashes: BTreeMap<String, String>,
}

/// On-wire manifest as authored. Everything optional; [`validate`] turns it
/// into a [`Manifest`] or a list of violations.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawManifest {
    pub ssp_version: Option<String>,
    pub id: Option<String>,
    pub version: Option<String>,
    pub openclaw_compat: Option<String>,
    pub platform: Option<Platform>,
    pub declared_risk: Option<DeclaredRisk>,
    pub author: Option<Author>,
    pub description: Option<String>,
    pub os_compat: Option<Vec<OsTarget>>,
    pub entrypoints: Option<Vec<String>>,
    pub dependencies: Option<Dependencies>,
    pub permissions: Option<RawPermissions>,
    pub danger_flags: Option<Vec<DangerFlag>>,
    pub inputs: Option<Vec<String>>,
    pub outputs: Option<Vec<String>>,
    pub scope: Option<Scope>,
    pub hashes: Option<BTreeMap<String, String>>,
}

/// On-wire permissions. The three sub-records are mandatory in the schema,
/// so their absence must be observable rather than defaulted away.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RawPermissions {
    pub network: Option<NetworkPermission>,
    pub filesystem: Option<FilesystemPermission>,
    pub exec: Option<ExecPermission>,
    pub integrations: Option<BTreeMap<String, IntegrationLevel>>,
}

/// A single schema violation, identifying the offending field.
#[derive(Debug, Clone, Serialize)]
pub struct Violation {
    pub field: String,
    pub message: String,
}

impl Violation {
    fn new(field: &str, message: impl Into<String>) -> Self {
        Self {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

fn is_slug(s: &str) -> bool {
    !s.is_empty()
        && s.chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '_' || c == '-')
}

fn is_hex_lower(s: &str) -> bool {
    !s.is_empty() && s.chars().all(|c| c.is_ascii_digit() || ('a'..='f').contains(&c))
}

fn is_safe_relative_path(p: &str) -> bool {
    !p.is_empty()
        && !p.starts_with('/')
        && !p.contains('\\')
        && !p.split('/').any(|seg| seg == ".." || seg.is_empty())
}

/// Validate an on-wire manifest. Total: either a fully-typed manifest with
/// defaults applied, or every violation found.
pub fn validate(raw: RawManifest) -> Result<Manifest, Vec<Violation>> {
    let mut violations = Vec::new();

    match raw.ssp_version.as_deref() {
        Some(SSP_VERSION) => {}
        Some(other) => violations.push(Violation::new(
            "ssp_version",
            format!("unsupported version '{}', expected '{}'", other, SSP_VERSION),
        )),
        None => violations.push(Violation::new("ssp_version", "missing")),
    }

    match raw.id.as_deref() {
        Some(id) => {
            let mut parts = id.splitn(2, '/');
            let author = parts.next().unwrap_or_default();
            let skill = parts.next().unwrap_or_default();
            if !is_slug(author) || !is_slug(skill) {
                violations.push(Violation::new(
                    "id",
                    "must match <author-slug>/<skill-slug> with [a-z0-9_-] segments",
                ));
            }
        }
        None => violations.push(Violation::new("id", "missing")),
    }

    match raw.version.as_deref() {
        Some(v) => match semver::Version::parse(v) {
            Ok(parsed) if parsed.pre.is_empty() && parsed.build.is_empty() => {}
            _ => violations.push(Violation::new("version", "must be strict x.y.z")),
        },
        None => violations.push(Violation::new("version", "missing")),
    }

    if let Some(req) = raw.openclaw_compat.as_deref() {
        if semver::VersionReq::parse(req).is_err() {
            violations.push(Violation::new("openclaw_compat", "invalid semver range"));
        }
    }

    match raw.author.as_ref() {
        Some(author) => {
            if author.signing_key_id.len() != KEY_ID_LEN
                || !is_hex_lower(&author.signing_key_id)
            {
                violations.push(Violation::new(
                    "author.signing_key_id",
                    "must be 16 lowercase hex characters",
                ));
            }
        }
        None => violations.push(Violation::new("author", "missing")),
    }

    match raw.os_compat.as_ref() {
        Some(os) if !os.is_empty() => {}
        Some(_) => violations.push(Violation::new("os_compat", "must not be empty")),
        None => violations.push(Violation::new("os_compat", "missing")),
    }

    match raw.entrypoints.as_ref() {
        Some(eps) if !eps.is_empty() => {
            for (i, ep) in eps.iter().enumerate() {
                if !is_safe_relative_path(ep) {
                    violations.push(Violation::new(
                        &format!("entrypoints[{}]", i),
                        "must be a relative forward-slash path without '..'",
                    ));
                }
            }
        }
        Some(_) => violations.push(Violation::new("entrypoints", "must not be empty")),
        None => violations.push(Violation::new("entrypoints", "missing")),
    }

    let permissions = match raw.permissions {
        Some(raw_perms) => {
            let mut missing = Vec::new();
            if raw_perms.network.is_none() {
                missing.push("network");
            }
            if raw_perms.filesystem.is_none() {
                missing.push("filesystem");
            }
            if raw_perms.exec.is_none() {
                missing.push("exec");
            }
            for field in &missing {
                violations.push(Violation::new(
                    &format!("permissions.{}", field),
                    "missing mandatory sub-record",
                ));
            }
            Permissions {
                network: raw_perms.network.unwrap_or_default(),
                filesystem: raw_perms.filesystem.unwrap_or_default(),
                exec: raw_perms.exec.unwrap_or_default(),
                integrations: raw_perms.integrations,
            }
        }
        None => {
            violations.push(Violation::new("permissions", "missing"));
            Permissions::default()
        }
    };

    if let Some(hashes) = raw.hashes.as_ref() {
        for (path, digest) in hashes {
            if digest.len() != 64 || !is_hex_lower(digest) {
                violations.push(Violation::new(
                    &format!("hashes.{}", path),
                    "must be 64 lowercase hex characters",
                ));
            }
        }
    }

    if !violations.is_empty() {
        return Err(violations);
    }

    Ok(Manifest {
        ssp_version: raw.ssp_version.unwrap_or_else(|| SSP_VERSION.to_string()),
        id: raw.id.unwrap_or_default(),
        version: raw.version.unwrap_or_default(),
        openclaw_compat: raw.openclaw_compat,
        platform: raw.platform.unwrap_or_default(),
        declared_risk: raw.declared_risk.unwrap_or_default(),
        author: raw.author.expect("validated above"),
        description: raw.description,
        os_compat: raw.os_compat.unwrap_or_default(),
        entrypoints: raw.entrypoints.unwrap_or_default(),
        dependencies: raw.dependencies.unwrap_or_default(),
        permissions,
        danger_flags: raw.danger_flags.unwrap_or_default(),
        inputs: raw.inputs.unwrap_or_default(),
        outputs: raw.outputs.unwrap_or_default(),
        scope: raw.scope.unwrap_or_default(),
        hashes: raw.hashes.unwrap_or_default(),
    })
}

impl Manifest {
    /// Parse and validate manifest bytes, mapping violations into the
    /// shared error taxonomy.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, SkillPortError> {
        let raw: RawManifest = serde_json::from_slice(bytes)
            .map_err(|e| SkillPortError::ManifestInvalid(format!("not valid JSON: {}", e)))?;
        validate(raw).map_err(|violations| {
            let detail = violations
                .iter()
                .map(|v| format!("{}: {}", v.field, v.message))
                .collect::<Vec<_>>()
                .join("; ");
            SkillPortError::ManifestInvalid(detail)
        })
    }

    /// Canonical serialization: two-space indent, `\n` newlines, field order
    /// as declared. These are the bytes signatures are computed over.
    pub fn to_canonical_bytes(&self) -> anyhow::Result<Vec<u8>> {
        let bytes = serde_json::to_vec_pretty(self)?;
        Ok(bytes)
    }

    /// Author half of the `author/skill` id.
    pub fn author_slug(&self) -> &str {
        self.id.split('/').next().unwrap_or(&self.id)
    }

    /// Skill half of the `author/skill` id.
    pub fn skill_slug(&self) -> &str {
        self.id.split('/').nth(1).unwrap_or(&self.id)
    }

    pub fn supports_os(&self, os: OsTarget) -> bool {
        self.os_compat.contains(&os)
    }

    pub fn has_critical_danger_flag(&self) -> bool {
        self.danger_flags
            .iter()
            .any(|f| f.severity == DangerSeverity::Critical)
    }
}
