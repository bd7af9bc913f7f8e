//! Error taxonomy shared by every pipeline in the workspace.
//!
//! Each variant carries a stable code string and a numeric exit code; the
//! mapping to the CLI JSON envelope lives in the `skillport` binary crate.
//! Core code never prints; it only returns these.

use thiserror::Error;

/// Exit codes are a stable contract for automation.
pub mod exit {
    pub const SUCCESS: i32 = 0;
    pub const GENERAL: i32 = 1;
    pub const INPUT_INVALID: i32 = 2;
    pub const NETWORK: i32 = 10;
    pub const AUTH_REQUIRED: i32 = 11;
    pub const DEPENDENCY_MISSING: i32 = 20;
    pub const SECURITY_REJECTED: i32 = 30;
    pub const QUALITY_FAILED: i32 = 31;
    pub const POLICY_REJECTED: i32 = 32;
}

#[derive(Debug, Error)]
pub enum SkillPortError {
    #[error("invalid input: {0}")]
    InputInvalid(String),

    #[error("file not found: {0}")]
    FileNotFound(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("malformed archive: {0}")]
    MalformedArchive(String),

    #[error("manifest invalid: {0}")]
    ManifestInvalid(String),

    #[error("archive entry escapes extraction root: {0}")]
    ZipSlip(String),

    #[error("decompression bomb detected: cumulative uncompressed size exceeds {limit} bytes")]
    DecompressionBomb { limit: u64 },

    #[error("checksum mismatch: {0}")]
    ChecksumMismatch(String),

    #[error("author signature missing from archive")]
    SignatureMissing,

    #[error("signature verification failed for key {key_id}")]
    SignatureInvalid { key_id: String },

    #[error("signing key missing: {0}")]
    KeyMissing(String),

    #[error("key not registered: {0}")]
    KeyNotRegistered(String),

    #[error("security scan rejected the skill: {0}")]
    ScanFailed(String),

    #[error("policy rejected {action}: {reason}")]
    PolicyRejected {
        action: String,
        reason: String,
        hints: Vec<String>,
    },

    #[error("host OS not supported by this skill: {0}")]
    OsIncompatible(String),

    #[error("required dependency missing: {0}")]
    DependencyMissing(String),

    #[error("authentication required: {0}")]
    AuthRequired(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("network error: {0}")]
    Network(String),

    #[error("rate limited: {0}")]
    RateLimited(String),

    /// Anything without a dedicated taxonomy entry; maps to the general
    /// exit code.
    #[error("{0}")]
    Internal(String),
}

impl From<std::io::Error> for SkillPortError {
    fn from(e: std::io::Error) -> Self {
        Self::Internal(e.to_string())
    }
}

impl SkillPortError {
    /// Stable machine-readable code for the JSON envelope.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InputInvalid(_) => "INPUT_INVALID",
            Self::FileNotFound(_) => "FILE_NOT_FOUND",
            Self::NotFound(_) => "NOT_FOUND",
            Self::MalformedArchive(_) => "MALFORMED_ARCHIVE",
            Self::ManifestInvalid(_) => "MANIFEST_INVALID",
            Self::ZipSlip(_) => "ZIP_SLIP",
            Self::DecompressionBomb { .. } => "DECOMPRESSION_BOMB",
            Self::ChecksumMismatch(_) => "CHECKSUM_MISMATCH",
            Self::SignatureMissing => "SIGNATURE_MISSING",
            Self::SignatureInvalid { .. } => "SIGNATURE_INVALID",
            Self::KeyMissing(_) => "KEY_MISSING",
            Self::KeyNotRegistered(_) => "KEY_NOT_REGISTERED",
            Self::ScanFailed(_) => "SCAN_FAILED",
            Self::PolicyRejected { .. } => "POLICY_REJECTED",
            Self::OsIncompatible(_) => "OS_INCOMPATIBLE",
            Self::DependencyMissing(_) => "DEPENDENCY_MISSING",
            Self::AuthRequired(_) => "AUTH_REQUIRED",
            Self::Forbidden(_) => "FORBIDDEN",
            Self::Network(_) => "NETWORK",
            Self::RateLimited(_) => "RATE_LIMITED",
            Self::Internal(_) => "INTERNAL",
        }
    }

    /// Process exit code for the CLI boundary.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::InputInvalid(_)
            | Self::FileNotFound(_)
            | Self::NotFound(_)
            | Self::MalformedArchive(_)
            | Self::ManifestInvalid(_) => exit::INPUT_INVALID,
            Self::Network(_) | Self::RateLimited(_) => exit::NETWORK,
            Self::AuthRequired(_) | Self::Forbidden(_) => exit::AUTH_REQUIRED,
            Self::OsIncompatible(_) | Self::DependencyMissing(_) => exit::DEPENDENCY_MISSING,
            Self::ZipSlip(_)
            | Self::DecompressionBomb { .. }
            | Self::ChecksumMismatch(_)
            | Self::SignatureMissing
            | Self::SignatureInvalid { .. }
            | Self::KeyMissing(_)
            | Self::KeyNotRegistered(_)
            | Self::ScanFailed(_) => exit::SECURITY_REJECTED,
            Self::PolicyRejected { .. } => exit::POLICY_REJECTED,
            Self::Internal(_) => exit::GENERAL,
        }
    }

    /// Network-class failures may be retried by the caller; security
    /// failures never are.
    pub fn retryable(&self) -> bool {
        matches!(self, Self::Network(_) | Self::RateLimited(_))
    }

    /// Actionable hints surfaced in the JSON envelope.
    pub fn hints(&self) -> Vec<String> {
        match self {
            Self::PolicyRejected { hints, .. } => hints.clone(),
            Self::AuthRequired(_) => {
                vec!["run `skillport keys register` or set SKILLPORT_AUTH_TOKEN".to_string()]
            }
            Self::KeyMissing(_) => {
                vec!["run `skillport keys register` to generate a signing key".to_string()]
            }
            _ => Vec::new(),
        }
    }
}
