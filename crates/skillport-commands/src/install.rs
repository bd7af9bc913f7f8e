//! Install pipeline.
//!
//! Ordered stages, each fatal on failure:
//! load → extract → checksums → signature → scan → policy → environment →
//! consent → idempotency → materialize → register → log.
//!
//! The pipeline never prints; human interaction goes through the
//! [`Consent`] seam and results surface as typed errors.

use crate::consent::Consent;
use crate::marketplace::Marketplace;
use crate::verify;
use chrono::Utc;
use serde::Serialize;
use serde_json::json;
use skillport_archive::codec::{self, ExtractedArchive, PAYLOAD_PREFIX};
use skillport_core::assessor::{self, PermissionAssessment};
use skillport_core::environment::{self, CheckKind, CheckStatus, EnvironmentReport};
use skillport_core::error::SkillPortError;
use skillport_core::manifest::Manifest;
use skillport_core::policy::{self, PolicyContext};
use skillport_core::registry::{self, RegistryRecord};
use skillport_core::{audit, paths, provenance, session};
use skillport_scanner::{ScanReport, Scanner};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct InstallOptions {
    /// Reinstall even when the same id/version is already present.
    pub force: bool,
    /// No human available; policy and consent run fail-closed.
    pub non_interactive: bool,
    /// Pre-approval of elevated-risk installs in non-interactive mode.
    pub accept_risk: bool,
    /// Where the archive came from, recorded in provenance.
    pub source: String,
}

impl Default for InstallOptions {
    fn default() -> Self {
        Self {
            force: false,
            non_interactive: false,
            accept_risk: false,
            source: "local".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct InstallOutcome {
    pub id: String,
    pub version: String,
    pub install_path: PathBuf,
    pub already_installed: bool,
    pub risk_score: u32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct UninstallOutcome {
    pub id: String,
    pub version: String,
    pub removed_path: PathBuf,
}

/// Everything `dry-run` and `plan` report without touching disk.
#[derive(Debug, Clone, Serialize)]
pub struct DryRunReport {
    pub id: String,
    pub version: String,
    pub risk_score: u32,
    pub scan_passed: bool,
    pub permission_assessment: PermissionAssessment,
    pub environment: EnvironmentReport,
    pub policy_allowed: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub policy_reason: Option<String>,
    pub already_installed: bool,
    pub would_install_to: PathBuf,
}

fn internal(e: anyhow::Error) -> SkillPortError {
    SkillPortError::Internal(format!("{:#}", e))
}

fn install_dir_for(manifest: &Manifest) -> PathBuf {
    paths::install_root(manifest.platform)
        .join(manifest.author_slug())
        .join(manifest.skill_slug())
}

fn gate_environment(
    report: &EnvironmentReport,
    warnings: &mut Vec<String>,
) -> Result<(), SkillPortError> {
    for check in &report.checks {
        match (check.kind, check.status) {
            (CheckKind::Os, CheckStatus::Missing) => {
                return Err(SkillPortError::OsIncompatible(
                    check.detail.clone().unwrap_or_else(|| check.name.clone()),
                ))
            }
            (CheckKind::Binary, CheckStatus::Missing) => {
                return Err(SkillPortError::DependencyMissing(format!(
                    "binary '{}'",
                    check.name
                )))
            }
            (CheckKind::EnvVar, CheckStatus::Missing) => {
                return Err(SkillPortError::DependencyMissing(format!(
                    "environment variable '{}'",
                    check.name
                )))
            }
            (CheckKind::Binary, CheckStatus::Warn) => {
                warnings.push(format!("optional binary '{}' not found", check.name))
            }
            (CheckKind::EnvVar, CheckStatus::Warn) => {
                warnings.push(format!("optional env var '{}' not set", check.name))
            }
            _ => {}
        }
    }
    Ok(())
}

fn gate_scan(
    report: &ScanReport,
    opts: &InstallOptions,
    consent: &dyn Consent,
) -> Result<(), SkillPortError> {
    if report.passed {
        return Ok(());
    }
    let high = report.summary.by_severity.get("high").copied().unwrap_or(0);
    let critical = report
        .summary
        .by_severity
        .get("critical")
        .copied()
        .unwrap_or(0);
    let detail = format!(
        "{} high / {} critical finding(s), risk score {}",
        high, critical, report.risk_score
    );
    if opts.non_interactive {
        return Err(SkillPortError::ScanFailed(detail));
    }
    let prompt = format!("Security scan flagged this skill ({}). Install anyway?", detail);
    if !consent.confirm(&prompt) {
        return Err(SkillPortError::ScanFailed(format!("{}; declined", detail)));
    }
    Ok(())
}

fn gate_consent(
    manifest: &Manifest,
    opts: &InstallOptions,
    consent: &dyn Consent,
) -> Result<(), SkillPortError> {
    let elevated = manifest.permissions.exec.shell || manifest.has_critical_danger_flag();
    if !elevated {
        return Ok(());
    }
    if opts.non_interactive {
        if opts.accept_risk {
            return Ok(());
        }
        return Err(SkillPortError::PolicyRejected {
            action: "install".to_string(),
            reason: "skill requests shell access or carries a critical danger flag".to_string(),
            hints: vec!["re-run with --accept-risk to approve elevated access".to_string()],
        });
    }
    let assessment = assessor::assess(&manifest.permissions);
    let prompt = format!(
        "Skill {} requests elevated access ({}). Proceed?",
        manifest.id,
        assessment.summary()
    );
    if !consent.confirm(&prompt) {
        return Err(SkillPortError::PolicyRejected {
            action: "install".to_string(),
            reason: "elevated access declined".to_string(),
            hints: Vec::new(),
        });
    }
    Ok(())
}

/// Write the extracted skill under its install directory, stripping the
/// `payload/` segment. Entry names were validated at extract time.
fn materialize(
    extracted: &ExtractedArchive,
    install_dir: &Path,
) -> Result<(), SkillPortError> {
    if install_dir.exists() {
        fs::remove_dir_all(install_dir)?;
    }
    fs::create_dir_all(install_dir)?;
    fs::write(install_dir.join(codec::MANIFEST_ENTRY), &extracted.manifest_bytes)?;
    for (path, bytes) in &extracted.files {
        let rel = path.strip_prefix(PAYLOAD_PREFIX).unwrap_or(path);
        let target = install_dir.join(rel);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(&target, bytes)?;
    }
    Ok(())
}

/// Best-effort per-install trace under `traces/`.
fn write_trace(manifest: &Manifest, report: &ScanReport, outcome: &InstallOutcome) {
    let dir = paths::traces_dir();
    if fs::create_dir_all(&dir).is_err() {
        return;
    }
    let name = format!(
        "{}_{}_{}.json",
        Utc::now().format("%Y%m%dT%H%M%S"),
        manifest.skill_slug(),
        manifest.version
    );
    let trace = json!({
        "id": manifest.id,
        "version": manifest.version,
        "risk_score": report.risk_score,
        "scan_passed": report.passed,
        "already_installed": outcome.already_installed,
        "install_path": outcome.install_path,
    });
    let _ = fs::write(dir.join(name), trace.to_string());
}

/// Run the full pipeline over in-memory archive bytes.
pub fn install_archive_bytes(
    bytes: &[u8],
    opts: &InstallOptions,
    consent: &dyn Consent,
) -> Result<InstallOutcome, SkillPortError> {
    let extracted = codec::extract(bytes)?;
    verify::verify_strict(&extracted)?;
    let manifest = &extracted.manifest;

    let scan_report = Scanner::new().scan_files(&extracted.files);
    gate_scan(&scan_report, opts, consent)?;

    let project_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let pol = policy::load_policy(&project_dir, &paths::config_dir());
    let ctx = PolicyContext {
        non_interactive: opts.non_interactive,
        risk_score: scan_report.risk_score,
        has_platform_sig: extracted.platform_signature.is_some(),
        session_install_count: session::install_count(),
    };
    let decision = pol.check("install", &ctx);
    if !decision.allowed {
        return Err(SkillPortError::PolicyRejected {
            action: "install".to_string(),
            reason: decision.reason.unwrap_or_else(|| "denied".to_string()),
            hints: decision.hints,
        });
    }

    let env_report = environment::check_environment(manifest);
    let mut warnings = Vec::new();
    gate_environment(&env_report, &mut warnings)?;

    gate_consent(manifest, opts, consent)?;

    let registry_path = paths::registry_path();
    let mut reg = registry::load_registry(&registry_path).map_err(internal)?;
    let install_path = install_dir_for(manifest);

    if !opts.force {
        if let Some(existing) = reg.get(&manifest.id) {
            if existing.version == manifest.version {
                let outcome = InstallOutcome {
                    id: manifest.id.clone(),
                    version: manifest.version.clone(),
                    install_path: existing.install_path.clone(),
                    already_installed: true,
                    risk_score: scan_report.risk_score,
                    warnings,
                };
                provenance::append_provenance(
                    &paths::provenance_path(),
                    "install",
                    json!({
                        "id": outcome.id,
                        "version": outcome.version,
                        "source": opts.source,
                        "already_installed": true,
                    }),
                )
                .map_err(internal)?;
                return Ok(outcome);
            }
        }
    }

    materialize(&extracted, &install_path)?;

    reg.upsert(RegistryRecord {
        id: manifest.id.clone(),
        version: manifest.version.clone(),
        installed_at: Utc::now(),
        install_path: install_path.clone(),
        author_key_id: manifest.author.signing_key_id.clone(),
    });
    registry::save_registry(&registry_path, &reg).map_err(internal)?;

    session::record_install();
    let outcome = InstallOutcome {
        id: manifest.id.clone(),
        version: manifest.version.clone(),
        install_path,
        already_installed: false,
        risk_score: scan_report.risk_score,
        warnings,
    };
    provenance::append_provenance(
        &paths::provenance_path(),
        "install",
        json!({
            "id": outcome.id,
            "version": outcome.version,
            "source": opts.source,
            "risk_score": scan_report.risk_score,
            "scan_passed": scan_report.passed,
            "platform_signature_present": extracted.platform_signature.is_some(),
            "install_path": outcome.install_path,
        }),
    )
    .map_err(internal)?;
    audit::append_audit(
        "install",
        json!({ "id": outcome.id, "version": outcome.version, "source": opts.source }),
    );
    write_trace(manifest, &scan_report, &outcome);
    tracing::info!("Installed {} {}", outcome.id, outcome.version);

    Ok(outcome)
}

/// Install from a local `.ssp` file.
pub fn install_from_file(
    path: &Path,
    opts: &InstallOptions,
    consent: &dyn Consent,
) -> Result<InstallOutcome, SkillPortError> {
    if !path.exists() {
        return Err(SkillPortError::FileNotFound(path.display().to_string()));
    }
    let bytes = fs::read(path)?;
    let mut opts = opts.clone();
    opts.source = path.display().to_string();
    install_archive_bytes(&bytes, &opts, consent)
}

/// Install from the marketplace by skill id.
pub fn install_from_marketplace(
    ssp_id: &str,
    market: &dyn Marketplace,
    opts: &InstallOptions,
    consent: &dyn Consent,
) -> Result<InstallOutcome, SkillPortError> {
    let listing = market
        .search(ssp_id)?
        .ok_or_else(|| SkillPortError::NotFound(ssp_id.to_string()))?;
    let url = market.download_url(&listing.id)?;
    let bytes = market.download(&url)?;
    let mut opts = opts.clone();
    opts.source = format!("marketplace:{}", listing.id);
    install_archive_bytes(&bytes, &opts, consent)
}

/// Everything up to the consent gate, with no writes.
pub fn dry_run_archive_bytes(
    bytes: &[u8],
    non_interactive: bool,
) -> Result<DryRunReport, SkillPortError> {
    let extracted = codec::extract(bytes)?;
    verify::verify_strict(&extracted)?;
    let manifest = &extracted.manifest;

    let scan_report = Scanner::new().scan_files(&extracted.files);
    let project_dir = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    let pol = policy::load_policy(&project_dir, &paths::config_dir());
    let decision = pol.check(
        "install",
        &PolicyContext {
            non_interactive,
            risk_score: scan_report.risk_score,
            has_platform_sig: extracted.platform_signature.is_some(),
            session_install_count: session::install_count(),
        },
    );
    let env_report = environment::check_environment(manifest);
    let reg = registry::load_registry(&paths::registry_path()).map_err(internal)?;
    let already_installed = reg
        .get(&manifest.id)
        .map(|r| r.version == manifest.version)
        .unwrap_or(false);

    Ok(DryRunReport {
        id: manifest.id.clone(),
        version: manifest.version.clone(),
        risk_score: scan_report.risk_score,
        scan_passed: scan_report.passed,
        permission_assessment: assessor::assess(&manifest.permissions),
        environment: env_report,
        policy_allowed: decision.allowed,
        policy_reason: decision.reason,
        already_installed,
        would_install_to: install_dir_for(manifest),
    })
}

/// Remove an installed skill: files, registry record, provenance entry.
pub fn uninstall(id: &str) -> Result<UninstallOutcome, SkillPortError> {
    let registry_path = paths::registry_path();
    let mut reg = registry::load_registry(&registry_path).map_err(internal)?;
    let record = reg
        .remove(id)
        .ok_or_else(|| SkillPortError::NotFound(format!("skill '{}' is not installed", id)))?;

    if record.install_path.exists() {
        fs::remove_dir_all(&record.install_path)?;
    }
    registry::save_registry(&registry_path, &reg).map_err(internal)?;

    provenance::append_provenance(
        &paths::provenance_path(),
        "uninstall",
        json!({ "id": record.id, "version": record.version }),
    )
    .map_err(internal)?;
    audit::append_audit("uninstall", json!({ "id": record.id }));
    tracing::info!("Uninstalled {}", record.id);

    Ok(UninstallOutcome {
        id: record.id,
        version: record.version,
        removed_path: record.install_path,
    })
}
