//! Command dispatch: wire CLI arguments to the command layer and shape the
//! returned data for the envelope. Human-readable progress goes to stderr
//! and only when JSON mode is off.

use crate::cli::{Cli, Commands, KeysCommands};
use anyhow::Result;
use serde_json::{json, Value};
use skillport_archive::codec;
use skillport_commands::consent::{Consent, NonInteractiveConsent};
use skillport_commands::marketplace::{HttpMarketplace, Marketplace};
use skillport_commands::{export, install, keys, scan, verify};
use skillport_core::config::CliConfig;
use skillport_core::error::SkillPortError;
use skillport_scanner::{extract_domains, ScanReport};
use std::fs;
use std::io::{self, Write};
use std::path::Path;

/// Terminal-backed consent for interactive installs.
struct StdinConsent;

impl Consent for StdinConsent {
    fn confirm(&self, prompt: &str) -> bool {
        eprint!("{} [y/N] ", prompt);
        let _ = io::stderr().flush();
        let mut line = String::new();
        if io::stdin().read_line(&mut line).is_err() {
            return false;
        }
        matches!(line.trim().to_lowercase().as_str(), "y" | "yes")
    }
}

fn print_scan_report(report: &ScanReport, json_mode: bool) {
    if json_mode {
        return;
    }
    if report.issues.is_empty() {
        eprintln!("✅ No findings. Risk score 0.");
        return;
    }
    eprintln!(
        "📋 {} finding(s), risk score {}/100",
        report.summary.total, report.risk_score
    );
    for issue in &report.issues {
        eprintln!(
            "  [{}] {} {}:{} {}",
            issue.severity.as_str(),
            issue.rule_id,
            issue.file,
            issue.line,
            issue.message
        );
    }
    if !report.skipped_files.is_empty() {
        eprintln!("  ({} file(s) skipped)", report.skipped_files.len());
    }
    if report.passed {
        eprintln!("✅ Scan passed (no high or critical findings).");
    } else {
        eprintln!("❌ Scan failed.");
    }
}

/// Resolve archive bytes from a local path or the marketplace.
fn load_target_bytes(target: &str) -> Result<(Vec<u8>, String)> {
    let path = Path::new(target);
    if path.exists() {
        return Ok((fs::read(path)?, target.to_string()));
    }
    if !target.contains('/') {
        return Err(SkillPortError::FileNotFound(target.to_string()).into());
    }
    let market = HttpMarketplace::from_config(&CliConfig::load())?;
    let listing = market
        .search(target)?
        .ok_or_else(|| SkillPortError::NotFound(target.to_string()))?;
    let url = market.download_url(&listing.id)?;
    let bytes = market.download(&url)?;
    Ok((bytes, format!("marketplace:{}", listing.id)))
}

pub fn run(cli: Cli) -> Result<Value> {
    let json_mode = cli.json;
    match cli.command {
        Commands::Init { dir, id } => {
            let manifest_path = export::init_skill_dir(Path::new(&dir), &id)?;
            if !json_mode {
                eprintln!("✅ Scaffolded {} in {}", id, dir);
            }
            Ok(json!({ "id": id, "manifest_path": manifest_path }))
        }

        Commands::Scan { path } => {
            let report = scan::scan_path(Path::new(&path))?;
            print_scan_report(&report, json_mode);
            Ok(serde_json::to_value(&report)?)
        }

        Commands::Export { dir, output } => {
            let outcome =
                export::export_skill(Path::new(&dir), output.as_deref().map(Path::new))?;
            if !json_mode {
                eprintln!(
                    "✅ Exported {} {} ({} file(s), {} bytes) to {}",
                    outcome.id,
                    outcome.version,
                    outcome.file_count,
                    outcome.archive_size,
                    outcome.path.display()
                );
            }
            Ok(json!({
                "id": outcome.id,
                "version": outcome.version,
                "path": outcome.path,
                "key_id": outcome.key_id,
                "archive_size": outcome.archive_size,
                "file_count": outcome.file_count,
            }))
        }

        Commands::Sign { archive } => {
            let signature = export::sign_archive(Path::new(&archive))?;
            if !json_mode {
                eprintln!("✅ Re-signed {}", archive);
            }
            Ok(json!({ "archive": archive, "signature": signature }))
        }

        Commands::Verify { archive } => {
            let report = verify::verify_archive(Path::new(&archive))?;
            if !json_mode {
                eprintln!("🔎 Verify: {}", archive);
                eprintln!("   Skill: {} {}", report.id, report.version);
                eprintln!("   Author key: {}", report.author_key_id);
                eprintln!(
                    "   Author signature: {}",
                    if report.author_signature_present { "present" } else { "MISSING" }
                );
                eprintln!(
                    "   Checksums: {}",
                    if report.checksums_valid { "valid" } else { "MISMATCH" }
                );
                match report.signature_valid {
                    Some(true) => eprintln!("   Signature: VALID"),
                    Some(false) => eprintln!("   Signature: INVALID"),
                    None => eprintln!("   Signature: signer not locally known"),
                }
            }
            Ok(serde_json::to_value(&report)?)
        }

        Commands::Install {
            target,
            force,
            non_interactive,
            accept_risk,
        } => {
            let non_interactive = non_interactive || json_mode;
            let (bytes, source) = load_target_bytes(&target)?;
            let opts = install::InstallOptions {
                force,
                non_interactive,
                accept_risk,
                source,
            };
            let outcome = if non_interactive {
                install::install_archive_bytes(
                    &bytes,
                    &opts,
                    &NonInteractiveConsent { accept_risk },
                )?
            } else {
                install::install_archive_bytes(&bytes, &opts, &StdinConsent)?
            };
            if !json_mode {
                if outcome.already_installed {
                    eprintln!("✅ {} {} already installed", outcome.id, outcome.version);
                } else {
                    eprintln!(
                        "✅ Installed {} {} to {}",
                        outcome.id,
                        outcome.version,
                        outcome.install_path.display()
                    );
                }
                for warning in &outcome.warnings {
                    eprintln!("   ⚠ {}", warning);
                }
            }
            Ok(serde_json::to_value(&outcome)?)
        }

        Commands::DryRun { target } => {
            let (bytes, _source) = load_target_bytes(&target)?;
            let report = install::dry_run_archive_bytes(&bytes, true)?;
            if !json_mode {
                eprintln!(
                    "🔎 {} {} → {} (risk {}, policy {})",
                    report.id,
                    report.version,
                    report.would_install_to.display(),
                    report.risk_score,
                    if report.policy_allowed { "ok" } else { "DENIED" }
                );
            }
            Ok(serde_json::to_value(&report)?)
        }

        Commands::Uninstall { id } => {
            let outcome = install::uninstall(&id)?;
            if !json_mode {
                eprintln!("✅ Uninstalled {} {}", outcome.id, outcome.version);
            }
            Ok(serde_json::to_value(&outcome)?)
        }

        Commands::Publish { archive } => {
            let path = Path::new(&archive);
            if !path.exists() {
                return Err(SkillPortError::FileNotFound(archive.clone()).into());
            }
            let bytes = fs::read(path)?;

            let report = verify::verify_archive_bytes(&bytes)?;
            if !report.author_signature_present {
                return Err(SkillPortError::SignatureMissing.into());
            }
            if !report.checksums_valid {
                return Err(SkillPortError::ChecksumMismatch(
                    report.checksum_mismatches.join(", "),
                )
                .into());
            }
            let scan_report = scan::scan_path(path)?;
            print_scan_report(&scan_report, json_mode);
            if !scan_report.passed {
                return Err(SkillPortError::ScanFailed(format!(
                    "risk score {}",
                    scan_report.risk_score
                ))
                .into());
            }

            let market = HttpMarketplace::from_config(&CliConfig::load())?;
            let receipt = market.upload(&bytes)?;
            if !json_mode {
                eprintln!("✅ Published {} {}", report.id, report.version);
            }
            Ok(json!({
                "id": receipt.id,
                "url": receipt.url,
                "risk_score": scan_report.risk_score,
            }))
        }

        Commands::Plan { archive } => {
            let path = Path::new(&archive);
            if !path.exists() {
                return Err(SkillPortError::FileNotFound(archive.clone()).into());
            }
            let report = install::dry_run_archive_bytes(&fs::read(path)?, true)?;
            if !json_mode {
                eprintln!("📋 Plan for {} {}", report.id, report.version);
                eprintln!(
                    "   Permissions: {}",
                    report.permission_assessment.summary()
                );
                eprintln!("   Risk score: {}/100", report.risk_score);
                eprintln!(
                    "   Environment: {}",
                    if report.environment.ready { "ready" } else { "NOT READY" }
                );
                eprintln!("   Install path: {}", report.would_install_to.display());
            }
            Ok(serde_json::to_value(&report)?)
        }

        Commands::Inspect { archive } => {
            let path = Path::new(&archive);
            if !path.exists() {
                return Err(SkillPortError::FileNotFound(archive.clone()).into());
            }
            let extracted = codec::extract(&fs::read(path)?)?;
            let manifest_doc: Value = serde_json::from_slice(&extracted.manifest_bytes)?;
            let domains = extracted
                .skill_md
                .as_deref()
                .map(extract_domains)
                .unwrap_or_default();
            if !json_mode {
                eprintln!(
                    "🔎 {} {} ({} payload file(s))",
                    extracted.manifest.id,
                    extracted.manifest.version,
                    extracted.files.len()
                );
            }
            Ok(json!({
                "manifest": manifest_doc,
                "author_signature_present": extracted.author_signature.is_some(),
                "platform_signature_present": extracted.platform_signature.is_some(),
                "payload_files": extracted.files.keys().collect::<Vec<_>>(),
                "skill_md_present": extracted.skill_md.is_some(),
                "skill_md_domains": domains,
            }))
        }

        Commands::Keys { command } => match command {
            KeysCommands::Register { label } => {
                let info = keys::ensure_default_keypair()?;
                let market = HttpMarketplace::from_config(&CliConfig::load())?;
                let registered_id = market.register_key(&info.public_pem, &label)?;
                let mut config = CliConfig::load();
                config.default_key_id = Some(info.key_id.clone());
                config.save()?;
                if !json_mode {
                    eprintln!("✅ Registered key {} as '{}'", info.key_id, label);
                }
                Ok(json!({
                    "key_id": info.key_id,
                    "registered_key_id": registered_id,
                    "created": info.created,
                    "label": label,
                }))
            }
        },

        Commands::Convert { dir, author } => {
            let manifest_path = export::convert_dir(Path::new(&dir), &author)?;
            if !json_mode {
                eprintln!("✅ Wrote {}", manifest_path.display());
            }
            Ok(json!({ "manifest_path": manifest_path }))
        }
    }
}
