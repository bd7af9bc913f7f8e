//! Full install pipeline against a throwaway config home.
//!
//! Scenarios share one process and one SKILLPORT_HOME, so they run inside a
//! single test body, sequentially.

use skillport_archive::{codec, crypto};
use skillport_commands::consent::{Consent, NonInteractiveConsent};
use skillport_commands::install::{self, InstallOptions};
use skillport_commands::keys;
use skillport_core::error::SkillPortError;
use skillport_core::manifest::{self, Manifest};
use skillport_core::{paths, registry, session};
use std::collections::BTreeMap;
use std::fs;
use std::io::Write;

struct DenyConsent;

impl Consent for DenyConsent {
    fn confirm(&self, _prompt: &str) -> bool {
        false
    }
}

fn demo_manifest(id: &str, version: &str, key_id: &str, shell: bool) -> Manifest {
    let raw: manifest::RawManifest = serde_json::from_value(serde_json::json!({
        "ssp_version": "1.0",
        "id": id,
        "version": version,
        "author": { "signing_key_id": key_id },
        "os_compat": ["macos", "linux", "windows"],
        "entrypoints": ["SKILL.md"],
        "permissions": {
            "network": { "mode": "none" },
            "filesystem": {},
            "exec": { "allowed_commands": [], "shell": shell }
        }
    }))
    .unwrap();
    manifest::validate(raw).unwrap()
}

fn make_archive(
    id: &str,
    version: &str,
    extra_files: &[(&str, &str)],
    shell: bool,
    key: &crypto::Keypair,
) -> Vec<u8> {
    let mut files = BTreeMap::new();
    files.insert("SKILL.md".to_string(), b"# Demo".to_vec());
    for (path, content) in extra_files {
        files.insert(path.to_string(), content.as_bytes().to_vec());
    }
    let manifest = demo_manifest(id, version, &key.key_id, shell);
    codec::create(&manifest, &files, &key.private_pem)
        .unwrap()
        .bytes
}

fn non_interactive() -> InstallOptions {
    InstallOptions {
        non_interactive: true,
        ..Default::default()
    }
}

fn set_policy(content: &str) {
    let path = paths::config_dir().join(".skillportrc");
    fs::create_dir_all(paths::config_dir()).unwrap();
    fs::write(path, content).unwrap();
}

fn clear_policy() {
    let _ = fs::remove_file(paths::config_dir().join(".skillportrc"));
}

#[test]
fn test_install_pipeline_end_to_end() {
    let home = tempfile::tempdir().unwrap();
    std::env::set_var(paths::ENV_HOME, home.path());
    session::reset_for_tests();

    let key = crypto::generate_keypair().unwrap();
    let consent = NonInteractiveConsent { accept_risk: false };

    // Fresh install materializes files and registers exactly one record.
    let archive = make_archive("alice/demo", "1.0.0", &[], false, &key);
    let outcome = install::install_archive_bytes(&archive, &non_interactive(), &consent)
        .expect("install should succeed");
    assert!(!outcome.already_installed);
    assert_eq!(outcome.id, "alice/demo");
    assert!(outcome.install_path.join("manifest.json").exists());
    assert!(outcome.install_path.join("SKILL.md").exists());

    let reg = registry::load_registry(&paths::registry_path()).unwrap();
    assert_eq!(reg.skills.len(), 1);

    // Idempotence: a second install without force short-circuits.
    let outcome = install::install_archive_bytes(&archive, &non_interactive(), &consent)
        .expect("reinstall should short-circuit");
    assert!(outcome.already_installed);
    let reg = registry::load_registry(&paths::registry_path()).unwrap();
    assert_eq!(reg.skills.len(), 1);

    // Force reinstall goes through the whole pipeline again.
    let opts = InstallOptions {
        force: true,
        non_interactive: true,
        ..Default::default()
    };
    let outcome = install::install_archive_bytes(&archive, &opts, &consent).unwrap();
    assert!(!outcome.already_installed);
    assert_eq!(
        registry::load_registry(&paths::registry_path())
            .unwrap()
            .skills
            .len(),
        1
    );

    // Upgrade replaces the record instead of adding one.
    let upgraded = make_archive("alice/demo", "1.1.0", &[], false, &key);
    install::install_archive_bytes(&upgraded, &non_interactive(), &consent).unwrap();
    let reg = registry::load_registry(&paths::registry_path()).unwrap();
    assert_eq!(reg.skills.len(), 1);
    assert_eq!(reg.get("alice/demo").unwrap().version, "1.1.0");

    // Policy gate: risk above the auto-install limit denies with a reason
    // naming the limit.
    set_policy(r#"{"policy":{"auto_install":{"max_risk_score":15}}}"#);
    let risky_payload = "import subprocess\n\
        subprocess.run(['ls'])\n\
        subprocess.run(['pwd'])\n\
        subprocess.run(['whoami'])\n\
        subprocess.run(['env'])\n\
        subprocess.run(['date'])\n";
    let risky = make_archive(
        "bob/risky",
        "1.0.0",
        &[("scripts/collect.py", risky_payload)],
        false,
        &key,
    );
    match install::install_archive_bytes(&risky, &non_interactive(), &consent) {
        Err(SkillPortError::PolicyRejected { reason, hints, .. }) => {
            assert!(reason.contains("15"), "reason: {}", reason);
            assert!(!hints.is_empty());
        }
        other => panic!("expected PolicyRejected, got {:?}", other.map(|_| ())),
    }
    clear_policy();

    // Policy fail-closed: requires_approval denies any non-interactive run.
    set_policy(r#"{"policy":{"requires_approval":["install"]}}"#);
    match install::install_archive_bytes(&archive, &non_interactive(), &consent) {
        Err(SkillPortError::PolicyRejected { reason, .. }) => {
            assert!(reason.contains("install"));
        }
        other => panic!("expected PolicyRejected, got {:?}", other.map(|_| ())),
    }
    clear_policy();

    // Scan gate: high-severity findings are fatal without a human.
    let dangerous = make_archive(
        "mallory/evil",
        "1.0.0",
        &[("scripts/run.py", "eval(user_input)\n")],
        false,
        &key,
    );
    match install::install_archive_bytes(&dangerous, &non_interactive(), &consent) {
        Err(SkillPortError::ScanFailed(_)) => {}
        other => panic!("expected ScanFailed, got {:?}", other.map(|_| ())),
    }
    // An interactive decline is equally fatal.
    let opts = InstallOptions::default();
    match install::install_archive_bytes(&dangerous, &opts, &DenyConsent) {
        Err(SkillPortError::ScanFailed(detail)) => assert!(detail.contains("declined")),
        other => panic!("expected ScanFailed, got {:?}", other.map(|_| ())),
    }

    // Elevated risk (shell permission) needs explicit acceptance headless.
    let shelly = make_archive("carol/shelly", "1.0.0", &[], true, &key);
    match install::install_archive_bytes(&shelly, &non_interactive(), &consent) {
        Err(SkillPortError::PolicyRejected { hints, .. }) => {
            assert!(hints.iter().any(|h| h.contains("--accept-risk")));
        }
        other => panic!("expected PolicyRejected, got {:?}", other.map(|_| ())),
    }
    let opts = InstallOptions {
        non_interactive: true,
        accept_risk: true,
        ..Default::default()
    };
    install::install_archive_bytes(&shelly, &opts, &consent)
        .expect("accept-risk should clear the consent gate");

    // Signature gate: a locally known signer must verify. Re-signing with a
    // different key invalidates the archive.
    keys::trust_public_key(&key.public_pem).unwrap();
    let other_key = crypto::generate_keypair().unwrap();
    let (resigned, _) = codec::resign(&archive, &other_key.private_pem).unwrap();
    match install::install_archive_bytes(&resigned, &non_interactive(), &consent) {
        Err(SkillPortError::SignatureInvalid { key_id }) => {
            assert_eq!(key_id, key.key_id);
        }
        other => panic!("expected SignatureInvalid, got {:?}", other.map(|_| ())),
    }

    // Missing author signature is fatal.
    let manifest = demo_manifest("dave/unsigned", "1.0.0", &key.key_id, false);
    let manifest_bytes = manifest.to_canonical_bytes().unwrap();
    let mut writer = zip::ZipWriter::new(std::io::Cursor::new(Vec::new()));
    writer
        .start_file("manifest.json", zip::write::FileOptions::default())
        .unwrap();
    writer.write_all(&manifest_bytes).unwrap();
    let unsigned = writer.finish().unwrap().into_inner();
    match install::install_archive_bytes(&unsigned, &non_interactive(), &consent) {
        Err(SkillPortError::SignatureMissing) => {}
        other => panic!("expected SignatureMissing, got {:?}", other.map(|_| ())),
    }

    // Session cap: with max_per_session=1, the second headless install of
    // the session is denied.
    session::reset_for_tests();
    set_policy(r#"{"policy":{"auto_install":{"max_per_session":1}}}"#);
    let first = make_archive("erin/one", "1.0.0", &[], false, &key);
    install::install_archive_bytes(&first, &non_interactive(), &consent).unwrap();
    let second = make_archive("erin/two", "1.0.0", &[], false, &key);
    match install::install_archive_bytes(&second, &non_interactive(), &consent) {
        Err(SkillPortError::PolicyRejected { reason, .. }) => {
            assert!(reason.contains("session"), "reason: {}", reason);
        }
        other => panic!("expected PolicyRejected, got {:?}", other.map(|_| ())),
    }
    clear_policy();

    // Dry run reports without writing.
    let fresh = make_archive("frank/fresh", "0.1.0", &[], false, &key);
    let report = install::dry_run_archive_bytes(&fresh, true).unwrap();
    assert_eq!(report.id, "frank/fresh");
    assert!(!report.already_installed);
    assert!(!report.would_install_to.exists());

    // Uninstall removes files and the registry record; a second call is
    // NotFound.
    let outcome = install::uninstall("alice/demo").unwrap();
    assert!(!outcome.removed_path.exists());
    let reg = registry::load_registry(&paths::registry_path()).unwrap();
    assert!(reg.get("alice/demo").is_none());
    match install::uninstall("alice/demo") {
        Err(SkillPortError::NotFound(_)) => {}
        other => panic!("expected NotFound, got {:?}", other.map(|_| ())),
    }

    // Provenance recorded every action, one JSON object per line.
    let provenance = fs::read_to_string(paths::provenance_path()).unwrap();
    let lines: Vec<&str> = provenance.lines().collect();
    assert!(lines.len() >= 5);
    for line in &lines {
        let value: serde_json::Value = serde_json::from_str(line).unwrap();
        assert!(value["ts"].is_string());
        assert!(value["session_id"].is_string());
        assert!(value["action"].is_string());
    }
    assert!(provenance.contains("\"uninstall\""));

    std::env::remove_var(paths::ENV_HOME);
}
