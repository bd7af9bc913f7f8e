//! End-to-end archive codec properties: round-trip, tamper evidence,
//! zip-slip rejection, bomb cap.

use skillport_archive::codec::{
    self, AUTHOR_SIG_ENTRY, MANIFEST_ENTRY, MAX_UNCOMPRESSED_BYTES,
};
use skillport_archive::{checksum, crypto};
use skillport_core::error::SkillPortError;
use skillport_core::manifest::{self, Manifest, RawManifest};
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};

fn demo_manifest(key_id: &str) -> Manifest {
    let raw: RawManifest = serde_json::from_value(serde_json::json!({
        "ssp_version": "1.0",
        "id": "alice/demo",
        "version": "1.0.0",
        "author": { "signing_key_id": key_id },
        "os_compat": ["macos", "linux"],
        "entrypoints": ["SKILL.md"],
        "permissions": {
            "network": { "mode": "none" },
            "filesystem": {},
            "exec": {}
        }
    }))
    .unwrap();
    manifest::validate(raw).unwrap()
}

fn demo_files() -> BTreeMap<String, Vec<u8>> {
    let mut files = BTreeMap::new();
    files.insert("SKILL.md".to_string(), b"# Demo".to_vec());
    files.insert("scripts/run.py".to_string(), b"print('demo')\n".to_vec());
    files
}

#[test]
fn test_create_extract_round_trip() {
    let kp = crypto::generate_keypair().unwrap();
    let created = codec::create(&demo_manifest(&kp.key_id), &demo_files(), &kp.private_pem)
        .unwrap();

    let extracted = codec::extract(&created.bytes).unwrap();
    assert_eq!(extracted.manifest, created.manifest);
    assert_eq!(extracted.manifest_bytes, created.manifest_bytes);
    assert_eq!(extracted.skill_md.as_deref(), Some("# Demo"));
    assert_eq!(
        extracted.author_signature.as_deref(),
        Some(created.author_signature.as_str())
    );
    assert!(extracted.platform_signature.is_none());

    // Payload mapping: SKILL.md at the root, everything else under payload/.
    assert!(extracted.files.contains_key("SKILL.md"));
    assert!(extracted.files.contains_key("payload/scripts/run.py"));

    let (ok, mismatches) = checksum::verify_checksums(&extracted.files, &extracted.checksums);
    assert!(ok, "unexpected mismatches: {:?}", mismatches);

    // The signature verifies over the stored bytes.
    let sig = extracted.author_signature.unwrap();
    assert!(crypto::verify(&extracted.manifest_bytes, &sig, &kp.public_pem));
}

#[test]
fn test_create_is_deterministic() {
    let kp = crypto::generate_keypair().unwrap();
    let a = codec::create(&demo_manifest(&kp.key_id), &demo_files(), &kp.private_pem).unwrap();
    let b = codec::create(&demo_manifest(&kp.key_id), &demo_files(), &kp.private_pem).unwrap();
    assert_eq!(a.bytes, b.bytes);
}

#[test]
fn test_payload_tamper_breaks_checksum() {
    let kp = crypto::generate_keypair().unwrap();
    let created = codec::create(&demo_manifest(&kp.key_id), &demo_files(), &kp.private_pem)
        .unwrap();
    let extracted = codec::extract(&created.bytes).unwrap();

    let mut tampered = extracted.files.clone();
    tampered.get_mut("payload/scripts/run.py").unwrap()[0] ^= 0x01;
    let (ok, mismatches) = checksum::verify_checksums(&tampered, &extracted.checksums);
    assert!(!ok);
    assert_eq!(mismatches, vec!["payload/scripts/run.py".to_string()]);
}

/// Rebuild an archive byte-for-byte, replacing one entry's contents.
fn rewrite_archive(bytes: &[u8], replace: &str, content: &[u8]) -> Vec<u8> {
    let mut reader = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();
    for i in 0..reader.len() {
        let mut entry = reader.by_index(i).unwrap();
        let name = entry.name().to_string();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).unwrap();
        if name == replace {
            data = content.to_vec();
        }
        writer.start_file(name, options).unwrap();
        writer.write_all(&data).unwrap();
    }
    writer.finish().unwrap().into_inner()
}

#[test]
fn test_manifest_tamper_breaks_signature() {
    let kp = crypto::generate_keypair().unwrap();
    let created = codec::create(&demo_manifest(&kp.key_id), &demo_files(), &kp.private_pem)
        .unwrap();

    // Flip one byte inside the stored manifest without re-signing.
    let mut manifest_bytes = created.manifest_bytes.clone();
    let idx = manifest_bytes.len() / 2;
    manifest_bytes[idx] ^= 0x20;
    let tampered = rewrite_archive(&created.bytes, MANIFEST_ENTRY, &manifest_bytes);

    match codec::extract(&tampered) {
        Ok(extracted) => {
            let sig = extracted.author_signature.unwrap();
            assert!(!crypto::verify(&extracted.manifest_bytes, &sig, &kp.public_pem));
        }
        // Byte flips that break JSON parsing surface as schema errors,
        // which is an equally hard stop.
        Err(SkillPortError::ManifestInvalid(_)) => {}
        Err(e) => panic!("unexpected error: {}", e),
    }
}

fn zip_with_entry(name: &str, content: &[u8]) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();
    writer.start_file(name, options).unwrap();
    writer.write_all(content).unwrap();
    writer.finish().unwrap().into_inner()
}

#[test]
fn test_zip_slip_backslash_rejected() {
    let kp = crypto::generate_keypair().unwrap();
    let created = codec::create(&demo_manifest(&kp.key_id), &demo_files(), &kp.private_pem)
        .unwrap();

    // Append a traversal entry to an otherwise valid archive.
    let mut reader = zip::ZipArchive::new(Cursor::new(created.bytes.as_slice())).unwrap();
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    let options = zip::write::FileOptions::default();
    for i in 0..reader.len() {
        let mut entry = reader.by_index(i).unwrap();
        let name = entry.name().to_string();
        let mut data = Vec::new();
        entry.read_to_end(&mut data).unwrap();
        writer.start_file(name, options).unwrap();
        writer.write_all(&data).unwrap();
    }
    writer
        .start_file("payload\\..\\..\\etc\\passwd", options)
        .unwrap();
    writer.write_all(b"root:x").unwrap();
    let evil = writer.finish().unwrap().into_inner();

    match codec::extract(&evil) {
        Err(SkillPortError::ZipSlip(name)) => assert!(name.contains("..")),
        other => panic!("expected ZipSlip, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_zip_slip_variants_rejected() {
    for name in ["../escape.txt", "/abs/path.txt", "payload/a\\b.txt"] {
        let bytes = zip_with_entry(name, b"x");
        match codec::extract(&bytes) {
            Err(SkillPortError::ZipSlip(_)) => {}
            other => panic!("{} should be rejected, got {:?}", name, other.map(|_| ())),
        }
    }
}

#[test]
fn test_missing_manifest_is_malformed() {
    let bytes = zip_with_entry("payload/readme.txt", b"hello");
    match codec::extract(&bytes) {
        Err(SkillPortError::MalformedArchive(msg)) => assert!(msg.contains("manifest.json")),
        other => panic!("expected MalformedArchive, got {:?}", other.map(|_| ())),
    }
}

#[test]
fn test_decompression_bomb_cap() {
    let kp = crypto::generate_keypair().unwrap();
    let mut files = demo_files();
    files.insert("big.bin".to_string(), vec![0u8; 4096]);
    let created = codec::create(&demo_manifest(&kp.key_id), &files, &kp.private_pem).unwrap();

    // Under a tight budget the same archive trips the cap mid-read.
    match codec::extract_with_limit(&created.bytes, 1024) {
        Err(SkillPortError::DecompressionBomb { limit }) => assert_eq!(limit, 1024),
        other => panic!("expected DecompressionBomb, got {:?}", other.map(|_| ())),
    }

    // The production cap admits it untouched.
    assert!(codec::extract_with_limit(&created.bytes, MAX_UNCOMPRESSED_BYTES).is_ok());
}

#[test]
fn test_author_sig_entry_surfaced() {
    let kp = crypto::generate_keypair().unwrap();
    let created = codec::create(&demo_manifest(&kp.key_id), &demo_files(), &kp.private_pem)
        .unwrap();
    let extracted = codec::extract(&created.bytes).unwrap();
    let sig = extracted.author_signature.unwrap();
    assert!(!sig.is_empty());
    // Entry name is part of the container contract.
    let mut reader = zip::ZipArchive::new(Cursor::new(created.bytes.as_slice())).unwrap();
    assert!(reader.by_name(AUTHOR_SIG_ENTRY).is_ok());
}
