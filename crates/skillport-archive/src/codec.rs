//! `.ssp` container codec.
//!
//! Create is deterministic: fixed entry order, deflate level 9, fixed
//! timestamps. Extract is defensive: zip-slip names are rejected before any
//! path handling and cumulative uncompressed size is capped.
//!
//! The manifest bytes returned by [`extract`] are the bytes stored in the
//! archive, never a re-serialization: they are what the author signature
//! was computed over.

use crate::checksum::compute_checksums;
use crate::crypto;
use skillport_core::error::SkillPortError;
use skillport_core::manifest::Manifest;
use std::collections::BTreeMap;
use std::io::{Cursor, Read, Write};
use zip::result::ZipError;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

pub const MANIFEST_ENTRY: &str = "manifest.json";
pub const CHECKSUMS_ENTRY: &str = "checksums.json";
pub const AUTHOR_SIG_ENTRY: &str = "signatures/author.sig";
pub const PLATFORM_SIG_ENTRY: &str = "signatures/platform.sig";
pub const SKILL_MD_ENTRY: &str = "SKILL.md";
pub const PAYLOAD_PREFIX: &str = "payload/";

/// Hard cap on cumulative uncompressed size per archive.
pub const MAX_UNCOMPRESSED_BYTES: u64 = 500 * 1024 * 1024;

/// Result of building an archive.
#[derive(Debug, Clone)]
pub struct CreatedArchive {
    pub bytes: Vec<u8>,
    /// Final manifest (hashes populated) as embedded in the archive.
    pub manifest: Manifest,
    /// The exact bytes that were signed and stored as `manifest.json`.
    pub manifest_bytes: Vec<u8>,
    pub author_signature: String,
}

/// Result of reading an archive back.
#[derive(Debug, Clone)]
pub struct ExtractedArchive {
    pub manifest: Manifest,
    /// Raw `manifest.json` bytes as stored; signature verification input.
    pub manifest_bytes: Vec<u8>,
    /// Non-metadata entries by archive-internal path (`SKILL.md`,
    /// `payload/...`).
    pub files: BTreeMap<String, Vec<u8>>,
    pub author_signature: Option<String>,
    pub platform_signature: Option<String>,
    pub checksums: BTreeMap<String, String>,
    pub skill_md: Option<String>,
}

/// Archive paths are logical forward-slash paths; anything that could
/// escape an extraction root is rejected regardless of host OS.
fn is_unsafe_entry_name(name: &str) -> bool {
    name.contains("..") || name.starts_with('/') || name.contains('\\')
}

/// Map a caller-visible logical path to its archive-internal path:
/// `SKILL.md` stays at the root, everything else goes under `payload/`.
pub fn internal_path(logical: &str) -> String {
    if logical == SKILL_MD_ENTRY {
        SKILL_MD_ENTRY.to_string()
    } else {
        format!("{}{}", PAYLOAD_PREFIX, logical)
    }
}

/// Build a signed `.ssp` archive from a validated manifest and a map of
/// logical paths to file bytes.
pub fn create(
    manifest: &Manifest,
    files: &BTreeMap<String, Vec<u8>>,
    private_key_pem: &str,
) -> Result<CreatedArchive, SkillPortError> {
    for ep in &manifest.entrypoints {
        if !files.contains_key(ep) {
            return Err(SkillPortError::ManifestInvalid(format!(
                "entrypoint '{}' is not in the payload",
                ep
            )));
        }
    }

    let mut internal: BTreeMap<String, Vec<u8>> = BTreeMap::new();
    for (logical, bytes) in files {
        if is_unsafe_entry_name(logical) {
            return Err(SkillPortError::InputInvalid(format!(
                "unsafe payload path: {}",
                logical
            )));
        }
        internal.insert(internal_path(logical), bytes.clone());
    }

    let mut manifest = manifest.clone();
    manifest.hashes = compute_checksums(&internal);

    let manifest_bytes = manifest
        .to_canonical_bytes()
        .map_err(|e| SkillPortError::ManifestInvalid(e.to_string()))?;
    let author_signature = crypto::sign(&manifest_bytes, private_key_pem)
        .map_err(|e| SkillPortError::InputInvalid(format!("signing failed: {}", e)))?;

    let checksums_bytes = serde_json::to_vec_pretty(&manifest.hashes)
        .map_err(|e| SkillPortError::InputInvalid(format!("checksum serialization: {}", e)))?;

    let cursor = Cursor::new(Vec::new());
    let mut writer = ZipWriter::new(cursor);
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9))
        .last_modified_time(zip::DateTime::default());

    let write_entry = |writer: &mut ZipWriter<Cursor<Vec<u8>>>,
                           name: &str,
                           bytes: &[u8]|
     -> Result<(), SkillPortError> {
        writer
            .start_file(name, options)
            .and_then(|_| writer.write_all(bytes).map_err(ZipError::Io))
            .map_err(|e| SkillPortError::InputInvalid(format!("zip write {}: {}", name, e)))
    };

    // Fixed logical order keeps byte-identical archives for identical input.
    write_entry(&mut writer, MANIFEST_ENTRY, &manifest_bytes)?;
    write_entry(&mut writer, AUTHOR_SIG_ENTRY, author_signature.as_bytes())?;
    write_entry(&mut writer, CHECKSUMS_ENTRY, &checksums_bytes)?;
    if let Some(skill_md) = internal.get(SKILL_MD_ENTRY) {
        write_entry(&mut writer, SKILL_MD_ENTRY, skill_md)?;
    }
    for (path, bytes) in &internal {
        if path == SKILL_MD_ENTRY {
            continue;
        }
        write_entry(&mut writer, path, bytes)?;
    }

    let cursor = writer
        .finish()
        .map_err(|e| SkillPortError::InputInvalid(format!("zip finalize: {}", e)))?;

    Ok(CreatedArchive {
        bytes: cursor.into_inner(),
        manifest,
        manifest_bytes,
        author_signature,
    })
}

/// Re-sign an existing archive with a different key: the stored
/// `manifest.json` bytes are signed as-is and only `signatures/author.sig`
/// is replaced. Entry order is preserved.
pub fn resign(bytes: &[u8], private_key_pem: &str) -> Result<(Vec<u8>, String), SkillPortError> {
    let mut reader = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| SkillPortError::MalformedArchive(format!("not a zip archive: {}", e)))?;

    let manifest_bytes = match reader.by_name(MANIFEST_ENTRY) {
        Ok(entry) => read_entry_bytes(entry, MAX_UNCOMPRESSED_BYTES, MAX_UNCOMPRESSED_BYTES)?,
        Err(_) => {
            return Err(SkillPortError::MalformedArchive(
                "manifest.json missing".to_string(),
            ))
        }
    };
    let signature = crypto::sign(&manifest_bytes, private_key_pem)
        .map_err(|e| SkillPortError::InputInvalid(format!("signing failed: {}", e)))?;

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .compression_level(Some(9))
        .last_modified_time(zip::DateTime::default());
    let mut wrote_sig = false;
    for i in 0..reader.len() {
        let mut entry = reader
            .by_index(i)
            .map_err(|e| SkillPortError::MalformedArchive(format!("entry {}: {}", i, e)))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let data = if name == AUTHOR_SIG_ENTRY {
            wrote_sig = true;
            signature.clone().into_bytes()
        } else {
            let mut buf = Vec::new();
            entry
                .read_to_end(&mut buf)
                .map_err(|e| SkillPortError::MalformedArchive(format!("{}: {}", name, e)))?;
            buf
        };
        writer
            .start_file(name.as_str(), options)
            .and_then(|_| writer.write_all(&data).map_err(ZipError::Io))
            .map_err(|e| SkillPortError::InputInvalid(format!("zip write {}: {}", name, e)))?;
    }
    if !wrote_sig {
        writer
            .start_file(AUTHOR_SIG_ENTRY, options)
            .and_then(|_| writer.write_all(signature.as_bytes()).map_err(ZipError::Io))
            .map_err(|e| SkillPortError::InputInvalid(format!("zip write signature: {}", e)))?;
    }
    let cursor = writer
        .finish()
        .map_err(|e| SkillPortError::InputInvalid(format!("zip finalize: {}", e)))?;
    Ok((cursor.into_inner(), signature))
}

fn read_entry_bytes<R: Read>(
    mut entry: R,
    budget: u64,
    limit: u64,
) -> Result<Vec<u8>, SkillPortError> {
    let mut buf = Vec::new();
    let mut limited = entry.by_ref().take(budget.saturating_add(1));
    limited
        .read_to_end(&mut buf)
        .map_err(|e| SkillPortError::MalformedArchive(format!("entry read: {}", e)))?;
    if buf.len() as u64 > budget {
        return Err(SkillPortError::DecompressionBomb { limit });
    }
    Ok(buf)
}

fn read_optional_text(
    archive: &mut ZipArchive<Cursor<&[u8]>>,
    name: &str,
) -> Result<Option<String>, SkillPortError> {
    match archive.by_name(name) {
        Ok(mut entry) => {
            let mut s = String::new();
            entry
                .read_to_string(&mut s)
                .map_err(|e| SkillPortError::MalformedArchive(format!("{}: {}", name, e)))?;
            let trimmed = s.trim().to_string();
            Ok((!trimmed.is_empty()).then_some(trimmed))
        }
        Err(ZipError::FileNotFound) => Ok(None),
        Err(e) => Err(SkillPortError::MalformedArchive(format!("{}: {}", name, e))),
    }
}

/// Read an archive with the default bomb cap.
pub fn extract(bytes: &[u8]) -> Result<ExtractedArchive, SkillPortError> {
    extract_with_limit(bytes, MAX_UNCOMPRESSED_BYTES)
}

/// Read an archive with an explicit cumulative uncompressed budget.
pub fn extract_with_limit(
    bytes: &[u8],
    limit: u64,
) -> Result<ExtractedArchive, SkillPortError> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|e| SkillPortError::MalformedArchive(format!("not a zip archive: {}", e)))?;

    // Entry names are validated up front, before anything is decompressed
    // or joined to a path.
    for i in 0..archive.len() {
        let entry = archive
            .by_index_raw(i)
            .map_err(|e| SkillPortError::MalformedArchive(format!("entry {}: {}", i, e)))?;
        let name = entry.name().to_string();
        if is_unsafe_entry_name(&name) {
            return Err(SkillPortError::ZipSlip(name));
        }
    }

    let manifest_bytes = match archive.by_name(MANIFEST_ENTRY) {
        Ok(entry) => read_entry_bytes(entry, limit, limit)?,
        Err(ZipError::FileNotFound) => {
            return Err(SkillPortError::MalformedArchive(
                "manifest.json missing".to_string(),
            ))
        }
        Err(e) => {
            return Err(SkillPortError::MalformedArchive(format!(
                "manifest.json: {}",
                e
            )))
        }
    };
    let manifest = Manifest::from_slice(&manifest_bytes)?;

    let author_signature = read_optional_text(&mut archive, AUTHOR_SIG_ENTRY)?;
    let platform_signature = read_optional_text(&mut archive, PLATFORM_SIG_ENTRY)?;

    let checksums: BTreeMap<String, String> = match archive.by_name(CHECKSUMS_ENTRY) {
        Ok(entry) => {
            let bytes = read_entry_bytes(entry, limit, limit)?;
            serde_json::from_slice(&bytes)
                .map_err(|e| SkillPortError::MalformedArchive(format!("checksums.json: {}", e)))?
        }
        Err(ZipError::FileNotFound) => BTreeMap::new(),
        Err(e) => {
            return Err(SkillPortError::MalformedArchive(format!(
                "checksums.json: {}",
                e
            )))
        }
    };

    let mut files = BTreeMap::new();
    let mut total: u64 = 0;
    for i in 0..archive.len() {
        let entry = archive
            .by_index(i)
            .map_err(|e| SkillPortError::MalformedArchive(format!("entry {}: {}", i, e)))?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        if name == MANIFEST_ENTRY
            || name == CHECKSUMS_ENTRY
            || name.starts_with("signatures/")
        {
            continue;
        }
        let budget = limit.saturating_sub(total);
        let bytes = read_entry_bytes(entry, budget, limit)?;
        total += bytes.len() as u64;
        files.insert(name, bytes);
    }

    let skill_md = files
        .get(SKILL_MD_ENTRY)
        .map(|b| String::from_utf8_lossy(b).to_string());

    Ok(ExtractedArchive {
        manifest,
        manifest_bytes,
        files,
        author_signature,
        platform_signature,
        checksums,
        skill_md,
    })
}
