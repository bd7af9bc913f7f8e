//! Archive verification: schema, checksums, signatures.

use crate::keys;
use serde::Serialize;
use skillport_archive::{checksum, codec, crypto};
use skillport_core::error::SkillPortError;
use std::fs;
use std::path::Path;

#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub id: String,
    pub version: String,
    pub author_key_id: String,
    pub author_signature_present: bool,
    pub platform_signature_present: bool,
    pub checksums_valid: bool,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub checksum_mismatches: Vec<String>,
    /// None when no locally known key matches the manifest's signer.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub signature_valid: Option<bool>,
    pub skill_md_present: bool,
}

/// Inspect an archive and report every verification dimension without
/// failing fast. Callers that need a hard gate use [`verify_strict`].
pub fn verify_archive_bytes(bytes: &[u8]) -> Result<VerifyReport, SkillPortError> {
    let extracted = codec::extract(bytes)?;

    let (checksums_valid, checksum_mismatches) =
        checksum::verify_checksums(&extracted.files, &extracted.manifest.hashes);

    let signature_valid = match (
        extracted.author_signature.as_ref(),
        keys::find_public_key_by_id(&extracted.manifest.author.signing_key_id),
    ) {
        (Some(sig), Some(public_pem)) => {
            Some(crypto::verify(&extracted.manifest_bytes, sig, &public_pem))
        }
        _ => None,
    };

    Ok(VerifyReport {
        id: extracted.manifest.id.clone(),
        version: extracted.manifest.version.clone(),
        author_key_id: extracted.manifest.author.signing_key_id.clone(),
        author_signature_present: extracted.author_signature.is_some(),
        platform_signature_present: extracted.platform_signature.is_some(),
        checksums_valid,
        checksum_mismatches,
        signature_valid,
        skill_md_present: extracted.skill_md.is_some(),
    })
}

pub fn verify_archive(path: &Path) -> Result<VerifyReport, SkillPortError> {
    if !path.exists() {
        return Err(SkillPortError::FileNotFound(path.display().to_string()));
    }
    verify_archive_bytes(&fs::read(path)?)
}

/// The install-grade gate: checksums must hold, the author signature must
/// exist, and when the signer's key is locally known it must verify.
/// An unknown signer with a well-formed signature is accepted.
pub fn verify_strict(extracted: &codec::ExtractedArchive) -> Result<(), SkillPortError> {
    let (ok, mismatches) =
        checksum::verify_checksums(&extracted.files, &extracted.manifest.hashes);
    if !ok {
        return Err(SkillPortError::ChecksumMismatch(mismatches.join(", ")));
    }

    let Some(signature) = extracted.author_signature.as_ref() else {
        return Err(SkillPortError::SignatureMissing);
    };

    let key_id = &extracted.manifest.author.signing_key_id;
    if let Some(public_pem) = keys::find_public_key_by_id(key_id) {
        if !crypto::verify(&extracted.manifest_bytes, signature, &public_pem) {
            return Err(SkillPortError::SignatureInvalid {
                key_id: key_id.clone(),
            });
        }
    }
    Ok(())
}
