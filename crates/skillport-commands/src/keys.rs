//! Local signing key management.
//!
//! The default keypair lives under `keys/` in the config dir; private key
//! material is persisted owner-only. Additional public keys trusted for
//! verification live under `keys/trusted/<key_id>.pub`.

use skillport_archive::crypto;
use skillport_core::config::restrict_permissions;
use skillport_core::error::SkillPortError;
use skillport_core::paths;
use std::fs;

#[derive(Debug, Clone)]
pub struct KeyInfo {
    pub key_id: String,
    pub public_pem: String,
    /// True when this call generated the pair.
    pub created: bool,
}

/// Load the default keypair, generating one on first use.
pub fn ensure_default_keypair() -> Result<KeyInfo, SkillPortError> {
    let pub_path = paths::default_public_key_path();
    let key_path = paths::default_private_key_path();

    if pub_path.exists() && key_path.exists() {
        let public_pem = fs::read_to_string(&pub_path)?;
        return Ok(KeyInfo {
            key_id: crypto::key_id_from_public_pem(&public_pem),
            public_pem,
            created: false,
        });
    }

    let keypair = crypto::generate_keypair()
        .map_err(|e| SkillPortError::Internal(format!("keypair generation: {}", e)))?;
    fs::create_dir_all(paths::keys_dir())?;
    fs::write(&pub_path, &keypair.public_pem)?;
    fs::write(&key_path, &keypair.private_pem)?;
    restrict_permissions(&key_path)
        .map_err(|e| SkillPortError::Internal(e.to_string()))?;
    tracing::info!("Generated signing key {}", keypair.key_id);
    Ok(KeyInfo {
        key_id: keypair.key_id,
        public_pem: keypair.public_pem,
        created: true,
    })
}

/// Read the default private key; absent means the user never ran keygen.
pub fn load_default_private_key() -> Result<String, SkillPortError> {
    let path = paths::default_private_key_path();
    fs::read_to_string(&path)
        .map_err(|_| SkillPortError::KeyMissing(path.display().to_string()))
}

/// Add a public key to the trusted set, keyed by its derived id.
pub fn trust_public_key(public_pem: &str) -> Result<String, SkillPortError> {
    let key_id = crypto::key_id_from_public_pem(public_pem);
    let dir = paths::trusted_keys_dir();
    fs::create_dir_all(&dir)?;
    fs::write(dir.join(format!("{}.pub", key_id)), public_pem)?;
    Ok(key_id)
}

/// Resolve a public key by id: the default key first, then the trusted set.
/// None means no local opinion about this signer.
pub fn find_public_key_by_id(key_id: &str) -> Option<String> {
    let pub_path = paths::default_public_key_path();
    if let Ok(pem) = fs::read_to_string(&pub_path) {
        if crypto::key_id_from_public_pem(&pem) == key_id {
            return Some(pem);
        }
    }
    let trusted = paths::trusted_keys_dir().join(format!("{}.pub", key_id));
    fs::read_to_string(trusted).ok()
}
