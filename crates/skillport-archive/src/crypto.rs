//! Ed25519 signing and SHA-256 hashing.
//!
//! Keys travel as PEM: SPKI for public keys, PKCS#8 for private keys.
//! The key id is the first 16 hex chars of SHA-256 over the public PEM
//! string, which lets a manifest name its signer without embedding the key.

use anyhow::{anyhow, Context, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ed25519_dalek::pkcs8::spki::{DecodePublicKey, EncodePublicKey};
use ed25519_dalek::pkcs8::{DecodePrivateKey, EncodePrivateKey};
use ed25519_dalek::{Signature, Signer, SigningKey, Verifier, VerifyingKey};
use pkcs8::LineEnding;
use rand::rngs::OsRng;
use sha2::{Digest, Sha256};

pub const KEY_ID_LEN: usize = 16;

/// A freshly generated signing identity.
#[derive(Debug, Clone)]
pub struct Keypair {
    pub public_pem: String,
    pub private_pem: String,
    pub key_id: String,
}

/// Generate an Ed25519 keypair with PEM encodings and derived key id.
pub fn generate_keypair() -> Result<Keypair> {
    let signing_key = SigningKey::generate(&mut OsRng);
    let private_pem = signing_key
        .to_pkcs8_pem(LineEnding::LF)
        .map_err(|e| anyhow!("Failed to encode private key: {}", e))?
        .to_string();
    let public_pem = signing_key
        .verifying_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| anyhow!("Failed to encode public key: {}", e))?;
    let key_id = key_id_from_public_pem(&public_pem);
    Ok(Keypair {
        public_pem,
        private_pem,
        key_id,
    })
}

/// First 16 lowercase hex chars of SHA-256 over the public PEM string.
pub fn key_id_from_public_pem(public_pem: &str) -> String {
    let digest = sha256_hex(public_pem.as_bytes());
    digest[..KEY_ID_LEN].to_string()
}

/// SHA-256 as 64-char lowercase hex.
pub fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hex::encode(hasher.finalize())
}

/// Derive the SPKI public PEM from a PKCS#8 private PEM.
pub fn public_pem_from_private(private_pem: &str) -> Result<String> {
    let signing_key =
        SigningKey::from_pkcs8_pem(private_pem).context("Failed to parse private key PEM")?;
    signing_key
        .verifying_key()
        .to_public_key_pem(LineEnding::LF)
        .map_err(|e| anyhow!("Failed to encode public key: {}", e))
}

/// Sign the exact bytes given. Returns base64 of the 64-byte signature.
pub fn sign(message: &[u8], private_pem: &str) -> Result<String> {
    let signing_key =
        SigningKey::from_pkcs8_pem(private_pem).context("Failed to parse private key PEM")?;
    let signature: Signature = signing_key.sign(message);
    Ok(BASE64.encode(signature.to_bytes()))
}

/// Verify a detached signature. Never raises: malformed key, base64, or
/// signature bytes all report as `false`.
pub fn verify(message: &[u8], signature_b64: &str, public_pem: &str) -> bool {
    let Ok(verifying_key) = VerifyingKey::from_public_key_pem(public_pem) else {
        return false;
    };
    let Ok(sig_bytes) = BASE64.decode(signature_b64.trim()) else {
        return false;
    };
    let Ok(sig_array) = <[u8; 64]>::try_from(sig_bytes.as_slice()) else {
        return false;
    };
    let signature = Signature::from_bytes(&sig_array);
    verifying_key.verify(message, &signature).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_verify_round_trip() {
        let kp = generate_keypair().unwrap();
        let sig = sign(b"payload bytes", &kp.private_pem).unwrap();
        assert!(verify(b"payload bytes", &sig, &kp.public_pem));
        assert!(!verify(b"other bytes", &sig, &kp.public_pem));
    }

    #[test]
    fn test_verify_is_total_on_garbage() {
        let kp = generate_keypair().unwrap();
        assert!(!verify(b"m", "not base64!!!", &kp.public_pem));
        assert!(!verify(b"m", "aGVsbG8=", &kp.public_pem)); // wrong length
        assert!(!verify(b"m", "", "not a pem"));
    }

    #[test]
    fn test_key_id_shape() {
        let kp = generate_keypair().unwrap();
        assert_eq!(kp.key_id.len(), KEY_ID_LEN);
        assert!(kp.key_id.chars().all(|c| c.is_ascii_hexdigit()));
        assert_eq!(kp.key_id, key_id_from_public_pem(&kp.public_pem));
    }

    #[test]
    fn test_sha256_hex() {
        // Known vector for the empty input.
        assert_eq!(
            sha256_hex(b""),
            "e3b0c44298fc1c149afbf4c8996fb92427ae41e4649b934ca495991b7852b855"
        );
    }
}
