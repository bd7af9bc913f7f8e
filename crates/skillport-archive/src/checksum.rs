//! Per-file SHA-256 checksums over an in-memory file map.

use crate::crypto::sha256_hex;
use std::collections::BTreeMap;

/// Compute checksums for every entry, preserving paths.
pub fn compute_checksums(files: &BTreeMap<String, Vec<u8>>) -> BTreeMap<String, String> {
    files
        .iter()
        .map(|(path, bytes)| (path.clone(), sha256_hex(bytes)))
        .collect()
}

/// Verify a file map against expected digests. A path is a mismatch both
/// when present-and-different and when absent.
pub fn verify_checksums(
    files: &BTreeMap<String, Vec<u8>>,
    expected: &BTreeMap<String, String>,
) -> (bool, Vec<String>) {
    let mut mismatches = Vec::new();
    for (path, digest) in expected {
        match files.get(path) {
            Some(bytes) if &sha256_hex(bytes) == digest => {}
            _ => mismatches.push(path.clone()),
        }
    }
    (mismatches.is_empty(), mismatches)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn files() -> BTreeMap<String, Vec<u8>> {
        let mut map = BTreeMap::new();
        map.insert("SKILL.md".to_string(), b"# Demo".to_vec());
        map.insert("payload/run.py".to_string(), b"print('hi')".to_vec());
        map
    }

    #[test]
    fn test_compute_and_verify() {
        let files = files();
        let sums = compute_checksums(&files);
        assert_eq!(sums.len(), 2);
        let (ok, mismatches) = verify_checksums(&files, &sums);
        assert!(ok);
        assert!(mismatches.is_empty());
    }

    #[test]
    fn test_flipped_byte_is_flagged() {
        let files = files();
        let sums = compute_checksums(&files);
        let mut tampered = files.clone();
        tampered.get_mut("payload/run.py").unwrap()[0] ^= 0x01;
        let (ok, mismatches) = verify_checksums(&tampered, &sums);
        assert!(!ok);
        assert_eq!(mismatches, vec!["payload/run.py".to_string()]);
    }

    #[test]
    fn test_absent_file_is_flagged() {
        let files = files();
        let sums = compute_checksums(&files);
        let mut partial = files.clone();
        partial.remove("SKILL.md");
        let (ok, mismatches) = verify_checksums(&partial, &sums);
        assert!(!ok);
        assert_eq!(mismatches, vec!["SKILL.md".to_string()]);
    }
}
