//! Installed-skills registry.
//!
//! A single JSON document rewritten atomically (temp file + rename).
//! Invariant: at most one record per skill id.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegistryRecord {
    pub id: String,
    pub version: String,
    pub installed_at: DateTime<Utc>,
    pub install_path: PathBuf,
    pub author_key_id: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Registry {
    #[serde(default)]
    pub skills: Vec<RegistryRecord>,
}

impl Registry {
    pub fn get(&self, id: &str) -> Option<&RegistryRecord> {
        self.skills.iter().find(|r| r.id == id)
    }

    /// Replace any record with the same id, then append.
    pub fn upsert(&mut self, record: RegistryRecord) {
        self.skills.retain(|r| r.id != record.id);
        self.skills.push(record);
    }

    pub fn remove(&mut self, id: &str) -> Option<RegistryRecord> {
        let pos = self.skills.iter().position(|r| r.id == id)?;
        Some(self.skills.remove(pos))
    }
}

/// Load the registry; a missing file is an empty registry.
pub fn load_registry(path: &Path) -> Result<Registry> {
    if !path.exists() {
        return Ok(Registry::default());
    }
    let content = fs::read_to_string(path)
        .with_context(|| format!("Failed to read registry: {}", path.display()))?;
    serde_json::from_str(&content)
        .with_context(|| format!("Failed to parse registry JSON: {}", path.display()))
}

/// Persist the registry atomically: write a sibling temp file, then rename
/// over the target so concurrent readers never see a half-written document.
pub fn save_registry(path: &Path, registry: &Registry) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create registry dir: {}", parent.display()))?;
    }
    let data = serde_json::to_string_pretty(registry)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, data)
        .with_context(|| format!("Failed to write registry temp file: {}", tmp.display()))?;
    fs::rename(&tmp, path)
        .with_context(|| format!("Failed to replace registry: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str, version: &str) -> RegistryRecord {
        RegistryRecord {
            id: id.to_string(),
            version: version.to_string(),
            installed_at: Utc::now(),
            install_path: PathBuf::from("/tmp/skills").join(id),
            author_key_id: "0123456789abcdef".to_string(),
        }
    }

    #[test]
    fn test_upsert_keeps_single_record_per_id() {
        let mut reg = Registry::default();
        reg.upsert(record("alice/demo", "1.0.0"));
        reg.upsert(record("alice/demo", "1.1.0"));
        reg.upsert(record("bob/other", "0.1.0"));
        assert_eq!(reg.skills.len(), 2);
        assert_eq!(reg.get("alice/demo").unwrap().version, "1.1.0");
    }

    #[test]
    fn test_remove() {
        let mut reg = Registry::default();
        reg.upsert(record("alice/demo", "1.0.0"));
        assert!(reg.remove("alice/demo").is_some());
        assert!(reg.remove("alice/demo").is_none());
        assert!(reg.skills.is_empty());
    }

    #[test]
    fn test_save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("installed").join("registry.json");
        let mut reg = Registry::default();
        reg.upsert(record("alice/demo", "1.0.0"));
        save_registry(&path, &reg).unwrap();
        // No stray temp file left behind.
        assert!(!path.with_extension("json.tmp").exists());
        let loaded = load_registry(&path).unwrap();
        assert_eq!(loaded.skills.len(), 1);
        assert_eq!(loaded.skills[0].id, "alice/demo");
    }

    #[test]
    fn test_missing_file_is_empty_registry() {
        let dir = tempfile::tempdir().unwrap();
        let reg = load_registry(&dir.path().join("registry.json")).unwrap();
        assert!(reg.skills.is_empty());
    }
}
