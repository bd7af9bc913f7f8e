//! Skill authoring: scaffold, convert, export, sign.
//!
//! The authored manifest is `skillport.json` at the skill directory root.
//! Export validates it, fills in the signing key id, hashes the payload,
//! signs, and writes the `.ssp`.

use crate::keys;
use crate::scan::collect_dir_files;
use serde::Deserialize;
use skillport_archive::codec;
use skillport_core::error::SkillPortError;
use skillport_core::manifest::{self, Manifest, RawManifest};
use std::fs;
use std::path::{Path, PathBuf};

/// Authored manifest file name inside a skill directory.
pub const MANIFEST_FILE_NAME: &str = "skillport.json";

#[derive(Debug, Clone)]
pub struct ExportOutcome {
    pub path: PathBuf,
    pub id: String,
    pub version: String,
    pub key_id: String,
    pub archive_size: u64,
    pub file_count: usize,
}

fn validate_raw(raw: RawManifest) -> Result<Manifest, SkillPortError> {
    manifest::validate(raw).map_err(|violations| {
        let detail = violations
            .iter()
            .map(|v| format!("{}: {}", v.field, v.message))
            .collect::<Vec<_>>()
            .join("; ");
        SkillPortError::ManifestInvalid(detail)
    })
}

/// Read and parse `skillport.json` from a skill directory.
pub fn read_authored_manifest(dir: &Path) -> Result<RawManifest, SkillPortError> {
    let path = dir.join(MANIFEST_FILE_NAME);
    if !path.exists() {
        return Err(SkillPortError::FileNotFound(format!(
            "{} (run `skillport init` or `skillport convert` first)",
            path.display()
        )));
    }
    let content = fs::read_to_string(&path)?;
    serde_json::from_str(&content)
        .map_err(|e| SkillPortError::ManifestInvalid(format!("{}: {}", path.display(), e)))
}

/// Build and sign a `.ssp` from a skill directory.
pub fn export_skill(dir: &Path, output: Option<&Path>) -> Result<ExportOutcome, SkillPortError> {
    let mut raw = read_authored_manifest(dir)?;

    let key_info = keys::ensure_default_keypair()?;
    let private_pem = keys::load_default_private_key()?;
    // The signing key decides the recorded identity, not the authored text.
    match raw.author.as_mut() {
        Some(author) => author.signing_key_id = key_info.key_id.clone(),
        None => {
            raw.author = Some(skillport_core::manifest::Author {
                name: None,
                email: None,
                signing_key_id: key_info.key_id.clone(),
            })
        }
    }

    let manifest = validate_raw(raw)?;

    let mut files = collect_dir_files(dir)?;
    files.remove(MANIFEST_FILE_NAME);
    files.retain(|path, _| !path.ends_with(".ssp"));

    let created = codec::create(&manifest, &files, &private_pem)?;

    let out_path = match output {
        Some(p) => p.to_path_buf(),
        None => PathBuf::from(format!(
            "{}-{}.ssp",
            manifest.skill_slug(),
            manifest.version
        )),
    };
    fs::write(&out_path, &created.bytes)?;
    tracing::info!(
        "Exported {} {} to {}",
        manifest.id,
        manifest.version,
        out_path.display()
    );

    Ok(ExportOutcome {
        path: out_path,
        id: created.manifest.id.clone(),
        version: created.manifest.version.clone(),
        key_id: key_info.key_id,
        archive_size: created.bytes.len() as u64,
        file_count: files.len(),
    })
}

/// Re-sign an existing archive in place with the local default key.
pub fn sign_archive(path: &Path) -> Result<String, SkillPortError> {
    if !path.exists() {
        return Err(SkillPortError::FileNotFound(path.display().to_string()));
    }
    keys::ensure_default_keypair()?;
    let private_pem = keys::load_default_private_key()?;
    let bytes = fs::read(path)?;
    let (resigned, signature) = codec::resign(&bytes, &private_pem)?;
    fs::write(path, resigned)?;
    Ok(signature)
}

// ─── Scaffold & Convert ─────────────────────────────────────────────────────

const SKILL_MD_TEMPLATE: &str = "---\nname: {name}\ndescription: Describe what this skill does\n---\n\n# {name}\n\nInstructions for the agent go here.\n";

/// Scaffold an empty skill directory: SKILL.md plus a manifest template.
pub fn init_skill_dir(dir: &Path, id: &str) -> Result<PathBuf, SkillPortError> {
    let skill_slug = id.split('/').nth(1).ok_or_else(|| {
        SkillPortError::InputInvalid(format!("id must be <author>/<skill>: {}", id))
    })?;
    fs::create_dir_all(dir)?;

    let manifest_path = dir.join(MANIFEST_FILE_NAME);
    if manifest_path.exists() {
        return Err(SkillPortError::InputInvalid(format!(
            "{} already exists",
            manifest_path.display()
        )));
    }

    let template = serde_json::json!({
        "ssp_version": manifest::SSP_VERSION,
        "id": id,
        "version": "0.1.0",
        "platform": "openclaw",
        "declared_risk": "medium",
        "author": { "signing_key_id": "" },
        "os_compat": ["macos", "linux", "windows"],
        "entrypoints": ["SKILL.md"],
        "permissions": {
            "network": { "mode": "none" },
            "filesystem": { "read_paths": [], "write_paths": [] },
            "exec": { "allowed_commands": [], "shell": false }
        }
    });
    fs::write(
        &manifest_path,
        serde_json::to_string_pretty(&template)
            .map_err(|e| SkillPortError::Internal(e.to_string()))?,
    )?;

    let skill_md_path = dir.join("SKILL.md");
    if !skill_md_path.exists() {
        fs::write(&skill_md_path, SKILL_MD_TEMPLATE.replace("{name}", skill_slug))?;
    }
    Ok(manifest_path)
}

#[derive(Debug, Default, Deserialize)]
struct SkillFrontmatter {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
}

/// YAML frontmatter between the leading `---` fences, if any.
fn extract_frontmatter(content: &str) -> SkillFrontmatter {
    let mut lines = content.lines();
    if lines.next().map(str::trim) != Some("---") {
        return SkillFrontmatter::default();
    }
    let yaml: String = lines
        .take_while(|line| line.trim() != "---")
        .collect::<Vec<_>>()
        .join("\n");
    serde_yaml::from_str(&yaml).unwrap_or_default()
}

fn slugify(name: &str) -> String {
    let slug: String = name
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_lowercase() || c.is_ascii_digit() {
                c
            } else {
                '-'
            }
        })
        .collect();
    slug.trim_matches('-').to_string()
}

/// Derive a manifest for a bare skill directory (SKILL.md, no
/// `skillport.json`) so it can be exported.
pub fn convert_dir(dir: &Path, author_slug: &str) -> Result<PathBuf, SkillPortError> {
    let skill_md_path = dir.join("SKILL.md");
    if !skill_md_path.exists() {
        return Err(SkillPortError::FileNotFound(skill_md_path.display().to_string()));
    }
    let content = fs::read_to_string(&skill_md_path)?;
    let frontmatter = extract_frontmatter(&content);

    let name = frontmatter
        .name
        .map(|n| slugify(&n))
        .filter(|n| !n.is_empty())
        .or_else(|| {
            dir.file_name()
                .map(|n| slugify(&n.to_string_lossy()))
                .filter(|n| !n.is_empty())
        })
        .ok_or_else(|| {
            SkillPortError::InputInvalid("cannot derive a skill name".to_string())
        })?;

    let manifest_path = dir.join(MANIFEST_FILE_NAME);
    let template = serde_json::json!({
        "ssp_version": manifest::SSP_VERSION,
        "id": format!("{}/{}", author_slug, name),
        "version": "0.1.0",
        "description": frontmatter.description,
        "author": { "signing_key_id": "" },
        "os_compat": ["macos", "linux", "windows"],
        "entrypoints": ["SKILL.md"],
        "permissions": {
            "network": { "mode": "none" },
            "filesystem": { "read_paths": [], "write_paths": [] },
            "exec": { "allowed_commands": [], "shell": false }
        }
    });
    fs::write(
        &manifest_path,
        serde_json::to_string_pretty(&template)
            .map_err(|e| SkillPortError::Internal(e.to_string()))?,
    )?;
    Ok(manifest_path)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_frontmatter() {
        let fm = extract_frontmatter("---\nname: PDF Tools\ndescription: handles PDFs\n---\n# x");
        assert_eq!(fm.name.as_deref(), Some("PDF Tools"));
        assert_eq!(fm.description.as_deref(), Some("handles PDFs"));

        let none = extract_frontmatter("# just markdown");
        assert!(none.name.is_none());
    }

    #[test]
    fn test_slugify() {
        assert_eq!(slugify("PDF Tools"), "pdf-tools");
        assert_eq!(slugify("already-good"), "already-good");
        assert_eq!(slugify("  Weird__Name  "), "weird--name");
    }

    #[test]
    fn test_convert_dir_writes_manifest() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("SKILL.md"),
            "---\nname: Demo Skill\ndescription: demo\n---\n# Demo",
        )
        .unwrap();
        let path = convert_dir(dir.path(), "alice").unwrap();
        let raw: RawManifest =
            serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(raw.id.as_deref(), Some("alice/demo-skill"));
        assert_eq!(raw.entrypoints.unwrap(), vec!["SKILL.md".to_string()]);
    }

    #[test]
    fn test_init_refuses_existing_manifest() {
        let dir = tempfile::tempdir().unwrap();
        init_skill_dir(dir.path(), "alice/demo").unwrap();
        let err = init_skill_dir(dir.path(), "alice/demo").unwrap_err();
        assert!(matches!(err, SkillPortError::InputInvalid(_)));
    }
}
