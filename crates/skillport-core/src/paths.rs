//! Persisted state layout under the user config dir.
//!
//! Everything lives beneath `~/.skillport` unless `SKILLPORT_HOME`
//! overrides it. Install roots for specific platforms can be redirected
//! with `OPENCLAW_SKILLS_DIR` / `CLAUDE_SKILLS_DIR`.

use crate::manifest::Platform;
use std::env;
use std::path::PathBuf;

pub const ENV_HOME: &str = "SKILLPORT_HOME";
pub const ENV_OPENCLAW_SKILLS_DIR: &str = "OPENCLAW_SKILLS_DIR";
pub const ENV_CLAUDE_SKILLS_DIR: &str = "CLAUDE_SKILLS_DIR";
pub const ENV_API_URL: &str = "SKILLPORT_API_URL";
pub const ENV_AUTH_TOKEN: &str = "SKILLPORT_AUTH_TOKEN";

fn env_nonempty(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.is_empty())
}

/// Root of all persisted state, conventionally `~/.skillport`.
pub fn config_dir() -> PathBuf {
    if let Some(home) = env_nonempty(ENV_HOME) {
        return PathBuf::from(home);
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".skillport")
}

pub fn config_file_path() -> PathBuf {
    config_dir().join("config.json")
}

pub fn keys_dir() -> PathBuf {
    config_dir().join("keys")
}

pub fn default_public_key_path() -> PathBuf {
    keys_dir().join("default.pub")
}

pub fn default_private_key_path() -> PathBuf {
    keys_dir().join("default.key")
}

/// Public keys trusted for signature verification, one PEM per key id.
pub fn trusted_keys_dir() -> PathBuf {
    keys_dir().join("trusted")
}

pub fn registry_path() -> PathBuf {
    config_dir().join("installed").join("registry.json")
}

pub fn provenance_path() -> PathBuf {
    config_dir().join("provenance.jsonl")
}

pub fn audit_log_path() -> PathBuf {
    config_dir().join("audit").join("audit.log")
}

pub fn traces_dir() -> PathBuf {
    config_dir().join("traces")
}

/// Install root for a target platform, honoring the per-platform overrides.
pub fn install_root(platform: Platform) -> PathBuf {
    let override_var = match platform {
        Platform::Openclaw | Platform::Universal => env_nonempty(ENV_OPENCLAW_SKILLS_DIR),
        Platform::ClaudeCode => env_nonempty(ENV_CLAUDE_SKILLS_DIR),
    };
    match override_var {
        Some(dir) => PathBuf::from(dir),
        None => config_dir().join("skills"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_hangs_off_config_dir() {
        let root = config_dir();
        assert!(registry_path().starts_with(&root));
        assert!(provenance_path().starts_with(&root));
        assert!(audit_log_path().starts_with(&root));
        assert!(default_private_key_path().starts_with(&root));
    }
}
