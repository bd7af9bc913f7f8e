//! Append-only provenance log.
//!
//! One JSON line per core action, keyed by session id. Writers append
//! complete lines and never rewrite; ordering within a session follows the
//! calls that produced the entries.

use crate::session;
use anyhow::{Context, Result};
use chrono::Utc;
use serde_json::{json, Value};
use std::env;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

pub const ENV_AGENT_CLAUDE_CODE: &str = "CLAUDE_CODE";
pub const ENV_AGENT_MCP: &str = "SKILLPORT_MCP";
pub const ENV_AGENT: &str = "SKILLPORT_AGENT";

/// Identity string for the agent driving this process.
pub fn detect_agent() -> String {
    if let Ok(v) = env::var(ENV_AGENT) {
        if !v.is_empty() {
            return v;
        }
    }
    if env::var(ENV_AGENT_CLAUDE_CODE).is_ok() {
        return "claude-code".to_string();
    }
    if env::var(ENV_AGENT_MCP).is_ok() {
        return "mcp".to_string();
    }
    "cli".to_string()
}

/// Append one provenance entry. `fields` carries the action-specific data
/// and is merged into the envelope after the standard keys.
pub fn append_provenance(path: &Path, action: &str, fields: Value) -> Result<()> {
    let mut entry = json!({
        "ts": Utc::now().to_rfc3339(),
        "session_id": session::session_id(),
        "action": action,
        "agent": detect_agent(),
    });
    if let (Some(obj), Some(extra)) = (entry.as_object_mut(), fields.as_object()) {
        for (k, v) in extra {
            obj.insert(k.clone(), v.clone());
        }
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create provenance dir: {}", parent.display()))?;
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open provenance log: {}", path.display()))?;
    // Single write of a complete line keeps cross-process appends intact.
    writeln!(file, "{}", entry)
        .with_context(|| format!("Failed to append provenance: {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_append_provenance_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("provenance.jsonl");
        append_provenance(&path, "install", json!({"id": "alice/demo"})).unwrap();
        append_provenance(&path, "uninstall", json!({"id": "alice/demo"})).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);

        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["action"], "install");
        assert_eq!(first["id"], "alice/demo");
        assert!(first["ts"].is_string());
        assert!(first["session_id"].is_string());
        assert!(first["agent"].is_string());

        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["session_id"], first["session_id"]);
    }
}
