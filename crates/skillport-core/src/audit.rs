//! Audit log: one JSON line per user-visible action.
//!
//! Destination: SKILLPORT_AUDIT_LOG if set, else `audit/audit.log` under
//! the config dir. Failures to audit never fail the operation.

use crate::paths;
use chrono::Utc;
use serde_json::{json, Value};
use std::env;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;

pub const ENV_AUDIT_LOG: &str = "SKILLPORT_AUDIT_LOG";

fn audit_path() -> PathBuf {
    match env::var(ENV_AUDIT_LOG) {
        Ok(p) if !p.is_empty() => PathBuf::from(p),
        _ => paths::audit_log_path(),
    }
}

/// Best-effort append; errors are logged, not propagated.
pub fn append_audit(event: &str, fields: Value) {
    let mut entry = json!({
        "ts": Utc::now().to_rfc3339(),
        "event": event,
    });
    if let (Some(obj), Some(extra)) = (entry.as_object_mut(), fields.as_object()) {
        for (k, v) in extra {
            obj.insert(k.clone(), v.clone());
        }
    }

    let path = audit_path();
    if let Some(parent) = path.parent() {
        let _ = std::fs::create_dir_all(parent);
    }
    let result = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .and_then(|mut f| writeln!(f, "{}", entry));
    if let Err(e) = result {
        tracing::warn!("Failed to append audit log {}: {}", path.display(), e);
    }
}
