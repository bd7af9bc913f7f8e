//! JSON envelope and exit-code mapping.
//!
//! The only place where error kinds become process exit codes and
//! machine-readable envelopes. The library crates never print.

use serde_json::json;
use skillport_core::error::{exit, SkillPortError};

pub const SCHEMA_VERSION: u32 = 1;

/// Success envelope on stdout (JSON mode only).
pub fn emit_success(data: serde_json::Value) {
    let envelope = json!({
        "schema_version": SCHEMA_VERSION,
        "ok": true,
        "data": data,
    });
    println!("{}", envelope);
}

/// Emit the failure (stdout envelope in JSON mode, stderr text otherwise)
/// and return the exit code.
pub fn emit_failure(json_mode: bool, err: &anyhow::Error) -> i32 {
    let (code, message, retryable, hints, exit_code) = match err.downcast_ref::<SkillPortError>() {
        Some(e) => (
            e.code(),
            e.to_string(),
            e.retryable(),
            e.hints(),
            e.exit_code(),
        ),
        None => ("GENERAL", format!("{:#}", err), false, Vec::new(), exit::GENERAL),
    };

    if json_mode {
        let envelope = json!({
            "schema_version": SCHEMA_VERSION,
            "ok": false,
            "error": {
                "code": code,
                "message": message,
                "retryable": retryable,
                "hints": hints,
            },
        });
        println!("{}", envelope);
    } else {
        eprintln!("❌ {}", message);
        for hint in &hints {
            eprintln!("   hint: {}", hint);
        }
    }
    exit_code
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exit_code_mapping_through_anyhow() {
        let err: anyhow::Error = SkillPortError::SignatureMissing.into();
        assert_eq!(emit_failure(true, &err), exit::SECURITY_REJECTED);

        let err: anyhow::Error = SkillPortError::PolicyRejected {
            action: "install".to_string(),
            reason: "limit".to_string(),
            hints: vec![],
        }
        .into();
        assert_eq!(emit_failure(true, &err), exit::POLICY_REJECTED);

        let err = anyhow::anyhow!("plain failure");
        assert_eq!(emit_failure(true, &err), exit::GENERAL);
    }
}
