//! Decoding of the decision a hook writes to stdout.
//!
//! Two shapes are accepted:
//!
//! ```json
//! {"decision": "deny", "reason": "blocked"}
//! {"hookSpecificOutput": {"permissionDecision": "deny", "permissionDecisionReason": "blocked"}}
//! ```
//!
//! The nested form wins when both are present.

use serde::Deserialize;

use crate::dispatch::{Decision, HookResponse};
use crate::error::HookError;
use crate::hooks::truncate_chars;

const PREVIEW_LIMIT: usize = 200;

#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "camelCase")]
struct HookOutput {
    #[serde(default)]
    hook_specific_output: Option<HookSpecificOutput>,
    #[serde(default)]
    decision: Option<Decision>,
    #[serde(default)]
    reason: Option<String>,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct HookSpecificOutput {
    #[serde(default)]
    permission_decision: Option<Decision>,
    #[serde(default)]
    permission_decision_reason: Option<String>,
}

impl HookOutput {
    fn into_response(self) -> Option<HookResponse> {
        let (nested_decision, nested_reason) = match self.hook_specific_output {
            Some(hso) => (hso.permission_decision, hso.permission_decision_reason),
            None => (None, None),
        };
        let decision = nested_decision.or(self.decision)?;
        let reason = nested_reason.or(self.reason).filter(|r| !r.trim().is_empty());
        Some(HookResponse { decision, reason })
    }
}

/// Parse a hook's stdout into a decision.
///
/// The whole output is tried first; if it is not a JSON object, the last
/// non-empty line is tried so hooks may print diagnostics before the verdict.
pub fn parse_response(stdout: &str) -> Result<HookResponse, HookError> {
    let trimmed = stdout.trim();
    if trimmed.is_empty() {
        return Err(HookError::Protocol("no output".into()));
    }

    let output = match serde_json::from_str::<HookOutput>(trimmed) {
        Ok(output) => output,
        Err(whole_err) => {
            let last = trimmed.lines().rev().map(str::trim).find(|l| !l.is_empty());
            match last.map(serde_json::from_str::<HookOutput>) {
                Some(Ok(output)) if last != Some(trimmed) => output,
                _ => {
                    return Err(HookError::Protocol(format!(
                        "{whole_err} (got: {})",
                        preview(trimmed)
                    )));
                }
            }
        }
    };

    output
        .into_response()
        .ok_or_else(|| HookError::Protocol(format!("missing decision (got: {})", preview(trimmed))))
}

fn preview(text: &str) -> String {
    truncate_chars(text, PREVIEW_LIMIT)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_shape() {
        let r = parse_response(r#"{"decision": "deny", "reason": "blocked"}"#).unwrap();
        assert_eq!(r.decision, Decision::Deny);
        assert_eq!(r.reason.as_deref(), Some("blocked"));
    }

    #[test]
    fn nested_shape() {
        let r = parse_response(
            r#"{
                "hookSpecificOutput": {
                    "hookEventName": "PreToolUse",
                    "permissionDecision": "ask",
                    "permissionDecisionReason": "rm requires confirmation"
                }
            }"#,
        )
        .unwrap();
        assert_eq!(r.decision, Decision::Ask);
        assert_eq!(r.reason.as_deref(), Some("rm requires confirmation"));
    }

    #[test]
    fn nested_takes_precedence() {
        let r = parse_response(
            r#"{
                "decision": "allow",
                "reason": "legacy",
                "hookSpecificOutput": {
                    "permissionDecision": "deny",
                    "permissionDecisionReason": "nested"
                }
            }"#,
        )
        .unwrap();
        assert_eq!(r.decision, Decision::Deny);
        assert_eq!(r.reason.as_deref(), Some("nested"));
    }

    #[test]
    fn nested_without_decision_falls_back_to_legacy() {
        let r = parse_response(r#"{"decision": "block", "hookSpecificOutput": {}}"#).unwrap();
        assert_eq!(r.decision, Decision::Deny);
    }

    #[test]
    fn empty_output_is_protocol_error() {
        assert!(matches!(parse_response("  \n"), Err(HookError::Protocol(_))));
    }

    #[test]
    fn missing_decision_is_protocol_error() {
        let err = parse_response(r#"{"reason": "no verdict"}"#).unwrap_err();
        assert!(err.to_string().contains("missing decision"), "{err}");
    }

    #[test]
    fn unknown_decision_is_protocol_error() {
        assert!(parse_response(r#"{"decision": "maybe"}"#).is_err());
    }

    #[test]
    fn garbage_is_protocol_error() {
        let err = parse_response("not json at all").unwrap_err();
        assert!(err.to_string().contains("not json at all"), "{err}");
    }

    #[test]
    fn diagnostics_before_verdict_are_skipped() {
        let r = parse_response("checking policy...\n{\"decision\": \"allow\"}\n").unwrap();
        assert_eq!(r.decision, Decision::Allow);
        assert_eq!(r.reason, None);
    }

    #[test]
    fn blank_reason_is_dropped() {
        let r = parse_response(r#"{"decision": "deny", "reason": "  "}"#).unwrap();
        assert_eq!(r.reason, None);
    }

    #[test]
    fn long_output_preview_is_truncated() {
        let noise = "x".repeat(500);
        let err = parse_response(&noise).unwrap_err().to_string();
        assert!(err.len() < 400, "{err}");
        assert!(err.ends_with("…)"), "{err}");
    }
}
