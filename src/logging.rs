use std::io::Write;
use std::path::PathBuf;
use std::str::FromStr;

use log::LevelFilter;
use simplelog::{ColorChoice, CombinedLogger, SharedLogger, TermLogger, TerminalMode, WriteLogger};

use crate::dispatch::{DispatchOutcome, HookInvocationRequest};

/// Directory for the diagnostic and decision logs: ~/.local/share/hookgate.
pub fn data_dir() -> Option<PathBuf> {
    let home = std::env::var_os("HOME")?;
    Some(std::path::Path::new(&home).join(".local/share/hookgate"))
}

/// Parse a configured level, falling back to `warn`.
pub fn parse_level(level: &str) -> LevelFilter {
    LevelFilter::from_str(level.trim()).unwrap_or(LevelFilter::Warn)
}

/// Raise `base` by one level per `-v`.
pub fn raise_level(base: LevelFilter, verbose: u8) -> LevelFilter {
    let levels = [
        LevelFilter::Off,
        LevelFilter::Error,
        LevelFilter::Warn,
        LevelFilter::Info,
        LevelFilter::Debug,
        LevelFilter::Trace,
    ];
    let start = levels.iter().position(|l| *l == base).unwrap_or(2);
    levels[(start + usize::from(verbose)).min(levels.len() - 1)]
}

/// Install the global logger: stderr at `level`, plus a debug-level file
/// log at ~/.local/share/hookgate/hookgate.log when it can be opened.
/// stdout is never used; it carries protocol output.
pub fn init(level: LevelFilter) {
    let mut loggers: Vec<Box<dyn SharedLogger>> = vec![TermLogger::new(
        level,
        simplelog::Config::default(),
        TerminalMode::Stderr,
        ColorChoice::Never,
    )];
    if let Some(file) = data_dir().and_then(|dir| open_append(dir, "hookgate.log")) {
        loggers.push(WriteLogger::new(
            LevelFilter::Debug,
            simplelog::Config::default(),
            file,
        ));
    }
    // A logger may already be installed (tests, embedding hosts).
    let _ = CombinedLogger::init(loggers);
}

fn open_append(dir: PathBuf, name: &str) -> Option<std::fs::File> {
    std::fs::create_dir_all(&dir).ok()?;
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(dir.join(name))
        .ok()
}

/// Append a decision record to ~/.local/share/hookgate/decisions.log.
/// Best-effort: failures are silently ignored (logging must never block a dispatch).
pub fn log_decision(request: &HookInvocationRequest, outcome: &DispatchOutcome) {
    let Some(mut file) = data_dir().and_then(|dir| open_append(dir, "decisions.log")) else {
        return;
    };
    let _ = writeln!(file, "{}", decision_record(&timestamp_now(), request, outcome));
}

/// One tab-separated line: timestamp, enforcement, tool, hook summaries.
fn decision_record(ts: &str, request: &HookInvocationRequest, outcome: &DispatchOutcome) -> String {
    let tool: String = request.tool_name.chars().take(200).collect();
    let hooks = if outcome.audit.is_empty() {
        "no matching hooks".to_string()
    } else {
        outcome
            .audit
            .iter()
            .map(|e| e.summary())
            .collect::<Vec<_>>()
            .join("; ")
    };
    format!(
        "{ts}\t{decision}\t{tool}\t{hooks}",
        decision = outcome.decision.as_str(),
        hooks = hooks.replace(['\n', '\t'], " "),
    )
}

/// UTC timestamp with second precision, e.g. `2024-01-01T00:00:00Z`.
fn timestamp_now() -> String {
    chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dispatch::{AuditEntry, Decision, DecisionSource};
    use serde_json::json;

    #[test]
    fn timestamp_is_rfc3339_utc() {
        let ts = timestamp_now();
        assert_eq!(ts.len(), "2024-01-01T00:00:00Z".len());
        assert!(ts.ends_with('Z'), "{ts}");
        assert!(chrono::DateTime::parse_from_rfc3339(&ts).is_ok(), "{ts}");
    }

    #[test]
    fn level_parsing() {
        assert_eq!(parse_level("debug"), LevelFilter::Debug);
        assert_eq!(parse_level("OFF"), LevelFilter::Off);
        assert_eq!(parse_level("loud"), LevelFilter::Warn);
    }

    #[test]
    fn verbosity_raises_and_saturates() {
        assert_eq!(raise_level(LevelFilter::Warn, 0), LevelFilter::Warn);
        assert_eq!(raise_level(LevelFilter::Warn, 1), LevelFilter::Info);
        assert_eq!(raise_level(LevelFilter::Warn, 9), LevelFilter::Trace);
    }

    #[test]
    fn record_lists_hooks_on_one_line() {
        let request = HookInvocationRequest::new("shell_exec", json!({}));
        let outcome = DispatchOutcome::from_audit(vec![AuditEntry {
            hook: 0,
            matcher: "shell*".into(),
            decision: Decision::Deny,
            reason: Some("blocked\nbadly".into()),
            source: DecisionSource::Hook,
            failure: None,
            elapsed_ms: 3,
        }]);
        let line = decision_record("2024-01-01T00:00:00Z", &request, &outcome);
        assert_eq!(
            line,
            "2024-01-01T00:00:00Z\tdeny\tshell_exec\t#0 [shell*] DENY: blocked badly"
        );
    }

    #[test]
    fn record_without_hooks() {
        let request = HookInvocationRequest::new("read_file", json!({}));
        let line = decision_record("t", &request, &DispatchOutcome::allow_empty());
        assert_eq!(line, "t\tallow\tread_file\tno matching hooks");
    }
}
