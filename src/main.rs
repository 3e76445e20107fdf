//! hookgate: pre-tool-use hook dispatcher CLI.
//!
//! `hookgate run` reads one tool invocation as JSON from stdin, runs every
//! configured hook that matches it, and writes the combined decision to
//! stdout. Any error before a decision is reached is reported as a denial.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Parser, Subcommand, ValueEnum};
use hookgate::config::{self, Config};
use hookgate::dispatch::{
    AuditEntry, Decision, DispatchOutcome, Dispatcher, Enforcement, HookInvocationRequest,
};
use hookgate::logging;
use hookgate::notice::NoticeStore;
use log::warn;
use serde::Serialize;
use tokio::io::AsyncReadExt;

/// Exit status reported for a denied (or failed) dispatch.
const EXIT_DENY: u8 = 2;
/// Exit status after Ctrl-C.
const EXIT_INTERRUPTED: u8 = 130;

#[derive(Parser, Debug)]
#[command(name = "hookgate", version, about = "Run pre-tool-use hooks and combine their decisions")]
struct Cli {
    /// Config file (default: $HOOKGATE_CONFIG or ~/.config/hookgate/config.toml)
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    /// Increase stderr log verbosity (repeatable)
    #[arg(short, long, global = true, action = ArgAction::Count)]
    verbose: u8,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Read a tool invocation from stdin and dispatch it (default)
    Run {
        /// Output shape written to stdout
        #[arg(long, value_enum, default_value_t = Format::Outcome)]
        format: Format,
    },
    /// List the configured hooks that would run for a tool
    Check { tool_name: String },
    /// Print the JSON Schema of the configuration file
    Schema,
    /// Manage "do not show again" notice flags
    Notice {
        #[command(subcommand)]
        action: NoticeAction,
    },
}

#[derive(Subcommand, Debug)]
enum NoticeAction {
    /// Show all stored flags
    List,
    /// Dismiss a notice
    Hide { key: String },
    /// Show a dismissed notice again
    Reset { key: String },
}

#[derive(ValueEnum, Clone, Copy, Debug, PartialEq, Eq)]
enum Format {
    /// `{"decision", "reason", "audit"}`; exit 0 on allow, 2 on deny
    Outcome,
    /// Claude Code `hookSpecificOutput`; always exit 0
    Claude,
}

#[derive(Serialize)]
struct Report<'a> {
    decision: Enforcement,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<String>,
    audit: &'a [AuditEntry],
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let command = cli.command.unwrap_or(Command::Run {
        format: Format::Outcome,
    });

    match command {
        Command::Run { format } => run(cli.config.as_deref(), cli.verbose, format).await,
        Command::Check { tool_name } => check(cli.config.as_deref(), &tool_name),
        Command::Schema => {
            let schema = config::json_schema();
            match serde_json::to_string_pretty(&schema) {
                Ok(s) => {
                    println!("{s}");
                    ExitCode::SUCCESS
                }
                Err(e) => {
                    eprintln!("hookgate: {e}");
                    ExitCode::FAILURE
                }
            }
        }
        Command::Notice { action } => notice(cli.config.as_deref(), action),
    }
}

async fn run(config_path: Option<&Path>, verbose: u8, format: Format) -> ExitCode {
    let config = match Config::load(config_path) {
        Ok(c) => c,
        Err(e) => return fail_closed(format, &format!("config error: {e}")),
    };
    logging::init(logging::raise_level(
        logging::parse_level(&config.settings.log_level),
        verbose,
    ));

    let definitions = match config.hook_definitions() {
        Ok(d) => d,
        Err(e) => return fail_closed(format, &format!("config error: {e}")),
    };

    let mut input = String::new();
    if let Err(e) = tokio::io::stdin().read_to_string(&mut input).await {
        return fail_closed(format, &format!("failed to read stdin: {e}"));
    }
    let request: HookInvocationRequest = match serde_json::from_str(&input) {
        Ok(r) => r,
        Err(e) => return fail_closed(format, &format!("JSON parse error: {e}")),
    };

    let dispatcher = Dispatcher::new();
    let result = tokio::select! {
        result = dispatcher.dispatch(&request, &definitions) => result,
        _ = tokio::signal::ctrl_c() => {
            // Dropping the dispatch future above killed every running hook.
            warn!("interrupted while running hooks for {}", request.tool_name);
            emit(format, Enforcement::Deny, Decision::Deny, Some("interrupted".into()), &[]);
            return ExitCode::from(EXIT_INTERRUPTED);
        }
    };

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(e) => return fail_closed(format, &e.to_string()),
    };
    if config.settings.decision_log {
        logging::log_decision(&request, &outcome);
    }
    report(format, &outcome)
}

fn report(format: Format, outcome: &DispatchOutcome) -> ExitCode {
    emit(
        format,
        outcome.decision,
        outcome.verdict(),
        outcome.deny_reason(),
        &outcome.audit,
    );
    match (format, outcome.decision) {
        (Format::Outcome, Enforcement::Deny) => ExitCode::from(EXIT_DENY),
        _ => ExitCode::SUCCESS,
    }
}

fn fail_closed(format: Format, message: &str) -> ExitCode {
    eprintln!("hookgate: {message}");
    emit(format, Enforcement::Deny, Decision::Deny, Some(message.to_string()), &[]);
    match format {
        Format::Outcome => ExitCode::from(EXIT_DENY),
        Format::Claude => ExitCode::SUCCESS,
    }
}

fn emit(
    format: Format,
    decision: Enforcement,
    verdict: Decision,
    reason: Option<String>,
    audit: &[AuditEntry],
) {
    let value = match format {
        Format::Outcome => serde_json::to_value(Report {
            decision,
            reason,
            audit,
        }),
        Format::Claude => Ok(serde_json::json!({
            "hookSpecificOutput": {
                "hookEventName": "PreToolUse",
                "permissionDecision": verdict.as_str(),
                "permissionDecisionReason": reason.unwrap_or_default(),
            }
        })),
    };
    match value {
        Ok(v) => println!("{v}"),
        // Unreachable for these types; keep stdout well-formed regardless.
        Err(_) => println!(r#"{{"decision":"deny"}}"#),
    }
}

fn check(config_path: Option<&Path>, tool_name: &str) -> ExitCode {
    let definitions = match Config::load(config_path).and_then(|c| c.hook_definitions()) {
        Ok(d) => d,
        Err(e) => {
            eprintln!("hookgate: config error: {e}");
            return ExitCode::FAILURE;
        }
    };
    if let Err(e) = HookInvocationRequest::new(tool_name, serde_json::Value::Null).validate() {
        eprintln!("hookgate: {e}");
        return ExitCode::FAILURE;
    }

    let mut any = false;
    for (index, hook) in definitions.iter().enumerate() {
        if !hook.matches(tool_name) {
            continue;
        }
        any = true;
        println!(
            "#{index}\t{}\ttimeout={}s\ton_failure={}\t{}",
            hook.pattern(),
            hook.timeout_sec(),
            hook.on_failure().as_decision().as_str(),
            hook.command_line()
        );
    }
    if !any {
        println!("no hooks match {tool_name}; calls are allowed");
    }
    ExitCode::SUCCESS
}

fn notice(config_path: Option<&Path>, action: NoticeAction) -> ExitCode {
    let Some(path) = config_path.map(Path::to_path_buf).or_else(config::user_config_path) else {
        eprintln!("hookgate: no config path (set --config, $HOOKGATE_CONFIG or $HOME)");
        return ExitCode::FAILURE;
    };
    let mut store = match NoticeStore::load(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("hookgate: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = match action {
        NoticeAction::List => {
            for (key, hidden) in store.flags() {
                println!("{key} = {hidden}");
            }
            Ok(())
        }
        NoticeAction::Hide { key } => store.hide(&key),
        NoticeAction::Reset { key } => store.reset(&key),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("hookgate: {e}");
            ExitCode::FAILURE
        }
    }
}
