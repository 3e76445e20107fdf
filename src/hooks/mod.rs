//! Hook definitions and the capability used to evaluate them.
//!
//! A [`HookDefinition`] is immutable once built. Evaluating one goes through
//! the [`HookRunner`] trait; [`ExternalProcess`] is the implementation that
//! speaks the stdin/stdout JSON protocol with a subprocess.

/// Tool-name patterns.
pub mod matcher;
/// Subprocess runner with timeout and process-group cleanup.
pub mod process;
/// Decoding of hook stdout.
pub mod protocol;

pub use matcher::Matcher;
pub use process::ExternalProcess;

use std::future::Future;
use std::path::Path;
use std::time::Duration;

use crate::dispatch::{FailurePolicy, HookInvocationRequest, HookResponse};
use crate::error::{HookError, InvalidHook};

/// Default per-hook timeout in seconds.
pub const DEFAULT_TIMEOUT_SEC: u64 = 5;

/// One configured pre-tool-use hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookDefinition {
    pattern: String,
    matcher: Matcher,
    command: Vec<String>,
    timeout_sec: u64,
    on_failure: FailurePolicy,
}

impl HookDefinition {
    /// Validate and build a definition.
    ///
    /// `command[0]` may start with `~` or reference environment variables;
    /// it is expanded and must then be an absolute path.
    pub fn new(
        pattern: &str,
        command: Vec<String>,
        timeout_sec: u64,
        on_failure: FailurePolicy,
    ) -> Result<Self, InvalidHook> {
        if pattern.trim().is_empty() {
            return Err(InvalidHook::EmptyMatcher);
        }
        let Some((program, args)) = command.split_first() else {
            return Err(InvalidHook::EmptyCommand);
        };
        if program.trim().is_empty() {
            return Err(InvalidHook::EmptyCommand);
        }
        let expanded = shellexpand::full(program).map_err(|e| InvalidHook::Expand {
            program: program.clone(),
            message: e.to_string(),
        })?;
        if !Path::new(expanded.as_ref()).is_absolute() {
            return Err(InvalidHook::RelativeCommand(program.clone()));
        }
        if timeout_sec == 0 {
            return Err(InvalidHook::ZeroTimeout);
        }

        let mut argv = Vec::with_capacity(command.len());
        argv.push(expanded.into_owned());
        argv.extend(args.iter().cloned());

        Ok(Self {
            pattern: pattern.to_string(),
            matcher: Matcher::parse(pattern),
            command: argv,
            timeout_sec,
            on_failure,
        })
    }

    /// The matcher as written in the configuration.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// Executable (expanded, absolute) followed by its arguments.
    pub fn command(&self) -> &[String] {
        &self.command
    }

    pub fn timeout_sec(&self) -> u64 {
        self.timeout_sec
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_sec)
    }

    pub fn on_failure(&self) -> FailurePolicy {
        self.on_failure
    }

    pub fn matches(&self, tool_name: &str) -> bool {
        self.matcher.matches(tool_name)
    }

    /// Shell-quoted command line, for display and logs.
    pub fn command_line(&self) -> String {
        shlex::try_join(self.command.iter().map(String::as_str))
            .unwrap_or_else(|_| self.command.join(" "))
    }
}

/// First `limit` characters of `text`, with `…` appended when cut.
pub(crate) fn truncate_chars(text: &str, limit: usize) -> String {
    let mut out: String = text.chars().take(limit).collect();
    if text.chars().nth(limit).is_some() {
        out.push('…');
    }
    out
}

/// Capability to evaluate one hook against one request.
///
/// The dispatcher only depends on this trait, so in-process evaluators can be
/// added without changing its contract.
pub trait HookRunner: Send + Sync {
    /// Produce the hook's decision, or say why it could not.
    fn run(
        &self,
        hook: &HookDefinition,
        request: &HookInvocationRequest,
    ) -> impl Future<Output = Result<HookResponse, HookError>> + Send;
}
