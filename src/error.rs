//! Error types.
//!
//! Only [`DispatchError`] ever leaves a dispatch. [`HookError`]s are folded into
//! the outcome through each hook's `on_failure` policy, and [`ConfigError`]s
//! surface at load time before anything is dispatched.

use std::path::PathBuf;

use thiserror::Error;

/// Invalid configuration, reported before any dispatch happens.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("cannot parse {}: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("cannot write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("hook #{index} ({matcher}): {source}")]
    InvalidHook {
        index: usize,
        matcher: String,
        #[source]
        source: InvalidHook,
    },
}

/// A hook definition that cannot be used.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InvalidHook {
    #[error("matcher is empty")]
    EmptyMatcher,

    #[error("command is empty")]
    EmptyCommand,

    #[error("executable must be an absolute path, got {0:?}")]
    RelativeCommand(String),

    #[error("cannot expand {program:?}: {message}")]
    Expand { program: String, message: String },

    #[error("timeout_sec must be greater than zero")]
    ZeroTimeout,
}

/// Why a single hook failed to produce a decision.
#[derive(Debug, Error)]
pub enum HookError {
    /// The process could not be started (missing executable, permissions, bad cwd).
    #[error("cannot launch {program:?}: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("timed out after {0}s")]
    Timeout(u64),

    /// Exited 0 but the output carried no usable decision.
    #[error("invalid hook output: {0}")]
    Protocol(String),

    /// Exited non-zero or was killed by a signal.
    #[error("{status}{}", stderr_suffix(.stderr))]
    Exit { status: String, stderr: String },

    #[error("hook i/o: {0}")]
    Io(#[from] std::io::Error),
}

fn stderr_suffix(stderr: &str) -> String {
    if stderr.is_empty() {
        String::new()
    } else {
        format!(": {stderr}")
    }
}

/// Errors that abort a whole dispatch. Callers must treat these as a denial.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DispatchError {
    #[error("invalid hook request: {0}")]
    InvalidRequest(String),
}

/// Failures of the notice-flag store.
#[derive(Debug, Error)]
pub enum NoticeError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{} has a non-table `notice` entry", path.display())]
    NotATable { path: PathBuf },

    #[error("cannot serialize notice flags: {0}")]
    Serialize(#[from] toml::ser::Error),
}
