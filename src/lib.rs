//! hookgate: runs pre-tool-use hooks and decides whether a tool call may proceed.
//!
//! Before an agent executes a tool, every configured hook whose matcher
//! accepts the tool name is run as a subprocess. Each receives the pending
//! invocation as JSON on stdin and answers `allow`, `deny` or `ask` on stdout.
//! The answers are combined into one [`dispatch::Enforcement`]: any `deny` or
//! `ask` blocks the call. A hook that crashes, times out, or prints garbage
//! contributes its `on_failure` decision instead (`deny` unless configured
//! otherwise).
//!
//! # Architecture
//!
//! - **[`dispatch`]**: the dispatcher, request and decision types.
//! - **[`hooks`]**: hook definitions, matchers, the `HookRunner` capability
//!   and its subprocess implementation.
//! - **[`config`]**: TOML loading: embedded defaults, user file, project overlay.
//! - **[`notice`]**: persisted "do not show again" flags.
//! - **[`logging`]**: diagnostic logger setup and the decision log at
//!   `~/.local/share/hookgate/decisions.log`.

/// Configuration types, loading, and overlay merge logic.
pub mod config;
/// Dispatcher: matching, concurrent hook runs, decision combination.
pub mod dispatch;
/// Error types for configuration, hooks, and dispatch.
pub mod error;
/// Hook definitions and runners.
pub mod hooks;
/// Logger setup and file-based decision logging.
pub mod logging;
/// Notice flag persistence.
pub mod notice;

use dispatch::{DispatchOutcome, Dispatcher, HookInvocationRequest};
use error::DispatchError;
use hooks::HookDefinition;

/// Run the hooks in `definitions` that match `request`, as subprocesses.
///
/// This is the main entry point for hosts that do not need a custom runner.
pub async fn dispatch(
    request: &HookInvocationRequest,
    definitions: &[HookDefinition],
) -> Result<DispatchOutcome, DispatchError> {
    Dispatcher::new().dispatch(request, definitions).await
}
