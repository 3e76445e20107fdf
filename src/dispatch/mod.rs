pub mod decision;
pub mod request;

pub use decision::{
    AuditEntry, Decision, DecisionSource, DispatchOutcome, Enforcement, FailurePolicy,
    HookResponse,
};
pub use request::{HookInput, HookInvocationRequest};

use std::time::Instant;

use log::{info, warn};

use crate::error::DispatchError;
use crate::hooks::{ExternalProcess, HookDefinition, HookRunner};

/// Runs the hooks matching a tool invocation and combines their decisions.
///
/// Every matching hook runs to completion, concurrently, so the audit list is
/// always complete. Total latency is bounded by the slowest hook's timeout.
#[derive(Debug, Clone, Default)]
pub struct Dispatcher<R = ExternalProcess> {
    runner: R,
}

impl Dispatcher {
    /// Dispatcher that runs hooks as external processes.
    pub fn new() -> Self {
        Self::default()
    }
}

impl<R: HookRunner> Dispatcher<R> {
    /// Dispatcher backed by a custom runner.
    pub fn with_runner(runner: R) -> Self {
        Self { runner }
    }

    /// Evaluate `request` against `definitions`.
    ///
    /// Fails only for an invalid request, in which case nothing is run. Any
    /// failure of an individual hook is replaced by its `on_failure` decision.
    ///
    /// Dropping the returned future kills every hook still running.
    pub async fn dispatch(
        &self,
        request: &HookInvocationRequest,
        definitions: &[HookDefinition],
    ) -> Result<DispatchOutcome, DispatchError> {
        request.validate()?;

        let matching: Vec<(usize, &HookDefinition)> = definitions
            .iter()
            .enumerate()
            .filter(|(_, hook)| hook.matches(&request.tool_name))
            .collect();
        if matching.is_empty() {
            return Ok(DispatchOutcome::allow_empty());
        }

        // join_all yields results in input order, whatever order they finish in.
        let audit = futures::future::join_all(
            matching
                .into_iter()
                .map(|(index, hook)| self.evaluate(index, hook, request)),
        )
        .await;

        let outcome = DispatchOutcome::from_audit(audit);
        info!(
            "{} {}: {} hook(s){}",
            outcome.decision.as_str(),
            request.tool_name,
            outcome.audit.len(),
            outcome
                .deny_reason()
                .map(|r| format!(", {r}"))
                .unwrap_or_default()
        );
        Ok(outcome)
    }

    async fn evaluate(
        &self,
        index: usize,
        hook: &HookDefinition,
        request: &HookInvocationRequest,
    ) -> AuditEntry {
        let started = Instant::now();
        let result = self.runner.run(hook, request).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match result {
            Ok(response) => AuditEntry {
                hook: index,
                matcher: hook.pattern().to_string(),
                decision: response.decision,
                reason: response.reason,
                source: DecisionSource::Hook,
                failure: None,
                elapsed_ms,
            },
            Err(e) => {
                let decision = hook.on_failure().as_decision();
                warn!(
                    "hook #{index} [{}] failed for {}: {e} (on_failure={})",
                    hook.pattern(),
                    request.tool_name,
                    decision.as_str()
                );
                AuditEntry {
                    hook: index,
                    matcher: hook.pattern().to_string(),
                    decision,
                    reason: None,
                    source: DecisionSource::Failure,
                    failure: Some(e.to_string()),
                    elapsed_ms,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HookError;
    use serde_json::json;
    use std::collections::HashMap;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// What the fake runner does for a given first argument.
    #[derive(Clone)]
    enum Script {
        Reply(Decision, Option<&'static str>),
        Fail,
    }

    /// In-process runner keyed by the hook's first argument.
    #[derive(Default)]
    struct FakeRunner {
        scripts: HashMap<String, (Script, u64)>,
        runs: AtomicUsize,
        finished: Mutex<Vec<String>>,
    }

    impl FakeRunner {
        fn script(mut self, name: &str, script: Script, delay_ms: u64) -> Self {
            self.scripts.insert(name.to_string(), (script, delay_ms));
            self
        }
    }

    impl HookRunner for FakeRunner {
        async fn run(
            &self,
            hook: &HookDefinition,
            _request: &HookInvocationRequest,
        ) -> Result<HookResponse, HookError> {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let name = hook.command()[1].clone();
            let (script, delay_ms) = self.scripts[&name].clone();
            tokio::time::sleep(Duration::from_millis(delay_ms)).await;
            self.finished.lock().unwrap().push(name);
            match script {
                Script::Reply(decision, reason) => Ok(HookResponse {
                    decision,
                    reason: reason.map(str::to_string),
                }),
                Script::Fail => Err(HookError::Timeout(1)),
            }
        }
    }

    fn hook(pattern: &str, name: &str, on_failure: FailurePolicy) -> HookDefinition {
        HookDefinition::new(
            pattern,
            vec!["/usr/bin/fake-hook".into(), name.into()],
            5,
            on_failure,
        )
        .unwrap()
    }

    fn request(tool: &str) -> HookInvocationRequest {
        HookInvocationRequest::new(tool, json!({"command": "ls"}))
    }

    #[tokio::test]
    async fn no_definitions_allows_with_empty_audit() {
        let dispatcher = Dispatcher::with_runner(FakeRunner::default());
        let outcome = dispatcher.dispatch(&request("shell"), &[]).await.unwrap();
        assert_eq!(outcome, DispatchOutcome::allow_empty());
    }

    #[tokio::test]
    async fn invalid_request_runs_nothing() {
        let dispatcher = Dispatcher::with_runner(
            FakeRunner::default().script("a", Script::Reply(Decision::Allow, None), 0),
        );
        let hooks = [hook("*", "a", FailurePolicy::Deny)];
        let err = dispatcher.dispatch(&request(""), &hooks).await.unwrap_err();
        assert!(matches!(err, DispatchError::InvalidRequest(_)));
        assert_eq!(dispatcher.runner.runs.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn non_matching_hooks_are_skipped() {
        let dispatcher = Dispatcher::with_runner(
            FakeRunner::default()
                .script("deny", Script::Reply(Decision::Deny, None), 0)
                .script("allow", Script::Reply(Decision::Allow, None), 0),
        );
        let hooks = [
            hook("apply_patch", "deny", FailurePolicy::Deny),
            hook("shell*", "allow", FailurePolicy::Deny),
        ];
        let outcome = dispatcher
            .dispatch(&request("shell_exec"), &hooks)
            .await
            .unwrap();
        assert!(outcome.is_allowed());
        assert_eq!(outcome.audit.len(), 1);
        assert_eq!(outcome.audit[0].hook, 1);
        assert_eq!(dispatcher.runner.runs.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn single_deny_blocks() {
        let dispatcher = Dispatcher::with_runner(
            FakeRunner::default()
                .script("ok", Script::Reply(Decision::Allow, None), 0)
                .script("no", Script::Reply(Decision::Deny, Some("blocked")), 0),
        );
        let hooks = [
            hook("*", "ok", FailurePolicy::Deny),
            hook("*", "no", FailurePolicy::Deny),
        ];
        let outcome = dispatcher.dispatch(&request("shell"), &hooks).await.unwrap();
        assert_eq!(outcome.decision, Enforcement::Deny);
        assert_eq!(outcome.deny_reason().as_deref(), Some("blocked"));
    }

    #[tokio::test]
    async fn single_ask_blocks() {
        let dispatcher = Dispatcher::with_runner(
            FakeRunner::default().script("ask", Script::Reply(Decision::Ask, Some("confirm")), 0),
        );
        let hooks = [hook("*", "ask", FailurePolicy::Allow)];
        let outcome = dispatcher.dispatch(&request("shell"), &hooks).await.unwrap();
        assert_eq!(outcome.decision, Enforcement::Deny);
        assert!(outcome.requires_confirmation());
        assert_eq!(outcome.verdict(), Decision::Ask);
    }

    #[tokio::test]
    async fn all_allow_allows() {
        let dispatcher = Dispatcher::with_runner(
            FakeRunner::default()
                .script("a", Script::Reply(Decision::Allow, None), 0)
                .script("b", Script::Reply(Decision::Allow, Some("fine")), 0),
        );
        let hooks = [
            hook("*", "a", FailurePolicy::Deny),
            hook("shell", "b", FailurePolicy::Deny),
        ];
        let outcome = dispatcher.dispatch(&request("shell"), &hooks).await.unwrap();
        assert!(outcome.is_allowed());
        assert_eq!(outcome.audit.len(), 2);
        assert!(outcome.audit.iter().all(|e| e.source == DecisionSource::Hook));
    }

    #[tokio::test]
    async fn failure_follows_on_failure_policy() {
        let dispatcher =
            Dispatcher::with_runner(FakeRunner::default().script("broken", Script::Fail, 0));

        let open = [hook("*", "broken", FailurePolicy::Allow)];
        let outcome = dispatcher.dispatch(&request("shell"), &open).await.unwrap();
        assert!(outcome.is_allowed());
        assert_eq!(outcome.audit[0].source, DecisionSource::Failure);
        assert_eq!(outcome.audit[0].failure.as_deref(), Some("timed out after 1s"));

        let closed = [hook("*", "broken", FailurePolicy::Deny)];
        let outcome = dispatcher.dispatch(&request("shell"), &closed).await.unwrap();
        assert!(!outcome.is_allowed());
        assert_eq!(
            outcome.deny_reason().as_deref(),
            Some("hook failure: timed out after 1s")
        );
    }

    #[tokio::test]
    async fn audit_keeps_configured_order_under_concurrency() {
        let dispatcher = Dispatcher::with_runner(
            FakeRunner::default()
                .script("slow", Script::Reply(Decision::Allow, None), 150)
                .script("medium", Script::Reply(Decision::Deny, None), 75)
                .script("fast", Script::Reply(Decision::Allow, None), 0),
        );
        let hooks = [
            hook("*", "slow", FailurePolicy::Deny),
            hook("*", "medium", FailurePolicy::Deny),
            hook("*", "fast", FailurePolicy::Deny),
        ];
        let outcome = dispatcher.dispatch(&request("shell"), &hooks).await.unwrap();

        let finished = dispatcher.runner.finished.lock().unwrap().clone();
        assert_eq!(finished, vec!["fast", "medium", "slow"]);
        let order: Vec<usize> = outcome.audit.iter().map(|e| e.hook).collect();
        assert_eq!(order, vec![0, 1, 2]);
        assert_eq!(outcome.decision, Enforcement::Deny);
    }

    #[tokio::test]
    async fn deny_does_not_short_circuit_later_hooks() {
        let dispatcher = Dispatcher::with_runner(
            FakeRunner::default()
                .script("no", Script::Reply(Decision::Deny, None), 0)
                .script("later", Script::Reply(Decision::Allow, None), 20),
        );
        let hooks = [
            hook("*", "no", FailurePolicy::Deny),
            hook("*", "later", FailurePolicy::Deny),
        ];
        let outcome = dispatcher.dispatch(&request("shell"), &hooks).await.unwrap();
        assert_eq!(outcome.audit.len(), 2);
        assert_eq!(dispatcher.runner.runs.load(Ordering::SeqCst), 2);
    }
}
