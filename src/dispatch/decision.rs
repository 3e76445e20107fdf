use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A decision reported by a single hook.
///
/// Ordered by severity so the strongest decision wins a `max()`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum Decision {
    #[default]
    #[serde(alias = "approve")]
    Allow,
    Ask,
    #[serde(alias = "block")]
    Deny,
}

impl Decision {
    pub fn as_str(self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Ask => "ask",
            Decision::Deny => "deny",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Decision::Allow => "ALLOW",
            Decision::Ask => "ASK",
            Decision::Deny => "DENY",
        }
    }

    /// What the tool pipeline enforces for this decision. `Ask` blocks.
    pub fn enforcement(self) -> Enforcement {
        match self {
            Decision::Allow => Enforcement::Allow,
            Decision::Ask | Decision::Deny => Enforcement::Deny,
        }
    }
}

/// The two-valued result a tool-execution pipeline acts on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Enforcement {
    Allow,
    Deny,
}

impl Enforcement {
    pub fn as_str(self) -> &'static str {
        match self {
            Enforcement::Allow => "allow",
            Enforcement::Deny => "deny",
        }
    }
}

/// Decision substituted when a hook fails to produce one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Treat a failed hook as if it had allowed the call.
    Allow,
    /// Treat a failed hook as a denial (fail closed).
    #[default]
    Deny,
}

impl FailurePolicy {
    pub fn as_decision(self) -> Decision {
        match self {
            FailurePolicy::Allow => Decision::Allow,
            FailurePolicy::Deny => Decision::Deny,
        }
    }
}

/// Where an audit entry's decision came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DecisionSource {
    /// Reported by the hook itself.
    Hook,
    /// Substituted from the hook's `on_failure` policy.
    Failure,
}

/// A decision plus its optional human-readable reason, as reported by a hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HookResponse {
    pub decision: Decision,
    pub reason: Option<String>,
}

/// Record of one matching hook's contribution to a dispatch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// Index of the hook in the configured definition list.
    pub hook: usize,
    pub matcher: String,
    pub decision: Decision,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
    pub source: DecisionSource,
    /// Why the hook failed, for failure-substituted entries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<String>,
    pub elapsed_ms: u64,
}

impl AuditEntry {
    /// Whether this entry blocks the tool call.
    pub fn denies(&self) -> bool {
        self.decision.enforcement() == Enforcement::Deny
    }

    /// One-line description used in deny messages and the decision log.
    pub fn summary(&self) -> String {
        let why = match self.source {
            DecisionSource::Hook => self.reason.clone(),
            DecisionSource::Failure => Some(format!(
                "hook failure: {}",
                self.failure.as_deref().unwrap_or("unknown error")
            )),
        };
        match why {
            Some(why) => format!("#{} [{}] {}: {}", self.hook, self.matcher, self.decision.label(), why),
            None => format!("#{} [{}] {}", self.hook, self.matcher, self.decision.label()),
        }
    }
}

/// Combined result of running every matching hook for one tool invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchOutcome {
    pub decision: Enforcement,
    /// Per-hook records in configured order.
    pub audit: Vec<AuditEntry>,
}

impl DispatchOutcome {
    /// Outcome when no hook applies.
    pub fn allow_empty() -> Self {
        Self {
            decision: Enforcement::Allow,
            audit: Vec::new(),
        }
    }

    /// Fold per-hook entries: any `deny` or `ask` blocks the call.
    pub fn from_audit(audit: Vec<AuditEntry>) -> Self {
        let decision = if audit.iter().any(AuditEntry::denies) {
            Enforcement::Deny
        } else {
            Enforcement::Allow
        };
        Self { decision, audit }
    }

    pub fn is_allowed(&self) -> bool {
        self.decision == Enforcement::Allow
    }

    /// Reason of the first blocking entry in configured order.
    pub fn deny_reason(&self) -> Option<String> {
        let entry = self.audit.iter().find(|e| e.denies())?;
        Some(match entry.source {
            DecisionSource::Hook => entry
                .reason
                .clone()
                .unwrap_or_else(|| "Blocked by PreToolUse hook".to_string()),
            DecisionSource::Failure => format!(
                "hook failure: {}",
                entry.failure.as_deref().unwrap_or("unknown error")
            ),
        })
    }

    /// True when some hook itself asked for user confirmation.
    pub fn requires_confirmation(&self) -> bool {
        self.audit
            .iter()
            .any(|e| e.source == DecisionSource::Hook && e.decision == Decision::Ask)
    }

    /// Three-valued summary for user-facing layers: deny beats ask beats allow.
    pub fn verdict(&self) -> Decision {
        self.audit
            .iter()
            .map(|e| e.decision)
            .max()
            .unwrap_or(Decision::Allow)
    }
}
