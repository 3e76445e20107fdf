use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::DispatchError;

/// A pending tool invocation, as seen by hooks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HookInvocationRequest {
    /// Name of the tool about to run (e.g. "shell", "apply_patch").
    pub tool_name: String,
    /// Tool arguments; opaque to the dispatcher.
    #[serde(default)]
    pub tool_input: Value,
    /// Unique identifier of this tool call.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_use_id: Option<String>,
    /// Session/conversation identifier.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    /// Working directory of the tool call; hooks run there too.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cwd: Option<PathBuf>,
    /// Path to the session transcript.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transcript_path: Option<String>,
    /// Anything else the host wants hooks to see.
    #[serde(default, skip_serializing_if = "Map::is_empty")]
    pub metadata: Map<String, Value>,
}

impl HookInvocationRequest {
    pub fn new(tool_name: impl Into<String>, tool_input: Value) -> Self {
        Self {
            tool_name: tool_name.into(),
            tool_input,
            tool_use_id: None,
            session_id: None,
            cwd: None,
            transcript_path: None,
            metadata: Map::new(),
        }
    }

    pub fn with_tool_use_id(mut self, id: impl Into<String>) -> Self {
        self.tool_use_id = Some(id.into());
        self
    }

    pub fn with_session_id(mut self, id: impl Into<String>) -> Self {
        self.session_id = Some(id.into());
        self
    }

    pub fn with_cwd(mut self, cwd: impl Into<PathBuf>) -> Self {
        self.cwd = Some(cwd.into());
        self
    }

    pub fn with_transcript_path(mut self, path: impl Into<String>) -> Self {
        self.transcript_path = Some(path.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata.insert(key.into(), value);
        self
    }

    /// Reject requests no hook should ever see.
    pub fn validate(&self) -> Result<(), DispatchError> {
        if self.tool_name.trim().is_empty() {
            return Err(DispatchError::InvalidRequest("tool name is empty".into()));
        }
        if self.tool_name.chars().any(char::is_control) {
            return Err(DispatchError::InvalidRequest(format!(
                "tool name contains control characters: {:?}",
                self.tool_name
            )));
        }
        Ok(())
    }

    /// Render the stdin line sent to a hook process (newline-terminated).
    pub fn to_wire_line(&self) -> serde_json::Result<String> {
        let mut line = serde_json::to_string(&HookInput::new(self))?;
        line.push('\n');
        Ok(line)
    }
}

/// Payload written to a hook's stdin.
#[derive(Debug, Serialize)]
pub struct HookInput<'a> {
    /// Always "PreToolUse".
    pub hook_event_name: &'static str,
    pub tool_name: &'a str,
    pub tool_input: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_use_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub session_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<&'a std::path::Path>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transcript_path: Option<&'a str>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub metadata: &'a Map<String, Value>,
}

impl<'a> HookInput<'a> {
    pub fn new(request: &'a HookInvocationRequest) -> Self {
        let mut tool_input = request.tool_input.clone();
        normalize_tool_input(&mut tool_input);
        Self {
            hook_event_name: "PreToolUse",
            tool_name: &request.tool_name,
            tool_input,
            tool_use_id: request.tool_use_id.as_deref(),
            session_id: request.session_id.as_deref(),
            cwd: request.cwd.as_deref(),
            transcript_path: request.transcript_path.as_deref(),
            metadata: &request.metadata,
        }
    }
}

/// Make `tool_input.command` a plain string, the shape Claude-style hook
/// scripts expect. `cmd` is copied to `command` when `command` is absent,
/// and an argv array is joined with spaces.
pub fn normalize_tool_input(value: &mut Value) {
    let Value::Object(obj) = value else {
        return;
    };
    if !obj.contains_key("command")
        && let Some(cmd) = obj.get("cmd").and_then(Value::as_str).map(str::to_owned)
    {
        obj.insert("command".into(), Value::String(cmd));
    }
    if let Some(command) = obj.get_mut("command")
        && let Value::Array(argv) = command
    {
        let joined = argv
            .iter()
            .filter_map(Value::as_str)
            .collect::<Vec<_>>()
            .join(" ");
        *command = Value::String(joined);
    }
}
