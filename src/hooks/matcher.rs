//! Tool-name patterns for selecting which hooks run.

use std::fmt;

/// A parsed `matcher` pattern.
///
/// - `*` matches every tool.
/// - a trailing `*` matches by prefix (`shell*` matches `shell` and `shell_exec`).
/// - anything else must equal the tool name exactly.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Matcher {
    Any,
    Prefix(String),
    Exact(String),
}

impl Matcher {
    pub fn parse(pattern: &str) -> Self {
        if pattern == "*" {
            Matcher::Any
        } else if let Some(prefix) = pattern.strip_suffix('*') {
            Matcher::Prefix(prefix.to_string())
        } else {
            Matcher::Exact(pattern.to_string())
        }
    }

    pub fn matches(&self, tool_name: &str) -> bool {
        match self {
            Matcher::Any => true,
            Matcher::Prefix(prefix) => tool_name.starts_with(prefix.as_str()),
            Matcher::Exact(name) => name == tool_name,
        }
    }
}

impl fmt::Display for Matcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Matcher::Any => f.write_str("*"),
            Matcher::Prefix(prefix) => write!(f, "{prefix}*"),
            Matcher::Exact(name) => f.write_str(name),
        }
    }
}
