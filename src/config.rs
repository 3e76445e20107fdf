use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::warn;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::dispatch::FailurePolicy;
use crate::error::ConfigError;
use crate::hooks::{DEFAULT_TIMEOUT_SEC, HookDefinition};

/// Embedded default configuration.
const DEFAULT_CONFIG: &str = include_str!("../config.default.toml");

/// Environment variable naming the user config file.
pub const CONFIG_ENV_VAR: &str = "HOOKGATE_CONFIG";

/// Project overlay, looked up in the current directory.
pub const PROJECT_CONFIG_FILE: &str = ".hookgate.toml";

// ── Final (merged) config types ──

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default)]
    pub settings: Settings,
    #[serde(default)]
    pub hooks: HooksConfig,
    #[serde(default)]
    pub notice: BTreeMap<String, bool>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Settings {
    /// Append each dispatch to the decision log.
    #[serde(default = "default_true")]
    pub decision_log: bool,
    /// Diagnostic log level (off, error, warn, info, debug, trace).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            decision_log: true,
            log_level: default_log_level(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct HooksConfig {
    #[serde(default)]
    pub pre_tool_use: Vec<PreToolUseHookConfig>,
}

/// One `[[hooks.pre_tool_use]]` entry as written in TOML.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct PreToolUseHookConfig {
    /// Tool name pattern: `*`, a prefix ending in `*`, or an exact name.
    pub matcher: String,
    /// Absolute path of the hook executable followed by its arguments.
    pub command: Vec<String>,
    /// Seconds before the hook is killed and treated as failed.
    #[serde(default = "default_timeout_sec")]
    pub timeout_sec: u64,
    /// Decision used when the hook fails to produce one.
    #[serde(default)]
    pub on_failure: FailurePolicy,
}

fn default_true() -> bool {
    true
}

fn default_log_level() -> String {
    "warn".into()
}

fn default_timeout_sec() -> u64 {
    DEFAULT_TIMEOUT_SEC
}

// ── Overlay types (the on-disk shape of user and project files) ──

/// Shape of a hookgate configuration file.
#[derive(Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct ConfigOverlay {
    #[serde(default)]
    pub settings: SettingsOverlay,
    #[serde(default)]
    pub hooks: HooksOverlay,
    /// "Do not show again" flags keyed by notice name.
    #[serde(default)]
    pub notice: BTreeMap<String, bool>,
}

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct SettingsOverlay {
    /// Append one line per dispatch to the decision log.
    pub decision_log: Option<bool>,
    /// Diagnostic log level: off, error, warn, info, debug, trace.
    pub log_level: Option<String>,
}

#[derive(Debug, Default, Deserialize, Serialize, JsonSchema)]
pub struct HooksOverlay {
    /// Discard hooks defined by earlier layers instead of appending.
    #[serde(default)]
    pub replace: bool,
    /// Hooks run before a tool executes.
    #[serde(default)]
    pub pre_tool_use: Vec<PreToolUseHookConfig>,
}

impl Config {
    /// Load the default embedded configuration.
    pub fn default_config() -> Self {
        toml::from_str(DEFAULT_CONFIG).expect("embedded default config must parse")
    }

    /// Load configuration with resolution order:
    /// 1. Embedded defaults
    /// 2. User file: `explicit`, else `$HOOKGATE_CONFIG`, else
    ///    `~/.config/hookgate/config.toml` (skipped if missing)
    /// 3. `.hookgate.toml` in the current directory (skipped if missing);
    ///    this layer can only add hooks, see [`Config::apply_project_overlay`]
    ///
    /// Any unreadable or invalid layer fails the whole load.
    pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
        Self::load_in(explicit, Path::new("."))
    }

    /// [`Config::load`] with the project overlay looked up in `project_dir`.
    pub fn load_in(explicit: Option<&Path>, project_dir: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default_config();

        let user = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => user_config_path(),
        };
        if let Some(path) = user {
            // An explicitly named file must exist.
            if explicit.is_some() || path.exists() {
                config.apply_overlay(read_overlay(&path)?);
            }
        }

        let project = project_dir.join(PROJECT_CONFIG_FILE);
        if project.exists() {
            config.apply_project_overlay(&project, read_overlay(&project)?);
        }

        Ok(config)
    }

    /// Apply an overlay on top of this config: scalars override, hooks append
    /// unless the overlay sets `replace`, notice flags merge.
    pub fn apply_overlay(&mut self, overlay: ConfigOverlay) {
        if let Some(v) = overlay.settings.decision_log {
            self.settings.decision_log = v;
        }
        if let Some(v) = overlay.settings.log_level {
            self.settings.log_level = v;
        }

        let h = overlay.hooks;
        if h.replace {
            self.hooks.pre_tool_use = h.pre_tool_use;
        } else {
            self.hooks.pre_tool_use.extend(h.pre_tool_use);
        }

        self.notice.extend(overlay.notice);
    }

    /// Apply the working-directory overlay. `replace` is ignored here: hooks
    /// from the defaults and the user file always survive this layer.
    pub fn apply_project_overlay(&mut self, path: &Path, mut overlay: ConfigOverlay) {
        if overlay.hooks.replace {
            warn!(
                "{}: `replace` is ignored in project config; hooks are appended",
                path.display()
            );
            overlay.hooks.replace = false;
        }
        self.apply_overlay(overlay);
    }

    /// Validate every configured hook, in order.
    pub fn hook_definitions(&self) -> Result<Vec<HookDefinition>, ConfigError> {
        self.hooks
            .pre_tool_use
            .iter()
            .enumerate()
            .map(|(index, h)| {
                HookDefinition::new(&h.matcher, h.command.clone(), h.timeout_sec, h.on_failure)
                    .map_err(|source| ConfigError::InvalidHook {
                        index,
                        matcher: h.matcher.clone(),
                        source,
                    })
            })
            .collect()
    }

    /// Apply an overlay from a TOML string. Used for testing.
    #[cfg(test)]
    fn apply_overlay_str(&mut self, toml_str: &str) {
        let overlay: ConfigOverlay = toml::from_str(toml_str).unwrap();
        self.apply_overlay(overlay);
    }
}

/// User config location: `$HOOKGATE_CONFIG`, else `~/.config/hookgate/config.toml`.
pub fn user_config_path() -> Option<PathBuf> {
    if let Some(path) = std::env::var_os(CONFIG_ENV_VAR) {
        return Some(PathBuf::from(path));
    }
    let home = std::env::var_os("HOME")?;
    Some(Path::new(&home).join(".config/hookgate/config.toml"))
}

fn read_overlay(path: &Path) -> Result<ConfigOverlay, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// JSON Schema describing a configuration file.
pub fn json_schema() -> serde_json::Value {
    let schema = schemars::schema_for!(ConfigOverlay);
    serde_json::to_value(&schema).unwrap_or_default()
}
