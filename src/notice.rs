//! Persisted "do not show again" flags.
//!
//! Flags live in the `[notice]` table of the user config file. The store is
//! loaded once and writes through on every change; rewriting keeps every other
//! table of the file intact.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use log::debug;

use crate::error::{ConfigError, NoticeError};

const NOTICE_TABLE: &str = "notice";

#[derive(Debug, Clone)]
pub struct NoticeStore {
    path: PathBuf,
    flags: BTreeMap<String, bool>,
}

impl NoticeStore {
    /// Load flags from `path`. A missing file is an empty store.
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, NoticeError> {
        let path = path.into();
        let table = read_table(&path)?;
        let flags = match table.get(NOTICE_TABLE) {
            None => BTreeMap::new(),
            Some(toml::Value::Table(t)) => t
                .iter()
                .filter_map(|(k, v)| v.as_bool().map(|b| (k.clone(), b)))
                .collect(),
            Some(_) => return Err(NoticeError::NotATable { path }),
        };
        Ok(Self { path, flags })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether the notice `key` was dismissed.
    pub fn is_hidden(&self, key: &str) -> bool {
        self.flags.get(key).copied().unwrap_or(false)
    }

    pub fn flags(&self) -> &BTreeMap<String, bool> {
        &self.flags
    }

    /// Dismiss `key` and persist.
    pub fn hide(&mut self, key: &str) -> Result<(), NoticeError> {
        self.set(key, Some(true))
    }

    /// Forget `key` so the notice shows again, and persist.
    pub fn reset(&mut self, key: &str) -> Result<(), NoticeError> {
        self.set(key, None)
    }

    fn set(&mut self, key: &str, value: Option<bool>) -> Result<(), NoticeError> {
        // Re-read so edits made to other tables since load are kept.
        let mut table = read_table(&self.path)?;
        let notice = table
            .entry(NOTICE_TABLE)
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        let Some(notice) = notice.as_table_mut() else {
            return Err(NoticeError::NotATable {
                path: self.path.clone(),
            });
        };
        match value {
            Some(v) => {
                notice.insert(key.to_string(), toml::Value::Boolean(v));
                self.flags.insert(key.to_string(), v);
            }
            None => {
                notice.remove(key);
                self.flags.remove(key);
            }
        }

        let rendered = toml::to_string(&table)?;
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| ConfigError::Write {
                path: self.path.clone(),
                source,
            })?;
        }
        std::fs::write(&self.path, rendered).map_err(|source| ConfigError::Write {
            path: self.path.clone(),
            source,
        })?;
        debug!("notice {key} -> {value:?} in {}", self.path.display());
        Ok(())
    }
}

fn read_table(path: &Path) -> Result<toml::Table, NoticeError> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(toml::Table::new()),
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.to_path_buf(),
                source,
            }
            .into());
        }
    };
    content.parse::<toml::Table>().map_err(|source| {
        ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        }
        .into()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = NoticeStore::load(dir.path().join("config.toml")).unwrap();
        assert!(store.flags().is_empty());
        assert!(!store.is_hidden("hide_full_access_warning"));
    }

    #[test]
    fn hide_persists_and_keeps_other_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            r#"
[settings]
log_level = "info"

[[hooks.pre_tool_use]]
matcher = "*"
command = ["/usr/local/bin/guard"]
"#,
        )
        .unwrap();

        let mut store = NoticeStore::load(&path).unwrap();
        store.hide("hide_full_access_warning").unwrap();
        assert!(store.is_hidden("hide_full_access_warning"));

        let reloaded = NoticeStore::load(&path).unwrap();
        assert!(reloaded.is_hidden("hide_full_access_warning"));

        let config: crate::config::ConfigOverlay =
            toml::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(config.settings.log_level.as_deref(), Some("info"));
        assert_eq!(config.hooks.pre_tool_use.len(), 1);
        assert_eq!(config.notice.get("hide_full_access_warning"), Some(&true));
    }

    #[test]
    fn reset_removes_flag() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        let mut store = NoticeStore::load(&path).unwrap();
        store.hide("a").unwrap();
        store.hide("b").unwrap();
        store.reset("a").unwrap();

        let reloaded = NoticeStore::load(&path).unwrap();
        assert!(!reloaded.is_hidden("a"));
        assert!(reloaded.is_hidden("b"));
    }

    #[test]
    fn creates_parent_directories() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/hookgate/config.toml");
        let mut store = NoticeStore::load(&path).unwrap();
        store.hide("x").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn non_table_notice_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "notice = 3\n").unwrap();
        assert!(matches!(
            NoticeStore::load(&path),
            Err(NoticeError::NotATable { .. })
        ));
    }
}
