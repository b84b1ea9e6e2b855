//! Client-local state that outlives one run: display language, selected
//! collection and the last scroll offset of the result list. Read once when
//! the store is opened, written on every change; last writer wins.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::warn;

use catalog_core::types::Language;
use catalog_core::{Error, Result};

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SessionState {
    pub language: Option<Language>,
    pub collection_id: Option<String>,
    pub scroll_offset: u64,
}

#[derive(Debug)]
pub struct LocalStore {
    path: Option<PathBuf>,
    state: SessionState,
}

impl LocalStore {
    /// Opens the store at `path`. A missing or unreadable file starts empty.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = match fs::read_to_string(&path) {
            Ok(text) => serde_json::from_str(&text).unwrap_or_else(|e| {
                warn!(path = %path.display(), error = %e, "ignoring unreadable session state");
                SessionState::default()
            }),
            Err(_) => SessionState::default(),
        };
        Self { path: Some(path), state }
    }

    /// A store that is never written to disk.
    pub fn in_memory() -> Self {
        Self { path: None, state: SessionState::default() }
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn state(&self) -> &SessionState {
        &self.state
    }

    pub fn set_language(&mut self, language: Language) -> Result<()> {
        self.update(|s| s.language = Some(language))
    }

    pub fn set_collection(&mut self, collection_id: Option<String>) -> Result<()> {
        self.update(|s| s.collection_id = collection_id)
    }

    pub fn set_scroll(&mut self, offset: u64) -> Result<()> {
        self.update(|s| s.scroll_offset = offset)
    }

    fn update(&mut self, f: impl FnOnce(&mut SessionState)) -> Result<()> {
        let before = self.state.clone();
        f(&mut self.state);
        if self.state == before {
            return Ok(());
        }
        self.persist()
    }

    fn persist(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            fs::create_dir_all(dir).map_err(|e| Error::Persist(format!("{}: {e}", dir.display())))?;
        }
        let text = serde_json::to_string_pretty(&self.state).map_err(|e| Error::Persist(e.to_string()))?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, text).map_err(|e| Error::Persist(format!("{}: {e}", tmp.display())))?;
        fs::rename(&tmp, path).map_err(|e| Error::Persist(format!("{}: {e}", path.display())))
    }
}
