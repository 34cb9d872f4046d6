use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;

use anyhow::{Context, Result};
use parking_lot::Mutex;

use crate::navigation::PersistedNavigation;
use crate::state_key;

/// Where per-document navigation survives between sessions.
pub trait StateStore: Send + Sync {
    fn load(&self, document_id: &str) -> Result<Option<PersistedNavigation>>;
    fn save(&self, document_id: &str, state: &PersistedNavigation) -> Result<()>;
}

/// One JSON file per document, named after its [`state_key`].
pub struct FileStateStore {
    root: PathBuf,
}

impl FileStateStore {
    pub fn new(root: PathBuf) -> Result<Self> {
        fs::create_dir_all(&root)
            .with_context(|| format!("failed to create state directory at {:?}", root))?;
        Ok(Self { root })
    }

    fn state_path(&self, document_id: &str) -> PathBuf {
        self.root.join(format!("{}.json", state_key(document_id)))
    }
}

impl StateStore for FileStateStore {
    fn load(&self, document_id: &str) -> Result<Option<PersistedNavigation>> {
        let path = self.state_path(document_id);
        let contents = match fs::read_to_string(&path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("failed to read state file {:?}", path))
            }
        };
        serde_json::from_str(&contents)
            .map(Some)
            .with_context(|| format!("failed to decode state file {:?}", path))
    }

    fn save(&self, document_id: &str, state: &PersistedNavigation) -> Result<()> {
        let path = self.state_path(document_id);
        let tmp = path.with_extension("json.tmp");
        let payload = serde_json::to_vec_pretty(state)
            .with_context(|| format!("failed to encode state for `{}`", document_id))?;
        fs::write(&tmp, payload)
            .with_context(|| format!("failed to write temp state file {:?}", tmp))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("failed to move state file into place at {:?}", path))
    }
}

#[derive(Default)]
pub struct MemoryStateStore {
    inner: Mutex<HashMap<String, PersistedNavigation>>,
}

impl MemoryStateStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStateStore {
    fn load(&self, document_id: &str) -> Result<Option<PersistedNavigation>> {
        Ok(self.inner.lock().get(document_id).cloned())
    }

    fn save(&self, document_id: &str, state: &PersistedNavigation) -> Result<()> {
        self.inner
            .lock()
            .insert(document_id.to_owned(), state.clone());
        Ok(())
    }
}

/// Keeps nothing, so every session starts fresh. Used for one-shot runs such
/// as `--dump` that must not touch saved positions.
pub struct NullStateStore;

impl StateStore for NullStateStore {
    fn load(&self, _document_id: &str) -> Result<Option<PersistedNavigation>> {
        Ok(None)
    }

    fn save(&self, _document_id: &str, _state: &PersistedNavigation) -> Result<()> {
        Ok(())
    }
}
