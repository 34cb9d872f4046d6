use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{debug, instrument, warn};
use turnkeeper_core::{DocumentSource, LoadError};

const DOCUMENT_EXTENSION: &str = "json";

/// Serves documents from a library directory.
///
/// An id resolves, in order, to an absolute path as given, `<root>/<id>`,
/// then `<root>/<id>.json`. Relative ids may not climb out of the root.
pub struct DirectorySource {
    root: PathBuf,
}

impl DirectorySource {
    pub fn new(root: impl Into<PathBuf>) -> Result<Self> {
        let root = root.into();
        let root = root
            .canonicalize()
            .with_context(|| format!("failed to resolve library directory {:?}", root))?;
        if !root.is_dir() {
            return Err(anyhow!("library path {:?} is not a directory", root));
        }
        Ok(Self { root })
    }

    fn candidates(&self, id: &str) -> Vec<PathBuf> {
        let path = Path::new(id);
        if path.is_absolute() {
            return vec![path.to_path_buf()];
        }
        if path
            .components()
            .any(|component| !matches!(component, Component::Normal(_) | Component::CurDir))
        {
            warn!(document = %id, "refusing document id outside the library");
            return Vec::new();
        }

        let mut candidates = vec![self.root.join(path)];
        if path.extension().map_or(true, |ext| ext != DOCUMENT_EXTENSION) {
            candidates.push(self.root.join(format!("{}.{}", id, DOCUMENT_EXTENSION)));
        }
        candidates
    }

    /// Ids of every `.json` document directly inside the library, sorted.
    pub fn list(&self) -> Result<Vec<String>> {
        let mut ids = Vec::new();
        let entries = std::fs::read_dir(&self.root)
            .with_context(|| format!("failed to list library directory {:?}", self.root))?;
        for entry in entries {
            let path = entry?.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == DOCUMENT_EXTENSION) {
                if let Some(stem) = path.file_stem().and_then(|stem| stem.to_str()) {
                    ids.push(stem.to_owned());
                }
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl DocumentSource for DirectorySource {
    #[instrument(skip(self))]
    async fn fetch(&self, id: &str) -> Result<Bytes, LoadError> {
        for candidate in self.candidates(id) {
            if candidate.is_dir() {
                continue;
            }
            match tokio::fs::read(&candidate).await {
                Ok(contents) => {
                    debug!(path = %candidate.display(), "read document");
                    return Ok(Bytes::from(contents));
                }
                Err(err) if err.kind() == ErrorKind::NotFound => continue,
                Err(err) => {
                    return Err(LoadError::Unavailable {
                        id: id.to_owned(),
                        message: format!("{}: {}", candidate.display(), err),
                    })
                }
            }
        }
        Err(LoadError::not_found(id))
    }
}

/// Documents held in memory, with an optional per-document delay for
/// exercising slow or out-of-order loads.
#[derive(Default)]
pub struct MemorySource {
    documents: Mutex<HashMap<String, (Bytes, Duration)>>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, id: impl Into<String>, contents: impl Into<Bytes>) {
        self.insert_delayed(id, contents, Duration::ZERO);
    }

    pub fn insert_delayed(
        &self,
        id: impl Into<String>,
        contents: impl Into<Bytes>,
        delay: Duration,
    ) {
        self.documents
            .lock()
            .insert(id.into(), (contents.into(), delay));
    }

    pub fn remove(&self, id: &str) -> bool {
        self.documents.lock().remove(id).is_some()
    }
}

#[async_trait]
impl DocumentSource for MemorySource {
    async fn fetch(&self, id: &str) -> Result<Bytes, LoadError> {
        let entry = self.documents.lock().get(id).cloned();
        let Some((contents, delay)) = entry else {
            return Err(LoadError::not_found(id));
        };
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        Ok(contents)
    }
}
