//! Persisted provisioning state
//!
//! Session markers are kept in a small JSON document next to the working
//! directory so that repeated runs can tell whether the CLI login already
//! happened.

use crate::domain::ports::{SessionMarker, StateStore};
use crate::error::{Error, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateDocument {
    #[serde(default)]
    markers: BTreeMap<String, SessionMarker>,
}

/// State store backed by a JSON file
pub struct FileStateStore {
    path: PathBuf,
    /// Serializes read-modify-write cycles within this process
    lock: Mutex<()>,
}

impl FileStateStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn load(&self) -> Result<StateDocument> {
        let raw = match fs::read(&self.path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Ok(StateDocument::default())
            }
            Err(e) => return Err(Error::io(&self.path, e)),
        };

        if raw.iter().all(u8::is_ascii_whitespace) {
            return Ok(StateDocument::default());
        }

        serde_json::from_slice(&raw).map_err(|e| {
            Error::StateStore(format!("Corrupt state file {}: {}", self.path.display(), e))
        })
    }

    async fn save(&self, doc: &StateDocument) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::io(parent, e))?;
        }

        let tmp = self.path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(doc)?;
        fs::write(&tmp, body).await.map_err(|e| Error::io(&tmp, e))?;
        fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| Error::io(&self.path, e))?;

        debug!("Saved provisioning state to {}", self.path.display());
        Ok(())
    }
}

#[async_trait]
impl StateStore for FileStateStore {
    async fn get_marker(&self, name: &str) -> Result<Option<SessionMarker>> {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.markers.remove(name))
    }

    async fn put_marker(&self, marker: SessionMarker) -> Result<()> {
        let _guard = self.lock.lock().await;
        let mut doc = self.load().await?;
        doc.markers.insert(marker.name.clone(), marker);
        self.save(&doc).await
    }
}
