use crate::domain::model::PersistedState;
use crate::domain::ports::StateStore;
use crate::utils::error::Result;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Persists state as pretty JSON in a single file. A missing file reads as
/// the default state.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl StateStore for JsonFileStore {
    async fn load(&self) -> Result<PersistedState> {
        match tokio::fs::read(&self.path).await {
            Ok(data) => Ok(serde_json::from_slice(&data)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!("No state file at {}, starting fresh", self.path.display());
                Ok(PersistedState::default())
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn save(&self, state: &PersistedState) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }
        let data = serde_json::to_vec_pretty(state)?;
        tokio::fs::write(&self.path, data).await?;
        tracing::debug!("💾 State saved to {}", self.path.display());
        Ok(())
    }
}

/// In-memory store for tests and one-shot runs.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<PersistedState>>,
}

impl MemoryStore {
    pub fn new(state: PersistedState) -> Self {
        Self {
            state: Arc::new(Mutex::new(state)),
        }
    }

    pub fn snapshot(&self) -> PersistedState {
        self.state
            .lock()
            .map(|s| s.clone())
            .unwrap_or_else(|poisoned| poisoned.into_inner().clone())
    }
}

impl StateStore for MemoryStore {
    async fn load(&self) -> Result<PersistedState> {
        Ok(self.snapshot())
    }

    async fn save(&self, state: &PersistedState) -> Result<()> {
        match self.state.lock() {
            Ok(mut guard) => *guard = state.clone(),
            Err(poisoned) => *poisoned.into_inner() = state.clone(),
        }
        Ok(())
    }
}
