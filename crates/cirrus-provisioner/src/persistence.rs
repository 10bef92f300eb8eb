use std::path::PathBuf;

use cirrus_core::{PersistedState, ResourceAddr};
use cirrus_storage::StateObject;
use tokio::sync::Mutex;

use crate::context::StateStore;
use crate::driver::BoxFuture;
use crate::error::ProvisionerError;
use crate::state::ProvisionerState;

/// Dual-write state persistence: local disk (safety net) + S3 (authoritative).
///
/// The document is loaded once and cached; every `save_state` rewrites the
/// whole document under the cache lock, so concurrent instances never drop
/// each other's entries.
pub struct StatePersistence {
    local_path: PathBuf,
    remote: Option<StateObject>,
    cache: Mutex<Option<ProvisionerState>>,
}

impl StatePersistence {
    /// Local-only persistence.
    pub fn local(local_path: impl Into<PathBuf>) -> Self {
        Self {
            local_path: local_path.into(),
            remote: None,
            cache: Mutex::new(None),
        }
    }

    /// Also keep the authoritative copy in S3.
    pub fn with_remote(mut self, remote: StateObject) -> Self {
        self.remote = Some(remote);
        self
    }

    /// Write state to local disk first (atomic: tmp + rename), then upload to S3.
    ///
    /// Local write happens first so state is never lost even if S3 upload fails.
    pub async fn flush(&self, state: &ProvisionerState) -> Result<(), ProvisionerError> {
        let json = serde_json::to_vec_pretty(state)?;
        if let Some(parent) = self.local_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let tmp_path = self.local_path.with_extension("json.tmp");
        std::fs::write(&tmp_path, &json)?;
        std::fs::rename(&tmp_path, &self.local_path)?;

        tracing::debug!(path = %self.local_path.display(), "state flushed to local disk");

        let Some(remote) = &self.remote else {
            return Ok(());
        };

        match remote.save(state).await {
            Ok(_) => {
                tracing::debug!(bucket = %remote.bucket(), key = %remote.key(), "state flushed to S3");
            }
            Err(e) => {
                // Local write succeeded; the next load() picks up the local copy.
                tracing::warn!(error = %e, "failed to upload state to S3 (local copy is safe)");
            }
        }

        Ok(())
    }

    /// Load state: try S3 first (authoritative), fall back to local, return Default if neither.
    pub async fn load(&self) -> Result<ProvisionerState, ProvisionerError> {
        if let Some(remote) = &self.remote {
            match remote.load::<ProvisionerState>().await {
                Ok(Some(doc)) => {
                    tracing::debug!(
                        bucket = %remote.bucket(),
                        key = %remote.key(),
                        etag = ?doc.etag,
                        "state loaded from S3"
                    );
                    return Ok(doc.value);
                }
                Ok(None) => {
                    tracing::debug!("no state in S3, trying local");
                }
                Err(e) => {
                    tracing::warn!(error = %e, "failed to load state from S3, trying local");
                }
            }
        }

        if self.local_path.exists() {
            let json = std::fs::read(&self.local_path)?;
            let state: ProvisionerState = serde_json::from_slice(&json).map_err(|e| {
                ProvisionerError::State(format!(
                    "corrupt state file {}: {e}",
                    self.local_path.display()
                ))
            })?;
            tracing::debug!(path = %self.local_path.display(), "state loaded from local disk");
            return Ok(state);
        }

        tracing::debug!("no existing state found, starting fresh");
        Ok(ProvisionerState::default())
    }
}

impl StateStore for StatePersistence {
    fn get_state<'a>(
        &'a self,
        addr: &'a ResourceAddr,
    ) -> BoxFuture<'a, Result<PersistedState, ProvisionerError>> {
        Box::pin(async move {
            let mut cache = self.cache.lock().await;
            if cache.is_none() {
                *cache = Some(self.load().await?);
            }
            Ok(cache.as_ref().map(|doc| doc.get(addr)).unwrap_or_default())
        })
    }

    fn save_state<'a>(
        &'a self,
        addr: &'a ResourceAddr,
        state: PersistedState,
    ) -> BoxFuture<'a, Result<(), ProvisionerError>> {
        Box::pin(async move {
            let mut cache = self.cache.lock().await;
            let mut doc = match cache.take() {
                Some(doc) => doc,
                None => self.load().await?,
            };
            doc.set(addr, state);
            match self.flush(&doc).await {
                Ok(()) => {
                    *cache = Some(doc);
                    Ok(())
                }
                Err(e) => {
                    // Force a reload from disk on the next access.
                    *cache = None;
                    Err(e)
                }
            }
        })
    }
}
