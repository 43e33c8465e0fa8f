use crate::chat::ChatOrchestrator;
use crate::dataset::{CacheOutcome, DatasetCache};
use crate::gateway::{AnalysisBackend, GatewayResult};
use crate::types::DatasetFile;
use std::sync::Arc;

/// Landing surface: arriving here starts a new analysis session.
pub struct LandingFlow {
    chat: Arc<ChatOrchestrator>,
    cache: DatasetCache,
    backend: Arc<dyn AnalysisBackend>,
}

impl LandingFlow {
    pub fn new(
        chat: Arc<ChatOrchestrator>,
        cache: DatasetCache,
        backend: Arc<dyn AnalysisBackend>,
    ) -> Self {
        Self {
            chat,
            cache,
            backend,
        }
    }

    /// Drop any conversation left over from a previous session, including a
    /// turn still awaiting its answer. Returns whether a saved log was cleared.
    pub fn enter(&self) -> bool {
        let cleared = self.chat.clear();
        if cleared {
            tracing::info!("cleared stale conversation");
        }
        cleared
    }

    /// Cache the dataset for later restoration, then upload it. The caller
    /// moves on to chat only when the upload succeeded.
    pub async fn get_started(&self, file: &DatasetFile) -> GatewayResult<CacheOutcome> {
        let outcome = self.cache.cache(file);
        if let Err(err) = self.backend.upload(file).await {
            tracing::warn!(error = %err, filename = %file.filename, "upload failed");
            return Err(err);
        }
        Ok(outcome)
    }
}
