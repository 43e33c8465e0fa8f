use crate::charts::ChartHandoff;
use crate::chat::ChatOrchestrator;
use crate::config::AppConfig;
use crate::conversation::ConversationStore;
use crate::dataset::{DatasetCache, SessionRestorer};
use crate::gateway::{AnalysisBackend, AuthClient, HttpGateway};
use crate::landing::LandingFlow;
use crate::session::SessionGate;
use crate::store::{FileStore, PersistentStore};
use anyhow::{Context, Result};
use std::sync::Arc;

/// Everything one profile needs, wired over a single shared store.
#[derive(Clone)]
pub struct AppServices {
    pub gate: SessionGate,
    pub charts: ChartHandoff,
    pub chat: Arc<ChatOrchestrator>,
    pub restorer: Arc<SessionRestorer>,
    pub landing: Arc<LandingFlow>,
    /// Present only when built from a config with a live HTTP gateway.
    pub http: Option<Arc<HttpGateway>>,
    pub auth: Option<Arc<AuthClient>>,
}

impl AppServices {
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let store: Arc<dyn PersistentStore> = Arc::new(FileStore::new(&config.profile_dir));
        let gate = SessionGate::new(store.clone());
        let gateway = Arc::new(
            HttpGateway::new(config, gate.session_key()).context("failed to build HTTP client")?,
        );
        let auth = AuthClient::new(config, gate.clone()).context("failed to build auth client")?;

        let mut services = Self::with_backend(store, gateway.clone());
        services.http = Some(gateway);
        services.auth = Some(Arc::new(auth));
        Ok(services)
    }

    pub fn with_backend(
        store: Arc<dyn PersistentStore>,
        backend: Arc<dyn AnalysisBackend>,
    ) -> Self {
        let gate = SessionGate::new(store.clone());
        let charts = ChartHandoff::new(store.clone());
        let chat = Arc::new(ChatOrchestrator::new(
            ConversationStore::new(store.clone()),
            backend.clone(),
            charts.clone(),
            gate.clone(),
        ));
        let cache = DatasetCache::new(store);
        let restorer = SessionRestorer::new(cache.clone(), backend.clone());
        let landing = LandingFlow::new(chat.clone(), cache, backend);

        Self {
            gate,
            charts,
            chat,
            restorer: Arc::new(restorer),
            landing: Arc::new(landing),
            http: None,
            auth: None,
        }
    }
}
