use crate::store::{PersistentStore, StoreError, StoreResult, keys};
use crate::types::ChartPayload;
use std::sync::Arc;

/// Single persisted slot carrying the latest charts from the chat surface to
/// the visualize surface. Reads do not clear it.
#[derive(Clone)]
pub struct ChartHandoff {
    store: Arc<dyn PersistentStore>,
}

impl ChartHandoff {
    pub fn new(store: Arc<dyn PersistentStore>) -> Self {
        Self { store }
    }

    pub fn publish(&self, charts: &[ChartPayload]) -> StoreResult<()> {
        let encoded = serde_json::to_string(charts).map_err(|source| StoreError::Encode {
            key: keys::ACTIVE_CHART.to_string(),
            source,
        })?;
        self.store.set(keys::ACTIVE_CHART, &encoded)
    }

    pub fn consume(&self) -> Option<Vec<ChartPayload>> {
        let raw = self.store.get(keys::ACTIVE_CHART)?;
        match serde_json::from_str(&raw) {
            Ok(charts) => Some(charts),
            Err(err) => {
                tracing::warn!(error = %err, "failed to parse chart data");
                None
            }
        }
    }
}
