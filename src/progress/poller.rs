use std::sync::Arc;

use crate::backend::Backend;
use crate::error::FetchError;
use crate::volume::ActionMap;

/// Fetches the authoritative in-progress map from the backend.
///
/// Stateless: each call is an independent request with no retry. Whether
/// and when to call again is the coordinator's decision.
#[derive(Clone)]
pub struct ProgressPoller {
    backend: Arc<dyn Backend>,
}

impl ProgressPoller {
    pub fn new(backend: Arc<dyn Backend>) -> Self {
        Self { backend }
    }

    pub async fn fetch_progress(&self) -> Result<ActionMap, FetchError> {
        let actions = self.backend.fetch_progress().await?;
        tracing::trace!(count = actions.len(), "Fetched progress map");
        Ok(actions)
    }
}
