use std::sync::Arc;

use crate::backend::Backend;
use crate::directory::VolumeDirectory;
use crate::error::FetchError;
use crate::volume::VolumeSize;

/// Recomputes one volume's size after its content changed, without
/// reloading the whole directory.
#[derive(Clone)]
pub struct SizeReconciler {
    backend: Arc<dyn Backend>,
    directory: Arc<VolumeDirectory>,
}

impl SizeReconciler {
    pub fn new(backend: Arc<dyn Backend>, directory: Arc<VolumeDirectory>) -> Self {
        Self { backend, directory }
    }

    /// Ask the backend for `volume`'s size and patch it into the directory.
    ///
    /// The volume shows as loading until this and any overlapping
    /// recomputation for it have finished. On failure the old size is kept.
    /// If the volume disappears from the directory meanwhile, the result is
    /// dropped.
    pub async fn recompute_size(&self, volume: &str) -> Result<VolumeSize, FetchError> {
        let load = self.directory.begin_size_load(volume);

        match self.backend.volume_size(volume).await {
            Ok(size) => {
                let shown = size.display();
                tracing::debug!(volume = %volume, bytes = size.bytes, size = %shown, "Volume size recomputed");
                load.complete(&shown);
                Ok(size)
            }
            Err(e) => {
                tracing::warn!(volume = %volume, error = %e, "Volume size recomputation failed");
                drop(load);
                Err(e)
            }
        }
    }
}
