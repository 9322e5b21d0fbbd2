pub mod http;
mod request;

use async_trait::async_trait;

use crate::error::FetchError;
use crate::volume::{ActionMap, Volume, VolumeSize};

pub use http::HttpBackend;
pub use request::{ActionRequest, FollowUp};

/// The service that owns volumes and runs the long-running jobs.
///
/// Every call is a single request/response exchange. Implementations do
/// not retry; a failure is returned to the caller as a [`FetchError`].
#[async_trait]
pub trait Backend: Send + Sync {
    /// `GET /volumes`, in backend order.
    async fn list_volumes(&self) -> Result<Vec<Volume>, FetchError>;

    /// `GET /progress`. Idempotent and safe to call concurrently.
    async fn fetch_progress(&self) -> Result<ActionMap, FetchError>;

    /// `GET /volumes/{name}/size`.
    async fn volume_size(&self, name: &str) -> Result<VolumeSize, FetchError>;

    /// Ask the backend to start a mutating job on `volume`.
    ///
    /// Success means the request was accepted, not that the job finished.
    async fn submit(&self, volume: &str, request: &ActionRequest) -> Result<(), FetchError>;
}
