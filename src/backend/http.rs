//! Backend client over HTTP using reqwest's async client.
//!
//! Endpoints: `GET /volumes`, `GET /progress`, `GET /volumes/{name}/size`
//! and one endpoint per [`ActionRequest`] under `/volumes/{name}/`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, Response};
use serde::de::DeserializeOwned;
use url::Url;

use crate::backend::{ActionRequest, Backend};
use crate::error::{FetchError, VolError};
use crate::volume::{ActionMap, Volume, VolumeSize};

/// Longest response body quoted back in a status error.
const MAX_ERROR_BODY: usize = 512;

/// [`Backend`] implementation talking to the backend service over HTTP.
pub struct HttpBackend {
    client: Client,
    base_url: Url,
}

impl HttpBackend {
    /// Create a client for the service rooted at `base_url`.
    ///
    /// No timeout is applied unless `timeout` is given; a timed out request
    /// surfaces as [`FetchError::Timeout`].
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self, VolError> {
        let base_url = Url::parse(base_url)?;
        if base_url.cannot_be_a_base() {
            return Err(VolError::Config(format!(
                "Backend URL '{}' cannot carry a path",
                base_url
            )));
        }

        let mut builder = Client::builder();
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder
            .build()
            .map_err(|e| VolError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Build a full URL from path segments, percent-encoding each one.
    fn url_for(&self, segments: &[&str]) -> Url {
        let mut url = self.base_url.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    async fn send(
        &self,
        method: Method,
        url: Url,
        request: Option<&ActionRequest>,
    ) -> Result<Response, FetchError> {
        let endpoint = url.path().to_string();
        let mut builder = self.client.request(method, url);
        if let Some(request) = request {
            builder = builder.query(&request.query());
            if let Some(body) = request.body() {
                builder = builder.json(&body);
            }
        }

        let response = builder.send().await.map_err(|e| transport_error(&endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Status {
                endpoint,
                status: status.as_u16(),
                body: clip(body.trim(), MAX_ERROR_BODY).to_string(),
            });
        }
        Ok(response)
    }

    async fn get_json<T: DeserializeOwned>(&self, segments: &[&str]) -> Result<T, FetchError> {
        let url = self.url_for(segments);
        let endpoint = url.path().to_string();
        let response = self.send(Method::GET, url, None).await?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| transport_error(&endpoint, e))?;
        serde_json::from_slice(&bytes).map_err(|e| FetchError::Decode {
            endpoint,
            reason: e.to_string(),
        })
    }
}

/// Longest prefix of `s` that fits in `max` bytes without splitting a char.
fn clip(s: &str, max: usize) -> &str {
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}

fn transport_error(endpoint: &str, err: reqwest::Error) -> FetchError {
    if err.is_timeout() {
        FetchError::Timeout {
            endpoint: endpoint.to_string(),
        }
    } else {
        FetchError::Transport {
            endpoint: endpoint.to_string(),
            reason: err.to_string(),
        }
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn list_volumes(&self) -> Result<Vec<Volume>, FetchError> {
        self.get_json(&["volumes"]).await
    }

    async fn fetch_progress(&self) -> Result<ActionMap, FetchError> {
        self.get_json(&["progress"]).await
    }

    async fn volume_size(&self, name: &str) -> Result<VolumeSize, FetchError> {
        self.get_json(&["volumes", name, "size"]).await
    }

    async fn submit(&self, volume: &str, request: &ActionRequest) -> Result<(), FetchError> {
        let url = self.url_for(&["volumes", volume, request.kind().as_str()]);
        tracing::debug!(volume = %volume, action = %request.kind(), url = %url, "Submitting action");
        self.send(request.method(), url, Some(request)).await?;
        Ok(())
    }
}
