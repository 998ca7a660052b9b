// Registry HTTP client
//
// Thin JSON client for the registry's REST service:
// `POST {base}/cameras` and `PATCH {base}/cameras/{id}`.

use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;
use url::Url;

use super::{CameraPatch, CameraRecord, Registry};
use crate::error::Error;
use crate::transport::TransportConfig;

/// HTTP client for the camera registry service.
#[derive(Debug, Clone)]
pub struct RegistryClient {
    http: reqwest::Client,
    base_url: Url,
}

impl RegistryClient {
    /// Create a client from a `TransportConfig`.
    pub fn new(base_url: Url, transport: &TransportConfig) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            base_url,
        })
    }

    /// Create a client around a pre-built `reqwest::Client`.
    pub fn with_client(http: reqwest::Client, base_url: Url) -> Self {
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    // ── URL builders ─────────────────────────────────────────────────

    /// `{base}/cameras[/{segments}]`, percent-encoding each segment.
    fn cameras_url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| Error::InvalidUrl(url::ParseError::RelativeUrlWithCannotBeABaseBase))?
            .pop_if_empty()
            .push("cameras")
            .extend(segments);
        Ok(url)
    }

    // ── Request helpers ──────────────────────────────────────────────

    async fn send<B: Serialize + Sync>(
        &self,
        method: reqwest::Method,
        url: Url,
        body: &B,
    ) -> Result<(), Error> {
        debug!("{method} {url}");

        let resp = self.http.request(method, url).json(body).send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(());
        }

        let message = resp.text().await.unwrap_or_default();
        Err(Error::Registry {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl Registry for RegistryClient {
    async fn create(&self, record: &CameraRecord) -> Result<(), Error> {
        let url = self.cameras_url(&[])?;
        self.send(reqwest::Method::POST, url, record).await
    }

    async fn patch(&self, id: &str, patch: &CameraPatch) -> Result<(), Error> {
        let url = self.cameras_url(&[id])?;
        self.send(reqwest::Method::PATCH, url, patch).await
    }
}
