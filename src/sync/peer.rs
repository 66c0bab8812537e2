//! Clients for the export endpoints of other environments

use std::collections::BTreeSet;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::{LokalisointiError, Result};
use crate::types::{Environment, EnvironmentUrls};

pub const LOCALISATION_FILES_PATH: &str = "/lokalisointi/api/v1/copy/localisation-files";
pub const AVAILABLE_NAMESPACES_PATH: &str = "/lokalisointi/api/v1/copy/available-namespaces";

/// Access to another environment's translation export
#[async_trait]
pub trait PeerClient: Send + Sync {
    /// Fetch the zip export of `source`, restricted to `namespaces` when given
    async fn fetch_archive(
        &self,
        source: Environment,
        namespaces: Option<&[String]>,
    ) -> Result<Vec<u8>>;

    /// Namespaces `source` reports for its own base translations
    async fn available_namespaces(&self, source: Environment) -> Result<BTreeSet<String>>;
}

/// Peer client speaking HTTP to the environments' public endpoints
pub struct HttpPeerClient {
    client: reqwest::Client,
    urls: EnvironmentUrls,
    caller_id: String,
}

impl HttpPeerClient {
    pub fn new(urls: EnvironmentUrls) -> Result<Self> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(300))
            .build()?;
        Ok(Self {
            client,
            urls,
            caller_id: "lokalisointi".to_string(),
        })
    }

    pub fn with_caller_id(mut self, caller_id: impl Into<String>) -> Self {
        self.caller_id = caller_id.into();
        self
    }

    fn url(&self, source: Environment, path: &str) -> Result<String> {
        Ok(format!("{}{}", self.urls.base_url(source)?, path))
    }

    async fn send(
        &self,
        source: Environment,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response> {
        let response = request
            .header("Caller-Id", &self.caller_id)
            .send()
            .await
            .map_err(|e| LokalisointiError::RemoteSync(format!("{} unreachable: {}", source, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(LokalisointiError::RemoteSync(format!(
                "{} answered {}: {}",
                source, status, body
            )));
        }
        Ok(response)
    }
}

/// Query string of repeated `namespaces` parameters
pub fn namespace_query(namespaces: Option<&[String]>) -> Vec<(&'static str, String)> {
    namespaces
        .unwrap_or_default()
        .iter()
        .map(|ns| ("namespaces", ns.clone()))
        .collect()
}

#[async_trait]
impl PeerClient for HttpPeerClient {
    async fn fetch_archive(
        &self,
        source: Environment,
        namespaces: Option<&[String]>,
    ) -> Result<Vec<u8>> {
        let url = self.url(source, LOCALISATION_FILES_PATH)?;
        tracing::info!("Fetching localisation files from {}", url);

        let request = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/octet-stream")
            .query(&namespace_query(namespaces));
        let response = self.send(source, request).await?;

        let bytes = response.bytes().await.map_err(|e| {
            LokalisointiError::RemoteSync(format!("reading archive from {}: {}", source, e))
        })?;
        Ok(bytes.to_vec())
    }

    async fn available_namespaces(&self, source: Environment) -> Result<BTreeSet<String>> {
        let url = self.url(source, AVAILABLE_NAMESPACES_PATH)?;

        let request = self
            .client
            .get(&url)
            .header(reqwest::header::ACCEPT, "application/json");
        let response = self.send(source, request).await?;

        let namespaces: Option<Vec<String>> = response.json().await.map_err(|e| {
            LokalisointiError::RemoteSync(format!("namespaces from {}: {}", source, e))
        })?;
        Ok(namespaces.unwrap_or_default().into_iter().collect())
    }
}
