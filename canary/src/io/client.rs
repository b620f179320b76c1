//! Test-repository and scorer client.
//!
//! The [`TestRepository`] trait decouples the session controller from the
//! remote service. Tests use scripted repositories that return predetermined
//! payloads without a network.

use std::future::Future;

use reqwest::{Client, Response, Url};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, instrument, warn};

use crate::error::SessionError;
use crate::io::config::CanaryConfig;

/// Errors from a remote call.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Building the request URL failed.
    #[error("invalid endpoint: {0}")]
    Endpoint(String),

    /// Transport error or timeout.
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The service answered with a non-success status.
    #[error("{url} returned status {status}")]
    Status { url: String, status: u16 },

    /// The body was not JSON.
    #[error("{url} returned a body that is not JSON: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl From<RemoteError> for SessionError {
    fn from(err: RemoteError) -> Self {
        match err {
            RemoteError::Decode { .. } => SessionError::MalformedPayload(err.to_string()),
            _ => SessionError::Connectivity(err.to_string()),
        }
    }
}

/// Remote test repository and scorer.
pub trait TestRepository: Send + Sync {
    /// `GET tests/connectathon/{record_id}/{state_code}`.
    fn fetch_test(
        &self,
        state_code: &str,
        record_id: &str,
    ) -> impl Future<Output = Result<Value, RemoteError>> + Send;

    /// `POST tests/{expected_type}MessageProducing/run/{test_id}` with the message body.
    fn run_test(
        &self,
        expected_type: &str,
        test_id: &str,
        body: &Value,
    ) -> impl Future<Output = Result<Value, RemoteError>> + Send;
}

/// HTTP implementation against the Canary test service.
#[derive(Debug, Clone)]
pub struct HttpTestRepository {
    client: Client,
    base_url: Url,
}

impl HttpTestRepository {
    pub fn new(config: &CanaryConfig) -> anyhow::Result<Self> {
        config.validate()?;
        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(format!("canary/{}", env!("CARGO_PKG_VERSION")))
            .build()?;
        let base_url = Url::parse(&config.api_url)?;
        Ok(Self { client, base_url })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url, RemoteError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| RemoteError::Endpoint(self.base_url.to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    async fn read_json(url: &Url, response: Response) -> Result<Value, RemoteError> {
        let status = response.status();
        if !status.is_success() {
            warn!(url = %url, status = status.as_u16(), "test service returned error status");
            return Err(RemoteError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }
        let bytes = response.bytes().await.map_err(|source| RemoteError::Transport {
            url: url.to_string(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|source| RemoteError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

impl TestRepository for HttpTestRepository {
    #[instrument(skip(self))]
    async fn fetch_test(&self, state_code: &str, record_id: &str) -> Result<Value, RemoteError> {
        let url = self.endpoint(&["tests", "connectathon", record_id, state_code])?;
        debug!(url = %url, "fetching test");
        let response = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|source| RemoteError::Transport {
                url: url.to_string(),
                source,
            })?;
        Self::read_json(&url, response).await
    }

    #[instrument(skip(self, body))]
    async fn run_test(
        &self,
        expected_type: &str,
        test_id: &str,
        body: &Value,
    ) -> Result<Value, RemoteError> {
        let test_kind = format!("{expected_type}MessageProducing");
        let url = self.endpoint(&["tests", &test_kind, "run", test_id])?;
        debug!(url = %url, "running test");
        let response = self
            .client
            .post(url.clone())
            .json(body)
            .send()
            .await
            .map_err(|source| RemoteError::Transport {
                url: url.to_string(),
                source,
            })?;
        Self::read_json(&url, response).await
    }
}
