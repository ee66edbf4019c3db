//! Single-shot price fetch against the configured backend endpoint.

use std::future::Future;

use thiserror::Error;

use crate::config::WidgetConfig;
use crate::snapshot::PriceSnapshot;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchError {
    #[error("HTTP client build error: {0}")]
    ClientBuild(String),
    #[error("price request failed for {url}: {message}")]
    Transport { url: String, message: String },
    #[error("price endpoint {url} returned HTTP status {status}")]
    Status { url: String, status: u16 },
    #[error("price payload from {url} could not be decoded: {message}")]
    Decode { url: String, message: String },
}

/// One network round trip for the current snapshot. Implementations never retry;
/// the scheduler's next tick is the retry.
pub trait PriceFetcher: Send + Sync + 'static {
    fn fetch(&self) -> impl Future<Output = Result<PriceSnapshot, FetchError>> + Send;
}

#[derive(Debug, Clone)]
pub struct HttpPriceFetcher {
    client: reqwest::Client,
    endpoint: String,
}

impl HttpPriceFetcher {
    pub fn new(endpoint: impl Into<String>, timeout_ms: Option<u64>) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout_ms) = timeout_ms {
            builder = builder.timeout(std::time::Duration::from_millis(timeout_ms));
        }
        let client = builder
            .build()
            .map_err(|err| FetchError::ClientBuild(err.to_string()))?;

        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    pub fn from_config(cfg: &WidgetConfig) -> Result<Self, FetchError> {
        Self::new(cfg.endpoint.clone(), cfg.fetch_timeout_ms)
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl PriceFetcher for HttpPriceFetcher {
    async fn fetch(&self) -> Result<PriceSnapshot, FetchError> {
        let url = self.endpoint.as_str();
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| FetchError::Transport {
                url: url.to_string(),
                message: err.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|err| FetchError::Transport {
                url: url.to_string(),
                message: err.to_string(),
            })?;

        decode_snapshot(url, &body)
    }
}

fn decode_snapshot(url: &str, body: &[u8]) -> Result<PriceSnapshot, FetchError> {
    serde_json::from_slice(body).map_err(|err| FetchError::Decode {
        url: url.to_string(),
        message: err.to_string(),
    })
}
