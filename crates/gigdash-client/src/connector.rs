//! Transport seam between the receiver and the network.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::{Stream, StreamExt};
use reqwest::header::{ACCEPT, CACHE_CONTROL};

use gigdash_core::{defaults, Error, Result};

/// Raw body chunks of one open stream. The stream ending means the
/// connection closed; an `Err` item is a transient transport error.
pub type ByteStream = Pin<Box<dyn Stream<Item = Result<Bytes>> + Send>>;

/// Opens one streaming connection per call.
#[async_trait]
pub trait Connector: Send + Sync + 'static {
    async fn open(&self) -> Result<ByteStream>;

    /// Human-readable target for logs.
    fn describe(&self) -> String;
}

/// Connects to the SSE endpoint over HTTP.
pub struct HttpConnector {
    client: reqwest::Client,
    url: String,
    tenant_id: Option<String>,
}

impl HttpConnector {
    pub fn new(url: impl Into<String>, tenant_id: Option<String>) -> Result<Self> {
        // No overall timeout: the response body is meant to stay open.
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Config(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self::with_client(client, url, tenant_id))
    }

    pub fn with_client(
        client: reqwest::Client,
        url: impl Into<String>,
        tenant_id: Option<String>,
    ) -> Self {
        Self {
            client,
            url: url.into(),
            tenant_id,
        }
    }
}

#[async_trait]
impl Connector for HttpConnector {
    async fn open(&self) -> Result<ByteStream> {
        let mut request = self
            .client
            .get(&self.url)
            .header(ACCEPT, "text/event-stream")
            .header(CACHE_CONTROL, "no-cache");
        if let Some(ref tenant) = self.tenant_id {
            request = request.query(&[(defaults::TENANT_QUERY_PARAM, tenant)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Transport(format!("Failed to connect to event stream: {}", e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let message = response.text().await.unwrap_or_default();
            return Err(Error::Http {
                status: status.as_u16(),
                message,
            });
        }

        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| Error::Transport(format!("Stream error: {}", e))));
        Ok(Box::pin(stream))
    }

    fn describe(&self) -> String {
        match self.tenant_id {
            Some(ref tenant) => format!("{}?{}={}", self.url, defaults::TENANT_QUERY_PARAM, tenant),
            None => self.url.clone(),
        }
    }
}
