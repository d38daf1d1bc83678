//! Artifact byte streaming
//!
//! [`ArtifactTransport`] hands back a stream rather than a buffer so large PDFs never
//! sit fully in memory.

use bytes::Bytes;
use futures::stream::{BoxStream, StreamExt};

use crate::config::SourceConfig;
use crate::error::{Result, TransportError};

/// Stream of artifact chunks
pub type ByteStream = BoxStream<'static, std::result::Result<Bytes, TransportError>>;

/// Abstraction over artifact retrieval, enabling testability.
#[async_trait::async_trait]
pub trait ArtifactTransport: Send + Sync {
    /// Start downloading `url`; errors before the first byte are returned directly,
    /// later ones surface as stream items.
    async fn stream_download(&self, url: &str) -> std::result::Result<ByteStream, TransportError>;
}

/// Production [`ArtifactTransport`] over HTTP(S)
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    /// Build a transport with the configured request timeout
    pub fn new(config: &SourceConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()?;
        Ok(Self::with_client(client))
    }

    /// Wrap an existing HTTP client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait::async_trait]
impl ArtifactTransport for HttpTransport {
    async fn stream_download(&self, url: &str) -> std::result::Result<ByteStream, TransportError> {
        let response = self.client.get(url).send().await?;

        let status = response.status();
        if !status.is_success() {
            return Err(TransportError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(TransportError::from))
            .boxed())
    }
}
