//! Where key set documents come from

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, instrument};
use url::Url;

use crate::error::KeySetFetchError;
use crate::key_set::JwksDocument;

/// A provider of JWKS documents
///
/// The cache owns one source and calls it for the startup fetch and every
/// refresh. Implementations must not cache on their own.
#[async_trait]
pub trait KeySetSource: Send + Sync {
    async fn fetch(&self) -> Result<JwksDocument, KeySetFetchError>;

    /// Human-readable location for logs
    fn describe(&self) -> String;
}

/// Fetches the key set from the identity provider over HTTPS
#[derive(Debug, Clone)]
pub struct HttpKeySetSource {
    client: reqwest::Client,
    url: Url,
}

impl HttpKeySetSource {
    pub fn new(url: Url, timeout: Duration) -> Result<Self, KeySetFetchError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout.min(Duration::from_secs(10)))
            .user_agent(concat!("atelier-auth/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| KeySetFetchError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, url })
    }

    /// Build a source from an existing client, e.g. one shared with the
    /// token endpoint
    pub fn with_client(client: reqwest::Client, url: Url) -> Self {
        Self { client, url }
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl KeySetSource for HttpKeySetSource {
    #[instrument(level = "debug", skip(self), fields(url = %self.url))]
    async fn fetch(&self) -> Result<JwksDocument, KeySetFetchError> {
        let response = self
            .client
            .get(self.url.clone())
            .header(reqwest::header::ACCEPT, "application/json")
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    KeySetFetchError::Request(format!("request timed out: {e}"))
                } else {
                    KeySetFetchError::Request(e.to_string())
                }
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(KeySetFetchError::Status(status.as_u16()));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| KeySetFetchError::Request(format!("failed to read body: {e}")))?;
        let document: JwksDocument =
            serde_json::from_slice(&body).map_err(|e| KeySetFetchError::Decode(e.to_string()))?;

        debug!("Fetched JWKS document with {} keys", document.keys.len());
        Ok(document)
    }

    fn describe(&self) -> String {
        self.url.to_string()
    }
}
