use privacykit_types::{PrivacyKitError, PrivacyKitResult};
use reqwest::{Client, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::retry::API_TIMEOUT;

/// JSON client for a provider's REST API. Authentication headers are
/// independently optional: `X-API-Key` and `X-Access-Token`.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
    access_token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> PrivacyKitResult<Self> {
        let client = Client::builder()
            .timeout(API_TIMEOUT)
            .build()
            .map_err(|e| PrivacyKitError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            access_token: None,
        })
    }

    pub fn with_timeout(base_url: &str, timeout: Duration) -> PrivacyKitResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| PrivacyKitError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: None,
            access_token: None,
        })
    }

    pub fn with_credentials(
        mut self,
        api_key: Option<String>,
        access_token: Option<String>,
    ) -> Self {
        self.api_key = api_key;
        self.access_token = access_token;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn decorate(&self, mut request: RequestBuilder) -> RequestBuilder {
        if let Some(ref key) = self.api_key {
            request = request.header("X-API-Key", key);
        }
        if let Some(ref token) = self.access_token {
            request = request.header("X-Access-Token", token);
        }
        request
    }

    pub async fn get_json<T: DeserializeOwned>(&self, path: &str) -> PrivacyKitResult<T> {
        let url = self.url(path);
        debug!("GET {}", url);

        let response = self
            .decorate(self.client.get(&url))
            .send()
            .await
            .map_err(|e| PrivacyKitError::Network(format!("GET {} failed: {}", url, e)))?;

        Self::handle(response).await
    }

    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> PrivacyKitResult<T>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        debug!("POST {}", url);

        let response = self
            .decorate(self.client.post(&url))
            .json(body)
            .send()
            .await
            .map_err(|e| PrivacyKitError::Network(format!("POST {} failed: {}", url, e)))?;

        Self::handle(response).await
    }

    /// 5xx is a transport failure (retryable); 4xx bodies are surfaced to
    /// the caller, which maps server-reported business errors itself.
    async fn handle<T: DeserializeOwned>(response: reqwest::Response) -> PrivacyKitResult<T> {
        let status = response.status();
        if status.is_server_error() {
            return Err(PrivacyKitError::Network(format!(
                "server error: HTTP {}",
                status.as_u16()
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| PrivacyKitError::Network(format!("failed to read response: {}", e)))?;

        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(value),
            Err(_) if status.is_client_error() => Err(PrivacyKitError::Transaction {
                cause: format!(
                    "HTTP {}: {}",
                    status.as_u16(),
                    String::from_utf8_lossy(&bytes)
                ),
                signature: None,
            }),
            Err(e) => Err(PrivacyKitError::Network(format!(
                "invalid response JSON: {}",
                e
            ))),
        }
    }
}
