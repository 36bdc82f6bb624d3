use async_trait::async_trait;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::error::{Result, VertexError};

/// Raw HTTP reply from the generate endpoint.
#[derive(Debug, Clone)]
pub struct ProviderReply {
    pub status: u16,
    pub body: String,
}

/// Network seam between the orchestrator and the provider.
#[async_trait]
pub trait ProviderTransport: Send + Sync {
    /// POST the payload to `<model>:generateContent` using `api_key`.
    ///
    /// Any HTTP status is a successful reply; only transport failures are errors.
    async fn generate_content(
        &self,
        model: &str,
        api_key: &str,
        payload: &Value,
    ) -> Result<ProviderReply>;

    /// Download an image referenced by URL.
    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>>;
}

#[derive(Clone)]
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| VertexError::ConfigError(format!("cannot build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self, model: &str) -> String {
        format!("{}/{}:generateContent", self.base_url, model)
    }
}

#[async_trait]
impl ProviderTransport for HttpTransport {
    async fn generate_content(
        &self,
        model: &str,
        api_key: &str,
        payload: &Value,
    ) -> Result<ProviderReply> {
        let response = self
            .client
            .post(self.endpoint(model))
            .query(&[("key", api_key)])
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .json(payload)
            .send()
            .await?;

        let status = response.status().as_u16();
        let body = response.text().await?;

        Ok(ProviderReply { status, body })
    }

    async fn fetch_image(&self, url: &str) -> Result<Vec<u8>> {
        let response = self.client.get(url).send().await?;

        if !response.status().is_success() {
            return Err(VertexError::ResponseError(format!(
                "image download returned HTTP {}",
                response.status().as_u16()
            )));
        }

        Ok(response.bytes().await?.to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_endpoint() {
        let transport =
            HttpTransport::new("https://example.com/v1/models/", Duration::from_secs(5)).unwrap();
        assert_eq!(
            transport.endpoint("gemini-3-pro-image-preview"),
            "https://example.com/v1/models/gemini-3-pro-image-preview:generateContent"
        );
    }

    #[tokio::test]
    async fn test_transport_error_hides_api_key() {
        // nothing listens on port 1
        let transport =
            HttpTransport::new("http://127.0.0.1:1/models", Duration::from_secs(2)).unwrap();

        let err = transport
            .generate_content("m", "SECRET_KEY_123", &json!({}))
            .await
            .unwrap_err();

        assert!(err.is_transient());
        assert!(!err.to_string().contains("SECRET_KEY_123"));
        assert!(!format!("{:?}", err).contains("SECRET_KEY_123"));
    }
}
