pub mod extractor;
pub mod image_client;
pub mod transport;

use crate::{
    config::VertexConfig,
    error::Result,
    models::{GenerationRequest, GenerationResult, SavedImage},
    rotator::KeyRotator,
    storage::ArtifactStore,
};
use std::sync::Arc;

pub use extractor::{extract_image, Extraction};
pub use image_client::ImageClient;
pub use transport::{HttpTransport, ProviderReply, ProviderTransport};

/// Entry point for the command layer.
///
/// Cheap to clone; clones share the key rotation cursor, the artifact store
/// and the HTTP connection pool.
#[derive(Clone)]
pub struct VertexClient {
    config: Arc<VertexConfig>,
    image_client: ImageClient,
    rotator: Arc<KeyRotator>,
    store: Arc<ArtifactStore>,
}

impl VertexClient {
    pub fn new(config: VertexConfig) -> Result<Self> {
        let transport = HttpTransport::new(config.base_url.clone(), config.request_timeout)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    pub fn with_transport(
        config: VertexConfig,
        transport: Arc<dyn ProviderTransport>,
    ) -> Self {
        if config.api_keys.is_empty() {
            log::warn!("⚠️  No API keys configured; generation will fail until keys are supplied");
        }

        let config = Arc::new(config);
        let rotator = Arc::new(KeyRotator::new());
        let store = Arc::new(ArtifactStore::new(config.image_dir()));
        let image_client =
            ImageClient::new(transport, rotator.clone(), store.clone(), config.clone());

        Self {
            config,
            image_client,
            rotator,
            store,
        }
    }

    pub fn image(&self) -> &ImageClient {
        &self.image_client
    }

    pub fn config(&self) -> &VertexConfig {
        &self.config
    }

    pub fn rotator(&self) -> &Arc<KeyRotator> {
        &self.rotator
    }

    pub fn store(&self) -> &Arc<ArtifactStore> {
        &self.store
    }

    pub fn last_saved(&self) -> Option<SavedImage> {
        self.store.last_saved()
    }

    /// Build a request from the configured model and retry budget.
    pub fn request(
        &self,
        prompt: impl Into<String>,
        reference_images: Vec<String>,
    ) -> GenerationRequest {
        GenerationRequest::new(prompt, self.config.model_name.clone())
            .with_reference_images(reference_images)
            .with_max_attempts(self.config.max_retry_attempts)
    }

    /// Generate with the configured keys, model and retry budget.
    pub async fn generate(
        &self,
        prompt: impl Into<String>,
        reference_images: Vec<String>,
    ) -> GenerationResult {
        let request = self.request(prompt, reference_images);
        self.image_client
            .generate(&request, &self.config.api_keys)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use serde_json::{json, Value};
    use std::sync::Mutex;

    struct RecordingTransport {
        calls: Mutex<Vec<(String, String)>>,
    }

    #[async_trait]
    impl ProviderTransport for RecordingTransport {
        async fn generate_content(
            &self,
            model: &str,
            api_key: &str,
            _payload: &Value,
        ) -> Result<ProviderReply> {
            self.calls
                .lock()
                .unwrap()
                .push((model.to_string(), api_key.to_string()));
            Ok(ProviderReply {
                status: 200,
                body: json!({"candidates": [{"content": {"parts": [
                    {"inlineData": {"mimeType": "image/png", "data": STANDARD.encode(b"img")}}
                ]}}]})
                .to_string(),
            })
        }

        async fn fetch_image(&self, _url: &str) -> Result<Vec<u8>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_generate_uses_configured_keys_and_model() {
        let dir = tempfile::tempdir().unwrap();
        let config = VertexConfig::new()
            .with_api_keys(["k1", "k2"])
            .with_model("gemini-2.5-flash-image")
            .with_data_dir(dir.path());
        let transport = Arc::new(RecordingTransport {
            calls: Mutex::new(Vec::new()),
        });
        let client = VertexClient::with_transport(config, transport.clone());

        let result = client.generate("a lighthouse", Vec::new()).await;

        assert!(result.is_success());
        assert_eq!(
            *transport.calls.lock().unwrap(),
            vec![("gemini-2.5-flash-image".to_string(), "k1".to_string())]
        );
        assert_eq!(client.last_saved().as_ref(), result.saved());
        assert!(client.last_saved().unwrap().path.starts_with(dir.path().canonicalize().unwrap()));
    }

    #[test]
    fn test_request_uses_config_budget() {
        let client = VertexClient::new(VertexConfig::new().with_max_retry_attempts(4)).unwrap();
        let request = client.request("p", vec!["AAAA".into()]);
        assert_eq!(request.max_attempts(), 4);
        assert_eq!(request.model(), crate::config::DEFAULT_MODEL);
        assert_eq!(request.reference_images().len(), 1);
    }
}
