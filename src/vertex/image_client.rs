use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

use crate::{
    config::VertexConfig,
    error::Result,
    logger,
    models::{GenerateContentResponse, GenerationRequest, GenerationResult, SavedImage},
    rotator::KeyRotator,
    storage::ArtifactStore,
    vertex::extractor::{extract_image, Extraction},
    vertex::transport::ProviderTransport,
};

const LOG_BODY_LIMIT: usize = 500;

/// Result of a single request attempt.
#[derive(Debug)]
enum AttemptOutcome {
    Saved(SavedImage),
    /// Provider refused on safety grounds.
    Blocked(String),
    /// The request itself is malformed; retrying cannot help.
    Fatal(String),
    /// Rotate the key and try again.
    Retry(String),
}

/// Drives generation attempts against the provider with key rotation and backoff.
#[derive(Clone)]
pub struct ImageClient {
    transport: Arc<dyn ProviderTransport>,
    rotator: Arc<KeyRotator>,
    store: Arc<ArtifactStore>,
    config: Arc<VertexConfig>,
}

impl ImageClient {
    pub fn new(
        transport: Arc<dyn ProviderTransport>,
        rotator: Arc<KeyRotator>,
        store: Arc<ArtifactStore>,
        config: Arc<VertexConfig>,
    ) -> Self {
        Self {
            transport,
            rotator,
            store,
            config,
        }
    }

    /// Generate one image, trying up to `request.max_attempts()` times.
    ///
    /// Never fails loudly: every error path is logged and collapses into
    /// [`GenerationResult::Failure`].
    pub async fn generate(&self, request: &GenerationRequest, keys: &[String]) -> GenerationResult {
        if keys.is_empty() {
            log::error!("❌ No API keys configured, cannot generate image");
            return GenerationResult::Failure;
        }

        let _timer = logger::timer("image generation");
        let payload = self.build_payload(request);
        let max_attempts = request.max_attempts();

        log::info!(
            "🎨 Generating image with model {} ({} reference image(s), up to {} attempt(s))",
            request.model(),
            request.reference_images().len(),
            max_attempts
        );

        for attempt in 0..max_attempts {
            let Some(key) = self.rotator.current(keys) else {
                log::error!("❌ No API key available");
                return GenerationResult::Failure;
            };

            if attempt > 0 {
                let delay = self.backoff_delay(attempt);
                log::info!(
                    "🔁 Attempt {}/{}, waiting {:.1}s",
                    attempt + 1,
                    max_attempts,
                    delay.as_secs_f32()
                );
                tokio::time::sleep(delay).await;
            }

            let outcome = match self.attempt(request.model(), &key, &payload, attempt).await {
                Ok(outcome) => outcome,
                Err(e) if e.is_transient() => AttemptOutcome::Retry(e.to_string()),
                Err(e) => {
                    log::error!("❌ Unexpected error during attempt {}: {}", attempt + 1, e);
                    AttemptOutcome::Retry(e.to_string())
                }
            };

            match outcome {
                AttemptOutcome::Saved(image) => {
                    log::info!("✅ Image generated on attempt {}/{}", attempt + 1, max_attempts);
                    return GenerationResult::Success(image);
                }
                AttemptOutcome::Blocked(reason) => {
                    log::warn!("🚫 Generation blocked by content policy: {}", reason);
                    return GenerationResult::Failure;
                }
                AttemptOutcome::Fatal(reason) => {
                    log::error!("❌ Request rejected, not retrying: {}", reason);
                    return GenerationResult::Failure;
                }
                AttemptOutcome::Retry(reason) => {
                    log::warn!(
                        "⚠️  Attempt {}/{} failed: {}",
                        attempt + 1,
                        max_attempts,
                        reason
                    );
                    self.rotator.advance(keys);
                }
            }
        }

        log::error!(
            "❌ Image generation failed after {} attempt(s)",
            max_attempts
        );
        GenerationResult::Failure
    }

    async fn attempt(
        &self,
        model: &str,
        api_key: &str,
        payload: &Value,
        attempt: u32,
    ) -> Result<AttemptOutcome> {
        let reply = self.transport.generate_content(model, api_key, payload).await?;

        if attempt == 0 {
            log::debug!("Provider response status: {}", reply.status);
        }

        let outcome = match reply.status {
            200 => self.handle_response(&reply.body).await?,
            429 => AttemptOutcome::Retry("rate limited (HTTP 429)".into()),
            400 => AttemptOutcome::Fatal(format!(
                "bad request (HTTP 400): {}",
                truncate_for_log(&reply.body, LOG_BODY_LIMIT)
            )),
            401 | 403 => {
                AttemptOutcome::Retry(format!("authentication failed (HTTP {})", reply.status))
            }
            status => AttemptOutcome::Retry(format!(
                "HTTP {}: {}",
                status,
                truncate_for_log(&reply.body, LOG_BODY_LIMIT)
            )),
        };

        Ok(outcome)
    }

    async fn handle_response(&self, body: &str) -> Result<AttemptOutcome> {
        let response: GenerateContentResponse = serde_json::from_str(body)?;

        let outcome = match extract_image(&response) {
            Extraction::Inline { format, data } => self.save(&data, &format).await,
            Extraction::RemoteUrl { url, format } => {
                let bytes = self.transport.fetch_image(&url).await?;
                log::info!("⬇️  Downloaded {} bytes from {}", bytes.len(), url);
                self.save(&STANDARD.encode(bytes), &format).await
            }
            Extraction::Blocked { reason } => AttemptOutcome::Blocked(reason),
            Extraction::NoImage => AttemptOutcome::Retry("no image data in response".into()),
        };

        Ok(outcome)
    }

    async fn save(&self, data: &str, format: &str) -> AttemptOutcome {
        match self.store.save(data, format).await {
            Some(image) => AttemptOutcome::Saved(image),
            None => AttemptOutcome::Retry("failed to save image".into()),
        }
    }

    /// Request body for `generateContent`.
    pub fn build_payload(&self, request: &GenerationRequest) -> Value {
        let mut parts = vec![json!({
            "text": format!("{}\n\n{}", self.config.system_instruction, request.prompt())
        })];

        let mut added = 0;
        for image in request.reference_images() {
            if let Some(data) = clean_reference_image(image) {
                parts.push(json!({
                    "inlineData": {
                        "mimeType": "image/png",
                        "data": data
                    }
                }));
                added += 1;
            }
        }
        if added > 0 {
            log::info!("📎 Attached {} reference image(s)", added);
        }

        json!({
            "contents": [
                {
                    "role": "user",
                    "parts": parts
                }
            ],
            "generationConfig": {
                "temperature": self.config.temperature,
                "topP": self.config.top_p,
                "maxOutputTokens": self.config.max_output_tokens
            }
        })
    }

    /// `min(2^attempt, cap)` backoff units.
    pub fn backoff_delay(&self, attempt: u32) -> Duration {
        let units = 2u64.saturating_pow(attempt).min(self.config.backoff_cap);
        self.config
            .backoff_unit
            .saturating_mul(u32::try_from(units).unwrap_or(u32::MAX))
    }
}

/// Strip a `data:<mime>;base64,` header, keeping only the payload.
fn clean_reference_image(image: &str) -> Option<&str> {
    let image = image.trim();
    let payload = if image.starts_with("data:") {
        image.split_once(',').map_or(image, |(_, payload)| payload)
    } else {
        image
    };
    if payload.is_empty() {
        None
    } else {
        Some(payload)
    }
}

fn truncate_for_log(value: &str, limit: usize) -> String {
    if value.chars().count() <= limit {
        return value.to_string();
    }
    let truncated: String = value.chars().take(limit).collect();
    format!("{}... (truncated)", truncated)
}
