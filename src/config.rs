use serde_json::Value;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Result, VertexError};

pub const DEFAULT_BASE_URL: &str = "https://aiplatform.googleapis.com/v1/publishers/google/models";
pub const DEFAULT_MODEL: &str = "gemini-3-pro-image-preview";
pub const DEFAULT_SYSTEM_INSTRUCTION: &str = "Generate an image based on the following description. Output only the image, no text explanation needed.";

#[derive(Debug, Clone)]
pub struct VertexConfig {
    pub api_keys: Vec<String>,
    pub model_name: String,
    pub max_retry_attempts: u32,
    pub base_url: String,
    pub data_dir: PathBuf,
    pub request_timeout: Duration,
    pub backoff_unit: Duration,
    pub backoff_cap: u64,
    pub temperature: f64,
    pub top_p: f64,
    pub max_output_tokens: u32,
    pub system_instruction: String,
}

impl Default for VertexConfig {
    fn default() -> Self {
        VertexConfig {
            api_keys: Vec::new(),
            model_name: DEFAULT_MODEL.to_string(),
            max_retry_attempts: 3,
            base_url: DEFAULT_BASE_URL.to_string(),
            data_dir: PathBuf::from("data"),
            request_timeout: Duration::from_secs(120),
            backoff_unit: Duration::from_secs(1),
            backoff_cap: 10,
            temperature: 1.0,
            top_p: 0.95,
            max_output_tokens: 8192,
            system_instruction: DEFAULT_SYSTEM_INSTRUCTION.to_string(),
        }
    }
}

impl VertexConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(keys) = env::var("VERTEX_API_KEY") {
            config.api_keys = normalize_api_keys(&Value::String(keys));
        }
        if let Ok(model) = env::var("VERTEX_MODEL_NAME") {
            let model = model.trim();
            if !model.is_empty() {
                config.model_name = model.to_string();
            }
        }
        if let Some(attempts) = env::var("VERTEX_MAX_RETRY_ATTEMPTS")
            .ok()
            .and_then(|s| s.trim().parse::<u32>().ok())
        {
            config.max_retry_attempts = attempts.max(1);
        }
        if let Ok(base_url) = env::var("VERTEX_BASE_URL") {
            config.base_url = base_url.trim_end_matches('/').to_string();
        }
        if let Ok(dir) = env::var("VERTEX_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(secs) = env::var("VERTEX_REQUEST_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.trim().parse::<u64>().ok())
        {
            config.request_timeout = Duration::from_secs(secs);
        }

        config
    }

    /// Build from the plugin host's JSON config object.
    pub fn from_json(value: &Value) -> Result<Self> {
        let obj = value
            .as_object()
            .ok_or_else(|| VertexError::ConfigError("plugin config must be an object".into()))?;

        let mut config = Self::default();

        if let Some(keys) = obj.get("vertex_api_key") {
            config.api_keys = normalize_api_keys(keys);
        }
        if let Some(model) = obj.get("model_name").and_then(Value::as_str) {
            let model = model.trim();
            if !model.is_empty() {
                config.model_name = model.to_string();
            }
        }
        if let Some(attempts) = obj.get("max_retry_attempts") {
            let attempts = attempts
                .as_u64()
                .or_else(|| attempts.as_str().and_then(|s| s.trim().parse().ok()))
                .ok_or_else(|| {
                    VertexError::ConfigError(format!(
                        "max_retry_attempts must be a positive integer, got {}",
                        attempts
                    ))
                })?;
            config.max_retry_attempts = u32::try_from(attempts).unwrap_or(u32::MAX).max(1);
        }
        if let Some(dir) = obj.get("data_dir").and_then(Value::as_str) {
            config.data_dir = PathBuf::from(dir);
        }

        Ok(config)
    }

    pub fn with_api_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<Value> = keys.into_iter().map(|k| Value::String(k.into())).collect();
        self.api_keys = normalize_api_keys(&Value::Array(keys));
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model_name = model.into();
        self
    }

    pub fn with_max_retry_attempts(mut self, attempts: u32) -> Self {
        self.max_retry_attempts = attempts.max(1);
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    pub fn with_backoff(mut self, unit: Duration, cap: u64) -> Self {
        self.backoff_unit = unit;
        self.backoff_cap = cap;
        self
    }

    pub fn with_generation_params(
        mut self,
        temperature: f64,
        top_p: f64,
        max_output_tokens: u32,
    ) -> Self {
        self.temperature = temperature;
        self.top_p = top_p;
        self.max_output_tokens = max_output_tokens;
        self
    }

    pub fn with_system_instruction(mut self, instruction: impl Into<String>) -> Self {
        self.system_instruction = instruction.into();
        self
    }

    pub fn image_dir(&self) -> PathBuf {
        self.data_dir.join("images")
    }
}

/// Normalize a configured key value into a clean key list.
///
/// Accepts a single string (comma separated keys allowed) or an array whose
/// elements are stringified. Entries are trimmed and empty ones dropped.
pub fn normalize_api_keys(value: &Value) -> Vec<String> {
    match value {
        Value::String(s) => s
            .split(',')
            .map(str::trim)
            .filter(|k| !k.is_empty())
            .map(String::from)
            .collect(),
        Value::Array(items) => items
            .iter()
            .filter_map(|item| match item {
                Value::Null => None,
                Value::String(s) => Some(s.trim().to_string()),
                other => Some(other.to_string().trim().to_string()),
            })
            .filter(|k| !k.is_empty())
            .collect(),
        _ => Vec::new(),
    }
}
