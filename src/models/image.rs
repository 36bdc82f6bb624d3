use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// One image generation job as handed over by the command layer.
#[derive(Debug, Clone)]
pub struct GenerationRequest {
    prompt: String,
    reference_images: Vec<String>,
    model: String,
    max_attempts: u32,
}

impl GenerationRequest {
    pub fn new(prompt: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            reference_images: Vec::new(),
            model: model.into(),
            max_attempts: 1,
        }
    }

    /// Base64 reference images, optionally prefixed with a `data:` header.
    pub fn with_reference_images(mut self, images: Vec<String>) -> Self {
        self.reference_images = images;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn prompt(&self) -> &str {
        &self.prompt
    }

    pub fn reference_images(&self) -> &[String] {
        &self.reference_images
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SavedImage {
    /// `file://` reference to the stored image.
    pub url: String,
    pub path: PathBuf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationResult {
    Success(SavedImage),
    Failure,
}

impl GenerationResult {
    pub fn is_success(&self) -> bool {
        matches!(self, GenerationResult::Success(_))
    }

    pub fn saved(&self) -> Option<&SavedImage> {
        match self {
            GenerationResult::Success(image) => Some(image),
            GenerationResult::Failure => None,
        }
    }

    /// The `(url, path)` pair the command layer works with; `(None, None)` on failure.
    pub fn into_parts(self) -> (Option<String>, Option<PathBuf>) {
        match self {
            GenerationResult::Success(image) => (Some(image.url), Some(image.path)),
            GenerationResult::Failure => (None, None),
        }
    }
}

impl From<Option<SavedImage>> for GenerationResult {
    fn from(saved: Option<SavedImage>) -> Self {
        saved.map_or(GenerationResult::Failure, GenerationResult::Success)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_max_attempts_is_at_least_one() {
        let request = GenerationRequest::new("a cat", "model").with_max_attempts(0);
        assert_eq!(request.max_attempts(), 1);
    }

    #[test]
    fn test_into_parts() {
        assert_eq!(GenerationResult::Failure.into_parts(), (None, None));

        let saved = SavedImage {
            url: "file:///tmp/a.png".into(),
            path: PathBuf::from("/tmp/a.png"),
        };
        let result = GenerationResult::from(Some(saved));
        assert!(result.is_success());
        assert_eq!(
            result.into_parts(),
            (Some("file:///tmp/a.png".to_string()), Some(PathBuf::from("/tmp/a.png")))
        );
    }
}
