//! Locates the image in a generateContent response.
//!
//! Structured `inlineData` parts are the primary path. Scanning free text for
//! data URLs and links is a best-effort fallback: the provider makes no
//! promise about how it phrases text around an embedded image.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::GenerateContentResponse;

static DATA_URL_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"data:image/([a-zA-Z0-9.+-]+);base64,([A-Za-z0-9+/=]+)")
        .expect("data URL pattern is valid")
});

static HTTP_URL_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"https?://[^\s)]+").expect("http URL pattern is valid"));

/// Finish reasons meaning the provider refused on safety grounds.
pub const SAFETY_FINISH_REASONS: &[&str] = &["IMAGE_SAFETY", "IMAGE_PROHIBITED_CONTENT", "SAFETY"];

const DEFAULT_FORMAT: &str = "png";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    /// Base64 image payload found inline or in a data URL.
    Inline { format: String, data: String },
    /// Only a link to the image was found; it must be downloaded.
    RemoteUrl { url: String, format: String },
    /// The provider refused to produce an image. Terminal.
    Blocked { reason: String },
    /// Nothing usable. Worth another attempt.
    NoImage,
}

pub fn extract_image(response: &GenerateContentResponse) -> Extraction {
    let mut url_candidate: Option<String> = None;

    for part in response.parts() {
        if let Some(inline) = &part.inline_data {
            if !inline.data.is_empty() {
                let format = mime_subtype(&inline.mime_type);
                log::info!("🖼️  Found inline image data, format: {}", format);
                return Extraction::Inline {
                    format,
                    data: inline.data.clone(),
                };
            }
            continue;
        }

        let Some(text) = part.text.as_deref() else {
            continue;
        };

        if let Some(caps) = DATA_URL_PATTERN.captures(text) {
            log::info!("🖼️  Found data URL in text response");
            return Extraction::Inline {
                format: caps[1].to_string(),
                data: caps[2].to_string(),
            };
        }

        if let Some(m) = HTTP_URL_PATTERN.find(text) {
            log::info!("🔗 Found image URL in text response: {}", m.as_str());
            url_candidate = Some(m.as_str().to_string());
        }
    }

    if let Some(reason) = response.block_reason() {
        return Extraction::Blocked {
            reason: format!("promptFeedback.blockReason={}", reason),
        };
    }

    if let Some(reason) = response.finish_reason() {
        if SAFETY_FINISH_REASONS.contains(&reason) {
            return Extraction::Blocked {
                reason: format!("finishReason={}", reason),
            };
        }
    }

    match url_candidate {
        Some(url) => Extraction::RemoteUrl {
            url,
            format: DEFAULT_FORMAT.to_string(),
        },
        None => Extraction::NoImage,
    }
}

/// `image/jpeg; charset=x` -> `jpeg`.
fn mime_subtype(mime_type: &str) -> String {
    mime_type
        .split_once('/')
        .map(|(_, subtype)| subtype.split(';').next().unwrap_or_default().trim())
        .filter(|subtype| !subtype.is_empty())
        .unwrap_or(DEFAULT_FORMAT)
        .to_string()
}
