use serde::{Deserialize, Deserializer, Serialize};

// Shapes of the generateContent response. Every field is optional so that a
// sparse but well-formed body still parses.

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub candidates: Vec<Candidate>,
    pub prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Candidate {
    pub content: Option<Content>,
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Content {
    #[serde(default, deserialize_with = "null_as_empty")]
    pub parts: Vec<Part>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Part {
    pub inline_data: Option<InlineData>,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InlineData {
    #[serde(default = "default_mime_type")]
    pub mime_type: String,
    #[serde(default)]
    pub data: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    pub block_reason: Option<String>,
}

fn default_mime_type() -> String {
    "image/png".to_string()
}

/// Explicit `null` reads as an empty list.
fn null_as_empty<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Ok(Option::<Vec<T>>::deserialize(deserializer)?.unwrap_or_default())
}

impl GenerateContentResponse {
    pub fn first_candidate(&self) -> Option<&Candidate> {
        self.candidates.first()
    }

    pub fn parts(&self) -> &[Part] {
        self.first_candidate()
            .and_then(|c| c.content.as_ref())
            .map(|c| c.parts.as_slice())
            .unwrap_or(&[])
    }

    pub fn block_reason(&self) -> Option<&str> {
        self.prompt_feedback
            .as_ref()
            .and_then(|f| f.block_reason.as_deref())
    }

    pub fn finish_reason(&self) -> Option<&str> {
        self.first_candidate()
            .and_then(|c| c.finish_reason.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_provider_shape() {
        let body = r#"{
            "candidates": [{
                "content": {"role": "model", "parts": [
                    {"text": "here you go"},
                    {"inlineData": {"mimeType": "image/jpeg", "data": "AAAA"}}
                ]},
                "finishReason": "STOP"
            }],
            "usageMetadata": {"totalTokenCount": 12}
        }"#;
        let response: GenerateContentResponse = serde_json::from_str(body).unwrap();
        assert_eq!(response.parts().len(), 2);
        assert_eq!(response.finish_reason(), Some("STOP"));
        assert_eq!(response.block_reason(), None);
        let inline = response.parts()[1].inline_data.as_ref().unwrap();
        assert_eq!(inline.mime_type, "image/jpeg");
    }

    #[test]
    fn test_parses_empty_and_blocked_bodies() {
        let empty: GenerateContentResponse = serde_json::from_str("{}").unwrap();
        assert!(empty.parts().is_empty());

        let blocked: GenerateContentResponse =
            serde_json::from_str(r#"{"promptFeedback": {"blockReason": "OTHER"}}"#).unwrap();
        assert_eq!(blocked.block_reason(), Some("OTHER"));
    }

    #[test]
    fn test_null_lists_read_as_empty() {
        let body = r#"{"candidates": null, "promptFeedback": {"blockReason": "SAFETY"}}"#;
        let response: GenerateContentResponse = serde_json::from_str(body).unwrap();
        assert!(response.candidates.is_empty());
        assert_eq!(response.block_reason(), Some("SAFETY"));

        let body =
            r#"{"candidates": [{"content": {"parts": null}, "finishReason": "IMAGE_SAFETY"}]}"#;
        let response: GenerateContentResponse = serde_json::from_str(body).unwrap();
        assert!(response.parts().is_empty());
        assert_eq!(response.finish_reason(), Some("IMAGE_SAFETY"));
    }
}
