use std::mem;

use anyhow::{anyhow, bail, Context as _, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const API_URL: &str = "https://generativelanguage.googleapis.com";
pub const DEFAULT_MODEL: &str = "gemini-1.5-pro";
const API_KEY_HEADER: &str = "x-goog-api-key";

/// Sends a single, non-streaming `generateContent` request.
pub async fn generate_content(
    client: &reqwest::Client,
    api_url: &str,
    api_key: &str,
    mut request: GenerateContentRequest,
) -> Result<GenerateContentResponse> {
    let api_key = api_key.trim();
    validate_generate_content_request(&request)?;

    // The model is part of the path, not the body.
    let model_id = mem::take(&mut request.model.model_id);
    let uri = format!("{api_url}/v1beta/models/{model_id}:generateContent");

    let response = client
        .post(uri)
        .header(API_KEY_HEADER, api_key)
        .json(&request)
        .send()
        .await
        .map_err(reqwest::Error::without_url)
        .context("failed to send generateContent request")?;

    let status = response.status();
    let text = response.text().await?;
    if !status.is_success() {
        return Err(anyhow!(
            "error during generateContent, status code: {:?}, body: {}",
            status,
            text
        ));
    }

    serde_json::from_str::<GenerateContentResponse>(&text)
        .with_context(|| format!("error parsing generateContent response: {text:?}"))
}

pub fn validate_generate_content_request(request: &GenerateContentRequest) -> Result<()> {
    if request.model.is_empty() {
        bail!("Model must be specified");
    }

    if request.contents.is_empty() {
        bail!("Request must contain at least one content item");
    }

    let empty_user_content = request
        .contents
        .iter()
        .any(|content| content.role == Role::User && content.parts.is_empty());
    if empty_user_content {
        bail!("User content must contain at least one part");
    }

    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentRequest {
    #[serde(default, skip_serializing_if = "ModelName::is_empty")]
    pub model: ModelName,
    pub contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system_instruction: Option<SystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub generation_config: Option<GenerationConfig>,
}

impl GenerateContentRequest {
    /// A request holding one user turn made of a single text part.
    pub fn from_prompt(model_id: impl Into<String>, prompt: impl Into<String>) -> Self {
        Self {
            model: ModelName {
                model_id: model_id.into(),
            },
            contents: vec![Content {
                parts: vec![Part::TextPart(TextPart {
                    text: prompt.into(),
                })],
                role: Role::User,
            }],
            system_instruction: None,
            generation_config: None,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentResponse {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates: Option<Vec<GenerateContentCandidate>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_feedback: Option<PromptFeedback>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub usage_metadata: Option<UsageMetadata>,
}

impl GenerateContentResponse {
    /// The concatenated text of the first candidate, if it produced any.
    pub fn text(&self) -> Option<String> {
        let candidate = self.candidates.as_ref()?.first()?;
        let text = candidate
            .content
            .parts
            .iter()
            .map(|part| match part {
                Part::TextPart(part) => part.text.as_str(),
            })
            .collect::<String>();
        (!text.is_empty()).then_some(text)
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateContentCandidate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub index: Option<usize>,
    pub content: Content,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Content {
    #[serde(default)]
    pub parts: Vec<Part>,
    pub role: Role,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemInstruction {
    pub parts: Vec<Part>,
}

#[derive(Debug, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    User,
    Model,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Part {
    TextPart(TextPart),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextPart {
    pub text: String,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromptFeedback {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_reason: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_reason_message: Option<String>,
}

#[derive(Debug, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UsageMetadata {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt_token_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidates_token_count: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_token_count: Option<u64>,
}

#[derive(Debug, Default, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub candidate_count: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_output_tokens: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f64>,
    /// Set to `application/json` to ask the model for a bare JSON document.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_mime_type: Option<String>,
}

#[derive(Debug, Default)]
pub struct ModelName {
    pub model_id: String,
}

impl ModelName {
    pub fn is_empty(&self) -> bool {
        self.model_id.is_empty()
    }
}

const MODEL_NAME_PREFIX: &str = "models/";

impl Serialize for ModelName {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{MODEL_NAME_PREFIX}{}", &self.model_id))
    }
}

impl<'de> Deserialize<'de> for ModelName {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let string = String::deserialize(deserializer)?;
        match string.strip_prefix(MODEL_NAME_PREFIX) {
            Some(id) => Ok(Self {
                model_id: id.to_string(),
            }),
            None => Err(serde::de::Error::custom(format!(
                "Expected model name to begin with {MODEL_NAME_PREFIX}, got: {string}"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_prompt_request_serialization() {
        let mut request = GenerateContentRequest::from_prompt("gemini-1.5-pro", "hello");
        request.generation_config = Some(GenerationConfig {
            response_mime_type: Some("application/json".into()),
            ..Default::default()
        });

        assert_eq!(
            serde_json::to_value(&request).unwrap(),
            json!({
                "model": "models/gemini-1.5-pro",
                "contents": [{ "parts": [{ "text": "hello" }], "role": "user" }],
                "generationConfig": { "responseMimeType": "application/json" }
            })
        );
    }

    #[test]
    fn test_validate_request() {
        let request = GenerateContentRequest::from_prompt("", "hello");
        assert!(validate_generate_content_request(&request).is_err());

        let mut request = GenerateContentRequest::from_prompt("gemini-1.5-pro", "hello");
        assert!(validate_generate_content_request(&request).is_ok());

        request.contents[0].parts.clear();
        assert!(validate_generate_content_request(&request).is_err());

        request.contents.clear();
        assert!(validate_generate_content_request(&request).is_err());
    }

    #[test]
    fn test_response_text_joins_first_candidate_parts() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [
                {
                    "content": {
                        "parts": [{ "text": "{\"score\": " }, { "text": "72}" }],
                        "role": "model"
                    },
                    "finishReason": "STOP"
                },
                {
                    "content": { "parts": [{ "text": "ignored" }], "role": "model" }
                }
            ],
            "usageMetadata": { "promptTokenCount": 12, "totalTokenCount": 20 }
        }))
        .unwrap();

        assert_eq!(response.text().as_deref(), Some("{\"score\": 72}"));
    }

    #[test]
    fn test_response_without_candidates_has_no_text() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "promptFeedback": { "blockReason": "SAFETY" }
        }))
        .unwrap();

        assert_eq!(response.text(), None);
        assert_eq!(
            response
                .prompt_feedback
                .and_then(|feedback| feedback.block_reason)
                .as_deref(),
            Some("SAFETY")
        );
    }

    #[test]
    fn test_model_name_requires_prefix() {
        let name: ModelName = serde_json::from_value(json!("models/gemini-1.5-pro")).unwrap();
        assert_eq!(name.model_id, "gemini-1.5-pro");
        assert!(serde_json::from_value::<ModelName>(json!("gemini-1.5-pro")).is_err());
    }

    #[tokio::test]
    async fn test_send_error_does_not_expose_api_key() {
        let error = generate_content(
            &reqwest::Client::new(),
            "http://127.0.0.1:1",
            "secret-api-key",
            GenerateContentRequest::from_prompt("gemini-1.5-pro", "hello"),
        )
        .await
        .unwrap_err();

        let message = format!("{error:#}");
        assert!(message.starts_with("failed to send generateContent request"));
        assert!(!message.contains("secret-api-key"), "{message}");
    }
}
