mod requests;

#[cfg(test)]
mod fake_insight_generator;

use anyhow::{Context as _, Result};
use async_trait::async_trait;
use google_ai::{GenerateContentRequest, GenerationConfig};
use rand::RngCore;
use serde::de::DeserializeOwned;
use std::sync::Arc;

#[cfg(test)]
pub use fake_insight_generator::FakeInsightGenerator;
pub use requests::*;

/// The outcome of asking for an insight.
///
/// Generation never fails outright: when the external generator is unavailable or returns
/// something unusable, the request's fallback payload is used and marked as degraded.
#[derive(Debug, Clone, PartialEq)]
pub enum Insight<T> {
    Generated(T),
    Degraded(T),
}

impl<T> Insight<T> {
    pub fn payload(&self) -> &T {
        match self {
            Self::Generated(payload) | Self::Degraded(payload) => payload,
        }
    }

    pub fn into_payload(self) -> T {
        match self {
            Self::Generated(payload) | Self::Degraded(payload) => payload,
        }
    }

    pub fn is_degraded(&self) -> bool {
        matches!(self, Self::Degraded(_))
    }
}

/// Produces free-form model output for a prompt.
#[async_trait]
pub trait InsightGenerator: Send + Sync {
    async fn generate(&self, prompt: &str) -> Result<String>;
}

/// Describes one kind of insight: how to ask for it, how to check the answer, and what to use
/// when no usable answer comes back.
pub trait InsightRequest: Send + Sync {
    type Payload: DeserializeOwned + Send;

    fn prompt(&self) -> String;

    fn validate(&self, _payload: &Self::Payload) -> Result<()> {
        Ok(())
    }

    fn fallback(&self, rng: &mut dyn RngCore) -> Self::Payload;
}

/// Asks the generator for an insight, degrading to the request's fallback on any failure.
pub async fn generate_insight<R: InsightRequest>(
    generator: &dyn InsightGenerator,
    request: &R,
) -> Insight<R::Payload> {
    match try_generate_insight(generator, request).await {
        Ok(payload) => Insight::Generated(payload),
        Err(error) => {
            tracing::warn!(
                target: "insights",
                error = %format!("{error:#}"),
                "insight generation failed, using fallback"
            );
            degraded(request)
        }
    }
}

async fn try_generate_insight<R: InsightRequest>(
    generator: &dyn InsightGenerator,
    request: &R,
) -> Result<R::Payload> {
    let text = generator.generate(&request.prompt()).await?;
    let json = extract_json_object(&text).context("model output contained no JSON object")?;
    let payload = serde_json::from_str::<R::Payload>(json).context("malformed insight payload")?;
    request.validate(&payload)?;
    Ok(payload)
}

fn degraded<R: InsightRequest>(request: &R) -> Insight<R::Payload> {
    Insight::Degraded(request.fallback(&mut rand::thread_rng()))
}

/// Returns the span from the first `{` to the last `}`, which is where models put the JSON
/// document when they wrap it in prose or code fences.
fn extract_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

pub struct GoogleAiInsightGenerator {
    client: reqwest::Client,
    api_url: String,
    api_key: Option<Arc<str>>,
    model: String,
}

impl GoogleAiInsightGenerator {
    pub fn new(
        client: reqwest::Client,
        api_url: String,
        api_key: Option<Arc<str>>,
        model: String,
    ) -> Self {
        Self {
            client,
            api_url,
            api_key,
            model,
        }
    }
}

#[async_trait]
impl InsightGenerator for GoogleAiInsightGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        let api_key = self
            .api_key
            .as_deref()
            .context("Google AI API key not configured")?;

        let mut request = GenerateContentRequest::from_prompt(self.model.as_str(), prompt);
        request.generation_config = Some(GenerationConfig {
            response_mime_type: Some("application/json".into()),
            ..Default::default()
        });

        let response =
            google_ai::generate_content(&self.client, &self.api_url, api_key, request).await?;
        if let Some(reason) = response
            .prompt_feedback
            .as_ref()
            .and_then(|feedback| feedback.block_reason.as_deref())
        {
            anyhow::bail!("prompt was blocked: {reason}");
        }

        response.text().context("model returned no text")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extract_json_object() {
        assert_eq!(
            extract_json_object("Sure! ```json\n{\"score\": 80, \"a\": {\"b\": 1}}\n```"),
            Some("{\"score\": 80, \"a\": {\"b\": 1}}")
        );
        assert_eq!(extract_json_object("no json here"), None);
        assert_eq!(extract_json_object("} backwards {"), None);
    }

    #[tokio::test]
    async fn test_generated_insight() {
        let generator = FakeInsightGenerator::responding(
            r#"Here you go: {"score": 82, "recommendations": ["Add FAQ schema"]}"#,
        );
        let request = SiteScanRequest {
            url: "https://example.com".into(),
        };

        let insight = generate_insight(&generator, &request).await;
        assert!(!insight.is_degraded());
        assert_eq!(insight.payload().score, 82.0);
        assert_eq!(insight.payload().recommendations.len(), 1);
        assert_eq!(
            generator.prompts(),
            vec![
                "Analyze this website URL for AI Engine Optimization (AEO): https://example.com\n\
                 Provide a JSON response with: score (0-100) and recommendations array."
                    .to_string()
            ]
        );
    }

    #[tokio::test]
    async fn test_failed_generation_degrades_to_fallback() {
        let request = SiteScanRequest {
            url: "https://example.com".into(),
        };

        let insight = generate_insight(&FakeInsightGenerator::failing(), &request).await;
        assert!(insight.is_degraded());
        assert_eq!(insight.payload().score, 50.0);
        assert_eq!(insight.payload().recommendations.len(), 5);
    }

    #[tokio::test]
    async fn test_unusable_output_degrades_to_fallback() {
        let request = SiteScanRequest {
            url: "https://example.com".into(),
        };

        for output in [
            "I can't help with that.",
            r#"{"score": "high"}"#,
            r#"{"score": 140, "recommendations": []}"#,
        ] {
            let insight =
                generate_insight(&FakeInsightGenerator::responding(output), &request).await;
            assert!(insight.is_degraded(), "{output}");
        }
    }

    #[tokio::test]
    async fn test_missing_api_key_is_a_generation_failure() {
        let generator = GoogleAiInsightGenerator::new(
            reqwest::Client::new(),
            google_ai::API_URL.into(),
            None,
            google_ai::DEFAULT_MODEL.into(),
        );
        assert!(generator.generate("anything").await.is_err());
    }
}
