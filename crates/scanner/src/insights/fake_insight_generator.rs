use super::InsightGenerator;
use anyhow::{anyhow, Result};
use async_trait::async_trait;
use parking_lot::Mutex;

/// An [`InsightGenerator`] that replies with a fixed response and records every prompt.
pub struct FakeInsightGenerator {
    response: Option<String>,
    prompts: Mutex<Vec<String>>,
}

impl FakeInsightGenerator {
    pub fn responding(response: impl Into<String>) -> Self {
        Self {
            response: Some(response.into()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// A generator that behaves like an unreachable model.
    pub fn failing() -> Self {
        Self {
            response: None,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().clone()
    }
}

#[async_trait]
impl InsightGenerator for FakeInsightGenerator {
    async fn generate(&self, prompt: &str) -> Result<String> {
        self.prompts.lock().push(prompt.to_string());
        self.response
            .clone()
            .ok_or_else(|| anyhow!("insight generator unavailable"))
    }
}
