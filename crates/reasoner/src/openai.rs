//! OpenAI-compatible chat-completions reasoner.

use async_trait::async_trait;
use serde_json::json;
use tracing::debug;

use vantage_core::config::ReasonerConfig;

use crate::provider::{Reasoner, ReasonerError};

/// System prompt instructing the model to answer with a decision document.
const SYSTEM_PROMPT: &str = "You are an autonomous business intelligence agent. \
Given an event briefing, decide what to do. Respond ONLY with a JSON object with \
fields: action_type (string), parameters (object), reasoning (string), \
confidence_score (number in [0,1]), expected_impact (string), \
urgency_level (one of immediate|high|normal|low).";

pub struct OpenAiReasoner {
    client: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
    temperature: f32,
    max_tokens: u32,
}

impl OpenAiReasoner {
    /// Build from config. Fails when no API key is configured.
    pub fn from_config(config: &ReasonerConfig) -> Result<Self, ReasonerError> {
        let api_key = config
            .api_key
            .clone()
            .ok_or_else(|| ReasonerError::NotConfigured("VANTAGE_REASONER_API_KEY".into()))?;
        Ok(Self {
            client: reqwest::Client::new(),
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
        })
    }
}

#[async_trait]
impl Reasoner for OpenAiReasoner {
    async fn invoke(&self, prompt: &str) -> Result<String, ReasonerError> {
        let url = format!("{}/v1/chat/completions", self.base_url);

        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt},
            ],
            "temperature": self.temperature,
            "max_tokens": self.max_tokens,
        });

        debug!("reasoner request to {}", url);

        // No request timeout; shutdown cancels the future.
        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(ReasonerError::ApiError { status, body });
        }

        let resp: serde_json::Value = response.json().await?;
        let content = resp["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| ReasonerError::ParseError("missing choices[0].message.content".into()))?
            .to_string();

        Ok(content)
    }
}
