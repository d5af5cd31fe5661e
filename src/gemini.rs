//! Gemini client for the [`GenerativeModel`] trait.
//!
//! Calls `POST {api_base}/models/{model}:generateContent` with a single
//! user turn. Requires the `GEMINI_API_KEY` environment variable.

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::time::Duration;

use crate::answer::GenerativeModel;
use crate::config::AnswerConfig;

pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    api_base: String,
}

impl GeminiClient {
    pub fn new(config: &AnswerConfig, api_key: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            http,
            api_key,
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }

    pub fn from_env(config: &AnswerConfig) -> Result<Self> {
        let api_key = std::env::var("GEMINI_API_KEY")
            .map_err(|_| anyhow::anyhow!("GEMINI_API_KEY environment variable not set"))?;
        Self::new(config, api_key)
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    fn provider(&self) -> &str {
        "gemini"
    }

    async fn generate(&self, prompt: &str, model: &str) -> Result<String> {
        let url = format!("{}/models/{}:generateContent", self.api_base, model);
        let body = json!({
            "contents": [
                { "role": "user", "parts": [{ "text": prompt }] }
            ]
        });

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .context("Gemini request failed")?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            bail!("Gemini API error {}: {}", status, body_text);
        }

        let json: Value = response.json().await?;
        parse_generate_response(&json)
    }
}

/// Concatenate the text parts of the first candidate.
fn parse_generate_response(json: &Value) -> Result<String> {
    let parts = json
        .get("candidates")
        .and_then(Value::as_array)
        .and_then(|c| c.first())
        .and_then(|c| c.get("content"))
        .and_then(|c| c.get("parts"))
        .and_then(Value::as_array);

    let Some(parts) = parts else {
        let reason = json
            .get("promptFeedback")
            .and_then(|f| f.get("blockReason"))
            .and_then(Value::as_str)
            .unwrap_or("no candidates returned");
        bail!("Invalid Gemini response: {}", reason);
    };

    Ok(parts
        .iter()
        .filter_map(|p| p.get("text").and_then(Value::as_str))
        .collect::<Vec<_>>()
        .join(""))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_joins_text_parts() {
        let json = json!({
            "candidates": [{
                "content": {
                    "role": "model",
                    "parts": [{ "text": "People recommend " }, { "text": "Bell Street Burritos [1]." }]
                },
                "finishReason": "STOP"
            }]
        });
        assert_eq!(
            parse_generate_response(&json).unwrap(),
            "People recommend Bell Street Burritos [1]."
        );
    }

    #[test]
    fn test_parse_blocked_prompt() {
        let json = json!({ "promptFeedback": { "blockReason": "SAFETY" } });
        let err = parse_generate_response(&json).unwrap_err();
        assert!(err.to_string().contains("SAFETY"));
    }

    #[test]
    fn test_parse_empty_candidates() {
        let err = parse_generate_response(&json!({ "candidates": [] })).unwrap_err();
        assert!(err.to_string().contains("no candidates"));
    }
}
