use crate::error::{InvestigatorError, Result};
use tracing::{debug, warn};

/// API key that switches the client into offline mode.
pub const DUMMY_API_KEY: &str = "dummy-api-key";

/// Minimal OpenAI-compatible chat completions client.
#[derive(Debug, Clone)]
pub struct LlmClient {
    api_key: String,
    base_url: String,
    model: String,
}

impl LlmClient {
    pub fn new(api_key: String, model: String, base_url: String) -> Self {
        Self {
            api_key,
            base_url,
            model,
        }
    }

    /// True when no real API key is configured. Callers fall back to
    /// deterministic behaviour instead of calling out.
    pub fn is_dummy(&self) -> bool {
        self.api_key.is_empty() || self.api_key == DUMMY_API_KEY
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    /// Send one system + user exchange and return the raw message content.
    pub async fn call_llm(&self, system: &str, prompt: &str) -> Result<String> {
        if self.is_dummy() {
            return Err(InvestigatorError::Llm(
                "no API key configured (dummy mode)".to_string(),
            ));
        }

        let client = reqwest::Client::new();
        let mut body = serde_json::json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": prompt}
            ],
            "temperature": 0.1,
        });

        // Reasoning models spend tokens before answering.
        if self.model.starts_with("gpt-5") || self.model.contains("o1") {
            body["max_completion_tokens"] = serde_json::json!(4000);
        } else {
            body["max_tokens"] = serde_json::json!(1500);
        }

        debug!("Calling {} at {}", self.model, self.base_url);
        let response = client
            .post(format!("{}/chat/completions", self.base_url.trim_end_matches('/')))
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| InvestigatorError::Llm(format!("LLM API call failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            return Err(InvestigatorError::Llm(format!(
                "LLM API error ({}): {}",
                status, error_text
            )));
        }

        let response_json: serde_json::Value = response
            .json()
            .await
            .map_err(|e| InvestigatorError::Llm(format!("Failed to parse LLM response: {}", e)))?;

        if let Some(error) = response_json.get("error") {
            return Err(InvestigatorError::Llm(format!("LLM API error: {}", error)));
        }

        let choice = response_json
            .get("choices")
            .and_then(|c| c.as_array())
            .and_then(|c| c.first())
            .ok_or_else(|| InvestigatorError::Llm("No choices in LLM response".to_string()))?;

        match choice.get("finish_reason").and_then(|r| r.as_str()) {
            Some("length") => warn!("LLM response was truncated due to length limit"),
            Some("content_filter") => {
                return Err(InvestigatorError::Llm(
                    "LLM response was filtered by content policy".to_string(),
                ))
            }
            _ => {}
        }

        let content = choice["message"]["content"].as_str().unwrap_or_default();
        if content.trim().is_empty() {
            return Err(InvestigatorError::Llm("Empty content in LLM response".to_string()));
        }
        Ok(content.to_string())
    }
}

/// Strip markdown code fences the model sometimes wraps JSON in.
pub fn clean_json_response(response: &str) -> &str {
    let trimmed = response.trim();
    let without_open = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
        .unwrap_or(trimmed);
    without_open
        .trim()
        .strip_suffix("```")
        .unwrap_or(without_open.trim())
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_json_response() {
        assert_eq!(clean_json_response("```json\n{\"a\":1}\n```"), "{\"a\":1}");
        assert_eq!(clean_json_response("```\n[1]\n```\n"), "[1]");
        assert_eq!(clean_json_response("  {\"a\":1} "), "{\"a\":1}");
    }

    #[tokio::test]
    async fn test_dummy_key_never_calls_out() {
        let client = LlmClient::new(
            DUMMY_API_KEY.to_string(),
            "gpt-4".to_string(),
            "http://127.0.0.1:1".to_string(),
        );
        assert!(client.is_dummy());
        assert!(matches!(
            client.call_llm("sys", "hi").await,
            Err(InvestigatorError::Llm(_))
        ));
    }
}
