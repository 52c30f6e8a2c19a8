// laneforge — HTTP-based LLM provider (OpenAI-compatible)

use super::*;
use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;

/// HTTPProvider speaks the OpenAI-compatible chat completions API.
///
/// One request per call: a failed request is reported, never retried.
pub struct HTTPProvider {
    api_key: String,
    api_base: String,
    client: Client,
    model: String,
}

impl HTTPProvider {
    pub fn new(
        api_key: String,
        api_base: String,
        model: String,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(30))
            .build()?;

        let base = if api_base.is_empty() {
            default_api_base(&api_key).to_string()
        } else {
            api_base
        };

        Ok(Self {
            api_key,
            api_base: base,
            client,
            model,
        })
    }

    pub fn api_base(&self) -> &str {
        &self.api_base
    }
}

/// Default API base by key prefix.
fn default_api_base(api_key: &str) -> &'static str {
    if api_key.starts_with("sk-or-") {
        "https://openrouter.ai/api/v1"
    } else if api_key.starts_with("gsk_") {
        "https://api.groq.com/openai/v1"
    } else {
        "https://api.openai.com/v1"
    }
}

#[async_trait]
impl LLMProvider for HTTPProvider {
    async fn chat(
        &self,
        messages: &[Message],
        model: &str,
        options: &HashMap<String, serde_json::Value>,
    ) -> anyhow::Result<LLMResponse> {
        let use_model = if model.is_empty() { &self.model } else { model };
        let url = format!("{}/chat/completions", self.api_base.trim_end_matches('/'));

        let mut body = json!({
            "model": use_model,
            "messages": messages,
        });

        if let Some(obj) = body.as_object_mut() {
            for (k, v) in options {
                obj.insert(k.clone(), v.clone());
            }
        }

        tracing::debug!(url = %url, model = %use_model, "Sending LLM request");

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let response_body = response
                .text()
                .await
                .unwrap_or_else(|_| "could not read body".to_string());
            anyhow::bail!("LLM API error ({}): {}", status, response_body);
        }

        let response_body = response.text().await?;
        tracing::debug!(status = %status, body_len = response_body.len(), "LLM response received");
        parse_response(&response_body)
    }

    fn default_model(&self) -> &str {
        &self.model
    }
}

/// Parse an OpenAI-compatible chat completion response.
fn parse_response(body: &str) -> anyhow::Result<LLMResponse> {
    let v: serde_json::Value = serde_json::from_str(body)?;

    if let Some(err) = v.get("error") {
        let msg = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown error");
        anyhow::bail!("LLM API error: {}", msg);
    }

    let choice = v
        .get("choices")
        .and_then(|c| c.as_array())
        .and_then(|c| c.first())
        .ok_or_else(|| anyhow::anyhow!("No choices in LLM response"))?;

    let message = choice
        .get("message")
        .ok_or_else(|| anyhow::anyhow!("No message in choice"))?;

    // A null content is treated as an empty completion; the extractor
    // reports that as malformed JSON.
    let content = message
        .get("content")
        .and_then(|c| c.as_str())
        .unwrap_or("")
        .to_string();

    let finish_reason = choice
        .get("finish_reason")
        .and_then(|f| f.as_str())
        .unwrap_or("stop")
        .to_string();

    let usage = v.get("usage").map(|u| UsageInfo {
        prompt_tokens: u.get("prompt_tokens").and_then(|n| n.as_u64()).unwrap_or(0) as usize,
        completion_tokens: u
            .get("completion_tokens")
            .and_then(|n| n.as_u64())
            .unwrap_or(0) as usize,
        total_tokens: u.get("total_tokens").and_then(|n| n.as_u64()).unwrap_or(0) as usize,
    });

    Ok(LLMResponse {
        content,
        finish_reason,
        usage,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_simple_response() {
        let json = r#"{
            "choices": [{
                "message": {"role": "assistant", "content": "{\"actors\": []}"},
                "finish_reason": "stop"
            }],
            "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
        }"#;

        let resp = parse_response(json).unwrap();
        assert_eq!(resp.content, r#"{"actors": []}"#);
        assert_eq!(resp.finish_reason, "stop");
        assert_eq!(resp.usage.unwrap().total_tokens, 15);
    }

    #[test]
    fn test_parse_null_content() {
        let json = r#"{"choices": [{"message": {"role": "assistant", "content": null}}]}"#;
        let resp = parse_response(json).unwrap();
        assert!(resp.content.is_empty());
        assert_eq!(resp.finish_reason, "stop");
        assert!(resp.usage.is_none());
    }

    #[test]
    fn test_parse_error_response() {
        let json = r#"{"error": {"message": "Invalid API key", "type": "auth_error"}}"#;
        let result = parse_response(json);
        assert!(result.is_err());
        assert!(result.unwrap_err().to_string().contains("Invalid API key"));
    }

    #[test]
    fn test_parse_no_choices() {
        let err = parse_response(r#"{"choices": []}"#).unwrap_err();
        assert!(err.to_string().contains("No choices"));
    }

    #[test]
    fn test_default_api_base_by_key_prefix() {
        assert_eq!(default_api_base("sk-or-abc"), "https://openrouter.ai/api/v1");
        assert_eq!(default_api_base("gsk_abc"), "https://api.groq.com/openai/v1");
        assert_eq!(default_api_base("sk-abc"), "https://api.openai.com/v1");
    }
}
