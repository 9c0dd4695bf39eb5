//! Text-completion seam and the OpenAI-compatible client behind it.
//!
//! Services only see `CompletionClient::complete(prompt, max_tokens, temperature)`.
//! The HTTP client calls `chat.completions` with a single user message, which
//! works for OpenAI, Groq and other compatible endpoints.
//!
//! NOTE: We never log the API key, and prompts/responses are logged by size only.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};

use crate::error::CompletionError;

/// One request/response cycle with a text-generation model.
#[async_trait]
pub trait CompletionClient: Send + Sync {
  async fn complete(
    &self,
    prompt: &str,
    max_output_tokens: u32,
    temperature: f32,
  ) -> Result<String, CompletionError>;
}

/// Stand-in used when no API key is configured: every call fails with `NotConfigured`.
pub struct Unconfigured;

#[async_trait]
impl CompletionClient for Unconfigured {
  async fn complete(&self, _prompt: &str, _max: u32, _temperature: f32) -> Result<String, CompletionError> {
    Err(CompletionError::NotConfigured)
  }
}

#[derive(Clone)]
pub struct OpenAI {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

impl OpenAI {
  /// Construct the client if we find OPENAI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("OPENAI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url =
      std::env::var("OPENAI_BASE_URL").unwrap_or_else(|_| "https://api.openai.com/v1".into());
    let model = std::env::var("OPENAI_MODEL").unwrap_or_else(|_| "gpt-4o-mini".into());
    let timeout_secs = std::env::var("OPENAI_TIMEOUT_SECS")
      .ok()
      .and_then(|s| s.parse::<u64>().ok())
      .unwrap_or(60);

    let client = match reqwest::Client::builder()
      .timeout(Duration::from_secs(timeout_secs))
      .build()
    {
      Ok(c) => c,
      Err(e) => {
        error!(target: "smartdoc", error = %e, "Failed to build HTTP client");
        return None;
      }
    };

    Some(Self { client, api_key, base_url: base_url.trim_end_matches('/').to_string(), model })
  }
}

#[async_trait]
impl CompletionClient for OpenAI {
  #[instrument(level = "info", skip(self, prompt), fields(model = %self.model, prompt_len = prompt.len()))]
  async fn complete(
    &self,
    prompt: &str,
    max_output_tokens: u32,
    temperature: f32,
  ) -> Result<String, CompletionError> {
    let url = format!("{}/chat/completions", self.base_url);
    let req = ChatCompletionRequest {
      model: self.model.clone(),
      messages: vec![ChatMessageReq { role: "user".into(), content: prompt.into() }],
      temperature,
      max_tokens: Some(max_output_tokens),
    };

    let start = std::time::Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "smartdoc-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header(AUTHORIZATION, format!("Bearer {}", self.api_key))
      .json(&req).send().await?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      let message = extract_api_error(&body).unwrap_or(body);
      error!(status, elapsed = ?start.elapsed(), "Completion call rejected");
      return Err(CompletionError::Api { status, message });
    }

    let body: ChatCompletionResponse = res.json().await?;
    if let Some(usage) = &body.usage {
      info!(prompt_tokens = ?usage.prompt_tokens, completion_tokens = ?usage.completion_tokens, total_tokens = ?usage.total_tokens, "Completion usage");
    }
    let text = body
      .choices
      .into_iter()
      .next()
      .and_then(|c| c.message.content)
      .ok_or_else(|| CompletionError::Malformed("response carried no choices".into()))?;

    info!(elapsed = ?start.elapsed(), response_len = text.len(), "Completion received");
    Ok(text)
  }
}

// --- Chat DTOs ---

#[derive(Serialize)]
struct ChatCompletionRequest {
  model: String,
  messages: Vec<ChatMessageReq>,
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  max_tokens: Option<u32>,
}
#[derive(Serialize)]
struct ChatMessageReq { role: String, content: String }

#[derive(Deserialize)]
struct ChatCompletionResponse {
  choices: Vec<ChatChoice>,
  #[serde(default)] usage: Option<Usage>,
}
#[derive(Deserialize)]
struct ChatChoice { message: ChatMessageResp }
#[derive(Deserialize)]
struct ChatMessageResp { content: Option<String> }
#[derive(Deserialize)]
struct Usage {
  #[serde(default)] prompt_tokens: Option<u32>,
  #[serde(default)] completion_tokens: Option<u32>,
  #[serde(default)] total_tokens: Option<u32>,
}

/// Try to extract a clean error message from an OpenAI-style error body.
fn extract_api_error(body: &str) -> Option<String> {
  #[derive(Deserialize)]
  struct EWrap { error: EObj }
  #[derive(Deserialize)]
  struct EObj { message: String }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error.message)
}


#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn extracts_api_error_message() {
    let body = r#"{"error":{"message":"Rate limit reached","type":"requests"}}"#;
    assert_eq!(extract_api_error(body).as_deref(), Some("Rate limit reached"));
    assert_eq!(extract_api_error("<html>bad gateway</html>"), None);
  }

  #[test]
  fn request_serializes_max_tokens() {
    let req = ChatCompletionRequest {
      model: "m".into(),
      messages: vec![ChatMessageReq { role: "user".into(), content: "hi".into() }],
      temperature: 0.3,
      max_tokens: Some(350),
    };
    let v = serde_json::to_value(&req).unwrap();
    assert_eq!(v["max_tokens"], 350);
    assert_eq!(v["messages"][0]["role"], "user");
  }

  #[tokio::test]
  async fn unconfigured_client_always_fails() {
    let err = Unconfigured.complete("prompt", 10, 0.0).await.unwrap_err();
    assert!(matches!(err, CompletionError::NotConfigured));
  }
}
