use async_trait::async_trait;
use reqwest::Client;
use serde_json::{Value, json};

use super::{LanguageModel, LlmError};

/// OpenAI-style `chat/completions` endpoint (OpenAI, Ollama, vLLM, LiteLLM...).
pub struct OpenAiCompatibleClient {
    http: Client,
    api_base: String,
    model: String,
    api_key: String,
}

impl OpenAiCompatibleClient {
    pub fn new(http: Client, api_base: &str, model: &str, api_key: &str) -> Self {
        Self {
            http,
            api_base: api_base.trim().trim_end_matches('/').to_string(),
            model: model.trim().to_string(),
            api_key: api_key.trim().to_string(),
        }
    }
}

#[async_trait]
impl LanguageModel for OpenAiCompatibleClient {
    fn model_id(&self) -> &str {
        &self.model
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        let body = json!({
            "model": self.model,
            "messages": [{"role": "user", "content": prompt}],
            "max_tokens": max_tokens,
        });
        let mut req = self
            .http
            .post(format!("{}/chat/completions", self.api_base))
            .json(&body);
        if !self.api_key.is_empty() {
            req = req.bearer_auth(&self.api_key);
        }

        let resp = req.send().await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(LlmError::Api {
                provider: "custom",
                status: status.as_u16(),
                body: text,
            });
        }
        let json: Value = resp
            .json()
            .await
            .map_err(|e| LlmError::Response(e.to_string()))?;
        json.pointer("/choices/0/message/content")
            .and_then(Value::as_str)
            .map(str::to_string)
            .ok_or_else(|| LlmError::Response("missing choices[0].message.content".into()))
    }
}
