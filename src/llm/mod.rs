//! Language-model backends used for article analysis.

mod bedrock;
mod openai;

pub use bedrock::{BedrockAuth, BedrockClient};
pub use openai::OpenAiCompatibleClient;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::aws::AwsContext;

pub const DEFAULT_MODEL: &str = "anthropic.claude-3-haiku-20240307-v1:0";
pub const ANTHROPIC_VERSION: &str = "bedrock-2023-05-31";

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const READ_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("AWS credentials not configured or invalid: {0}")]
    Credentials(String),
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("{provider} returned status {status}: {body}")]
    Api {
        provider: &'static str,
        status: u16,
        body: String,
    },
    #[error("unexpected model response: {0}")]
    Response(String),
    #[error("LLM is not configured: {0}")]
    NotConfigured(String),
}

impl LlmError {
    /// Operator-facing message for a failed connectivity check.
    pub fn connectivity_message(&self) -> String {
        let text = self.to_string().to_lowercase();
        if matches!(self, LlmError::Credentials(_)) || text.contains("credentials") {
            "AWS credentials not configured or invalid".to_string()
        } else if text.contains("expired") {
            "AWS credentials have expired. Please refresh your credentials.".to_string()
        } else if text.contains("region") {
            "AWS region not configured properly".to_string()
        } else if text.contains("access denied")
            || text.contains("accessdenied")
            || matches!(self, LlmError::Api { status: 403, .. })
        {
            "Access denied to AWS Bedrock service".to_string()
        } else {
            format!("LLM connection failed: {self}")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LlmProvider {
    /// Bedrock signed with instance-role or profile credentials.
    #[default]
    BedrockIam,
    /// Bedrock with a bearer API key.
    BedrockApi,
    /// Any OpenAI-compatible chat completions endpoint.
    Custom,
}

impl LlmProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::BedrockIam => "bedrock_iam",
            Self::BedrockApi => "bedrock_api",
            Self::Custom => "custom",
        }
    }

    pub fn is_bedrock(&self) -> bool {
        matches!(self, Self::BedrockIam | Self::BedrockApi)
    }
}

impl FromStr for LlmProvider {
    type Err = LlmError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "bedrock_iam" => Ok(Self::BedrockIam),
            "bedrock_api" => Ok(Self::BedrockApi),
            "custom" => Ok(Self::Custom),
            other => Err(LlmError::NotConfigured(format!("unknown provider '{other}'"))),
        }
    }
}

impl fmt::Display for LlmProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// LLM settings as stored in `system_config`.
#[derive(Debug, Clone, PartialEq)]
pub struct LlmSettings {
    pub provider: LlmProvider,
    pub model: String,
    pub api_key: String,
    pub api_base: String,
}

impl Default for LlmSettings {
    fn default() -> Self {
        Self {
            provider: LlmProvider::BedrockIam,
            model: DEFAULT_MODEL.to_string(),
            api_key: String::new(),
            api_base: String::new(),
        }
    }
}

impl LlmSettings {
    pub fn from_config(values: &HashMap<String, String>) -> Self {
        let defaults = Self::default();
        let provider = match values.get("llm_provider").map(|p| p.parse::<LlmProvider>()) {
            Some(Ok(p)) => p,
            Some(Err(e)) => {
                tracing::warn!("{}; falling back to {}", e, defaults.provider);
                defaults.provider
            }
            None => defaults.provider,
        };
        let model = values
            .get("llm_model")
            .filter(|m| !m.trim().is_empty())
            .cloned()
            .unwrap_or(defaults.model);
        Self {
            provider,
            model,
            api_key: values.get("llm_api_key").cloned().unwrap_or_default(),
            api_base: values.get("llm_api_base").cloned().unwrap_or_default(),
        }
    }
}

#[async_trait]
pub trait LanguageModel: Send + Sync {
    fn model_id(&self) -> &str;

    /// Send one user message and return the reply text.
    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError>;
}

/// Cheap round trip proving the model answers; errors come back as operator messages.
pub async fn check_connectivity(model: &dyn LanguageModel) -> Result<(), String> {
    match model.complete("hi", 5).await {
        Ok(_) => Ok(()),
        Err(e) => {
            tracing::warn!("LLM connectivity check failed: {}", e);
            Err(e.connectivity_message())
        }
    }
}

pub fn http_client() -> Result<reqwest::Client, LlmError> {
    // reqwest picks up HTTP_PROXY / HTTPS_PROXY from the environment.
    Ok(reqwest::Client::builder()
        .connect_timeout(CONNECT_TIMEOUT)
        .timeout(READ_TIMEOUT)
        .build()?)
}

pub fn build_model(settings: &LlmSettings, aws: &AwsContext) -> Result<Arc<dyn LanguageModel>, LlmError> {
    let http = http_client()?;
    let model: Arc<dyn LanguageModel> = match settings.provider {
        LlmProvider::BedrockIam => Arc::new(BedrockClient::new(
            http,
            &aws.region,
            &settings.model,
            BedrockAuth::SigV4(Arc::clone(&aws.credentials)),
        )),
        LlmProvider::BedrockApi => {
            if settings.api_key.trim().is_empty() {
                return Err(LlmError::NotConfigured("bedrock_api requires an API key".into()));
            }
            Arc::new(BedrockClient::new(
                http,
                &aws.region,
                &settings.model,
                BedrockAuth::ApiKey(settings.api_key.trim().to_string()),
            ))
        }
        LlmProvider::Custom => {
            if settings.api_base.trim().is_empty() || settings.model.trim().is_empty() {
                return Err(LlmError::NotConfigured(
                    "custom provider requires an API base URL and model".into(),
                ));
            }
            Arc::new(OpenAiCompatibleClient::new(
                http,
                &settings.api_base,
                &settings.model,
                &settings.api_key,
            ))
        }
    };
    tracing::info!(
        "LLM initialised - provider: {}, model: {}, region: {}",
        settings.provider,
        model.model_id(),
        aws.region
    );
    Ok(model)
}

/// Placeholder used when the configured backend cannot be built; every call
/// fails with the original construction error.
pub struct UnavailableModel {
    model_id: String,
    reason: String,
}

impl UnavailableModel {
    pub fn new(model_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            model_id: model_id.into(),
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl LanguageModel for UnavailableModel {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String, LlmError> {
        Err(LlmError::NotConfigured(self.reason.clone()))
    }
}
