use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde_json::{Value, json};
use std::sync::Arc;
use time::OffsetDateTime;

use super::{ANTHROPIC_VERSION, LanguageModel, LlmError};
use crate::aws::CredentialsProvider;
use crate::aws::sigv4::{self, SignableRequest};

const MAX_ATTEMPTS: u32 = 2;

pub enum BedrockAuth {
    SigV4(Arc<CredentialsProvider>),
    ApiKey(String),
}

/// Bedrock runtime `InvokeModel` for Anthropic messages models.
pub struct BedrockClient {
    http: Client,
    region: String,
    model_id: String,
    endpoint: String,
    host: String,
    auth: BedrockAuth,
}

impl BedrockClient {
    pub fn new(http: Client, region: &str, model_id: &str, auth: BedrockAuth) -> Self {
        let endpoint = format!("https://bedrock-runtime.{region}.amazonaws.com");
        Self::with_endpoint(http, region, model_id, auth, &endpoint)
    }

    pub fn with_endpoint(
        http: Client,
        region: &str,
        model_id: &str,
        auth: BedrockAuth,
        endpoint: &str,
    ) -> Self {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        let host = url::Url::parse(&endpoint)
            .ok()
            .and_then(|u| {
                u.host_str().map(|h| match u.port() {
                    Some(p) => format!("{h}:{p}"),
                    None => h.to_string(),
                })
            })
            .unwrap_or_default();
        Self {
            http,
            region: region.to_string(),
            model_id: model_id.to_string(),
            endpoint,
            host,
            auth,
        }
    }

    /// Raw `InvokeModel` call; returns the decoded response body.
    pub async fn invoke(&self, body: &Value) -> Result<Value, LlmError> {
        let path = format!("/model/{}/invoke", sigv4::encode_segment(&self.model_id));
        let url = format!("{}{}", self.endpoint, path);
        let payload = serde_json::to_vec(body).map_err(|e| LlmError::Response(e.to_string()))?;

        let mut attempt = 1;
        loop {
            let mut req = self
                .http
                .post(&url)
                .header("content-type", "application/json")
                .header("accept", "application/json")
                .body(payload.clone());

            match &self.auth {
                BedrockAuth::ApiKey(key) => {
                    req = req.bearer_auth(key);
                }
                BedrockAuth::SigV4(provider) => {
                    let creds = provider
                        .credentials()
                        .await
                        .map_err(|e| LlmError::Credentials(e.to_string()))?;
                    let signature = sigv4::sign(
                        &SignableRequest {
                            method: "POST",
                            host: &self.host,
                            path: &path,
                            query: "",
                            headers: &[
                                ("accept", "application/json"),
                                ("content-type", "application/json"),
                            ],
                            payload: &payload,
                        },
                        &creds,
                        &self.region,
                        "bedrock",
                        OffsetDateTime::now_utc(),
                    );
                    req = req
                        .header("x-amz-date", &signature.amz_date)
                        .header("authorization", &signature.authorization);
                    if let Some(token) = &creds.session_token {
                        req = req.header("x-amz-security-token", token);
                    }
                }
            }

            match req.send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if is_retryable(status) && attempt < MAX_ATTEMPTS {
                        tracing::warn!("Bedrock returned {}, retrying", status);
                        attempt += 1;
                        continue;
                    }
                    let text = resp.text().await?;
                    if !status.is_success() {
                        return Err(LlmError::Api {
                            provider: "bedrock",
                            status: status.as_u16(),
                            body: text,
                        });
                    }
                    return serde_json::from_str(&text).map_err(|e| LlmError::Response(e.to_string()));
                }
                Err(e) if (e.is_timeout() || e.is_connect()) && attempt < MAX_ATTEMPTS => {
                    tracing::warn!("Bedrock request failed ({}), retrying", e);
                    attempt += 1;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

fn is_retryable(status: StatusCode) -> bool {
    status == StatusCode::TOO_MANY_REQUESTS || status.is_server_error()
}

/// First text block of an Anthropic messages reply.
pub(crate) fn reply_text(body: &Value) -> Result<String, LlmError> {
    body.pointer("/content/0/text")
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| LlmError::Response(format!("no content[0].text in {body}")))
}

#[async_trait]
impl LanguageModel for BedrockClient {
    fn model_id(&self) -> &str {
        &self.model_id
    }

    async fn complete(&self, prompt: &str, max_tokens: u32) -> Result<String, LlmError> {
        let body = json!({
            "max_tokens": max_tokens,
            "anthropic_version": ANTHROPIC_VERSION,
            "messages": [{"role": "user", "content": prompt}],
        });
        let reply = self.invoke(&body).await?;
        reply_text(&reply)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aws::AwsCredentials;
    use axum::{
        Json, Router,
        extract::{Path, State},
        http::{HeaderMap, StatusCode as AxumStatus},
        routing::post,
    };
    use std::sync::Mutex;

    #[derive(Clone, Default)]
    struct Seen {
        calls: Arc<Mutex<Vec<(String, HeaderMap, Value)>>>,
        fail_first: Arc<Mutex<bool>>,
    }

    async fn invoke_handler(
        State(seen): State<Seen>,
        Path(model): Path<String>,
        headers: HeaderMap,
        Json(body): Json<Value>,
    ) -> (AxumStatus, Json<Value>) {
        seen.calls.lock().unwrap().push((model, headers, body));
        let mut fail = seen.fail_first.lock().unwrap();
        if *fail {
            *fail = false;
            return (AxumStatus::SERVICE_UNAVAILABLE, Json(json!({"message": "busy"})));
        }
        (
            AxumStatus::OK,
            Json(json!({"content": [{"type": "text", "text": "Connection successful"}]})),
        )
    }

    async fn mock_bedrock(seen: Seen) -> String {
        let app = Router::new()
            .route("/model/:model/invoke", post(invoke_handler))
            .with_state(seen);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move { axum::serve(listener, app).await.unwrap() });
        format!("http://{addr}")
    }

    #[tokio::test]
    async fn api_key_auth_sends_bearer_and_anthropic_body() {
        let seen = Seen::default();
        let endpoint = mock_bedrock(seen.clone()).await;
        let client = BedrockClient::with_endpoint(
            Client::new(),
            "us-east-1",
            "anthropic.claude-3-haiku-20240307-v1:0",
            BedrockAuth::ApiKey("br-key".into()),
            &endpoint,
        );

        let text = client.complete("Say hi", 100).await.unwrap();
        assert_eq!(text, "Connection successful");

        let calls = seen.calls.lock().unwrap();
        let (model, headers, body) = &calls[0];
        assert_eq!(model, "anthropic.claude-3-haiku-20240307-v1:0");
        assert_eq!(headers["authorization"], "Bearer br-key");
        assert_eq!(body["anthropic_version"], ANTHROPIC_VERSION);
        assert_eq!(body["max_tokens"], 100);
        assert_eq!(body["messages"][0]["content"], "Say hi");
    }

    #[tokio::test]
    async fn sigv4_auth_signs_and_retries_once_on_5xx() {
        let seen = Seen::default();
        *seen.fail_first.lock().unwrap() = true;
        let endpoint = mock_bedrock(seen.clone()).await;
        let creds = AwsCredentials {
            access_key_id: "AKIDEXAMPLE".into(),
            secret_access_key: "secret".into(),
            session_token: Some("session".into()),
            expiration: None,
        };
        let client = BedrockClient::with_endpoint(
            Client::new(),
            "us-west-2",
            "m1",
            BedrockAuth::SigV4(Arc::new(CredentialsProvider::fixed(creds))),
            &endpoint,
        );

        assert_eq!(client.complete("x", 5).await.unwrap(), "Connection successful");

        let calls = seen.calls.lock().unwrap();
        assert_eq!(calls.len(), 2);
        let auth = calls[1].1["authorization"].to_str().unwrap();
        assert!(auth.starts_with("AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/"));
        assert!(auth.contains("/us-west-2/bedrock/aws4_request"));
        assert_eq!(calls[1].1["x-amz-security-token"], "session");
    }

    #[test]
    fn reply_text_requires_content_block() {
        assert!(reply_text(&json!({"content": []})).is_err());
        assert_eq!(
            reply_text(&json!({"content": [{"text": "ok"}]})).unwrap(),
            "ok"
        );
    }
}
