use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use super::{AwsCredentials, AwsError};

pub const IMDS_ENDPOINT: &str = "http://169.254.169.254";

const TOKEN_TTL_SECS: &str = "21600";

/// EC2 instance metadata service client (IMDSv2 with v1 fallback).
#[derive(Clone)]
pub struct ImdsClient {
    base: String,
    http: Client,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct RoleCredentials {
    access_key_id: String,
    secret_access_key: String,
    token: Option<String>,
    expiration: Option<String>,
}

impl ImdsClient {
    pub fn new() -> Self {
        Self::with_endpoint(IMDS_ENDPOINT)
    }

    pub fn with_endpoint(base: impl Into<String>) -> Self {
        let http = Client::builder()
            .no_proxy()
            .connect_timeout(Duration::from_secs(1))
            .timeout(Duration::from_secs(1))
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            http,
        }
    }

    async fn token(&self) -> Option<String> {
        let resp = self
            .http
            .put(format!("{}/latest/api/token", self.base))
            .header("X-aws-ec2-metadata-token-ttl-seconds", TOKEN_TTL_SECS)
            .send()
            .await
            .ok()?;
        if !resp.status().is_success() {
            return None;
        }
        resp.text().await.ok()
    }

    async fn get(&self, path: &str, token: Option<&str>) -> Result<String, AwsError> {
        let mut req = self.http.get(format!("{}{}", self.base, path));
        if let Some(t) = token {
            req = req.header("X-aws-ec2-metadata-token", t);
        }
        let resp = req.send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        if !status.is_success() {
            return Err(AwsError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(body)
    }

    pub async fn instance_id(&self) -> Option<String> {
        if let Some(token) = self.token().await {
            if let Ok(id) = self.get("/latest/meta-data/instance-id", Some(&token)).await {
                return Some(id);
            }
        }
        self.get("/latest/meta-data/instance-id", None).await.ok()
    }

    /// Name of the IAM role attached to the instance profile.
    pub async fn role_name(&self) -> Result<String, AwsError> {
        let token = self.token().await;
        let listing = self
            .get("/latest/meta-data/iam/security-credentials/", token.as_deref())
            .await
            .map_err(|e| AwsError::InstanceRole(format!("no IAM role attached ({e})")))?;
        listing
            .lines()
            .map(str::trim)
            .find(|l| !l.is_empty())
            .map(str::to_string)
            .ok_or_else(|| AwsError::InstanceRole("no IAM role attached".into()))
    }

    pub async fn role_credentials(&self) -> Result<AwsCredentials, AwsError> {
        let role = self.role_name().await?;
        let token = self.token().await;
        let body = self
            .get(
                &format!("/latest/meta-data/iam/security-credentials/{role}"),
                token.as_deref(),
            )
            .await
            .map_err(|e| AwsError::InstanceRole(e.to_string()))?;
        let parsed: RoleCredentials =
            serde_json::from_str(&body).map_err(|e| AwsError::Parse(e.to_string()))?;

        let expiration = match parsed.expiration.as_deref() {
            Some(raw) => Some(
                OffsetDateTime::parse(raw, &Rfc3339)
                    .map_err(|e| AwsError::Parse(format!("bad Expiration {raw:?}: {e}")))?,
            ),
            None => None,
        };
        tracing::debug!("Loaded credentials for instance role {}", role);

        Ok(AwsCredentials {
            access_key_id: parsed.access_key_id,
            secret_access_key: parsed.secret_access_key,
            session_token: parsed.token,
            expiration,
        })
    }
}

impl Default for ImdsClient {
    fn default() -> Self {
        Self::new()
    }
}

/// `USE_EC2_ROLE` wins when set; otherwise probe the metadata service.
pub async fn detect_ec2(override_flag: Option<bool>, imds: &ImdsClient) -> bool {
    match override_flag {
        Some(flag) => flag,
        None => imds.instance_id().await.is_some(),
    }
}
