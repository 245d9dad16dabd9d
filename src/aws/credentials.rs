use std::fmt;
use std::path::PathBuf;
use time::{Duration, OffsetDateTime};
use tokio::sync::Mutex;

use super::{AwsError, ImdsClient};
use crate::config::RoleConfig;

/// Refresh role credentials this long before they expire.
const EXPIRY_MARGIN: Duration = Duration::minutes(5);

#[derive(Clone, PartialEq)]
pub struct AwsCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
    pub expiration: Option<OffsetDateTime>,
}

impl AwsCredentials {
    fn is_fresh(&self, now: OffsetDateTime) -> bool {
        match self.expiration {
            Some(exp) => exp - EXPIRY_MARGIN > now,
            None => true,
        }
    }
}

impl fmt::Debug for AwsCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &"<redacted>")
            .field("session_token", &self.session_token.as_ref().map(|_| "<redacted>"))
            .field("expiration", &self.expiration)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    InstanceRole,
    Profile(String),
    DefaultChain,
}

impl CredentialSource {
    /// On EC2 the instance role always wins; locally `AWS_PROFILE`, then the
    /// role file's profile name, then the default chain.
    pub fn select(on_ec2: bool, aws_profile: Option<&str>, role: &RoleConfig) -> Self {
        if on_ec2 {
            return Self::InstanceRole;
        }
        let profile = aws_profile
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .or_else(|| Some(role.iam_role_name.trim()).filter(|p| !p.is_empty()));
        match profile {
            Some(p) => Self::Profile(p.to_string()),
            None => Self::DefaultChain,
        }
    }
}

impl fmt::Display for CredentialSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InstanceRole => write!(f, "EC2 Instance Role"),
            Self::Profile(p) => write!(f, "Profile: {p}"),
            Self::DefaultChain => write!(f, "Default credentials"),
        }
    }
}

pub struct CredentialsProvider {
    source: CredentialSource,
    imds: ImdsClient,
    cached: Mutex<Option<AwsCredentials>>,
}

impl CredentialsProvider {
    pub fn new(source: CredentialSource, imds: ImdsClient) -> Self {
        Self {
            source,
            imds,
            cached: Mutex::new(None),
        }
    }

    /// Fixed credentials, mainly for tests and one-off tools.
    pub fn fixed(credentials: AwsCredentials) -> Self {
        Self {
            source: CredentialSource::DefaultChain,
            imds: ImdsClient::new(),
            cached: Mutex::new(Some(credentials)),
        }
    }

    pub fn source(&self) -> &CredentialSource {
        &self.source
    }

    pub async fn credentials(&self) -> Result<AwsCredentials, AwsError> {
        let mut cached = self.cached.lock().await;
        if let Some(creds) = cached.as_ref() {
            if creds.is_fresh(OffsetDateTime::now_utc()) {
                return Ok(creds.clone());
            }
        }
        let fresh = self.load().await?;
        *cached = Some(fresh.clone());
        Ok(fresh)
    }

    async fn load(&self) -> Result<AwsCredentials, AwsError> {
        match &self.source {
            CredentialSource::InstanceRole => self.imds.role_credentials().await,
            CredentialSource::Profile(name) => load_profile(name).await,
            CredentialSource::DefaultChain => {
                if let Some(creds) = credentials_from_env(|k| std::env::var(k).ok()) {
                    return Ok(creds);
                }
                load_profile("default").await
            }
        }
    }
}

pub(crate) fn credentials_from_env(lookup: impl Fn(&str) -> Option<String>) -> Option<AwsCredentials> {
    let key = lookup("AWS_ACCESS_KEY_ID").filter(|v| !v.is_empty())?;
    let secret = lookup("AWS_SECRET_ACCESS_KEY").filter(|v| !v.is_empty())?;
    Some(AwsCredentials {
        access_key_id: key,
        secret_access_key: secret,
        session_token: lookup("AWS_SESSION_TOKEN").filter(|v| !v.is_empty()),
        expiration: None,
    })
}

async fn load_profile(profile: &str) -> Result<AwsCredentials, AwsError> {
    let path = shared_credentials_path().ok_or_else(|| {
        AwsError::MissingCredentials("cannot locate ~/.aws/credentials".into())
    })?;
    let text = tokio::fs::read_to_string(&path)
        .await
        .map_err(|source| AwsError::CredentialsFile {
            path: path.display().to_string(),
            source,
        })?;
    parse_shared_credentials(&text, profile).ok_or_else(|| {
        AwsError::MissingCredentials(format!(
            "profile '{}' has no access keys in {}",
            profile,
            path.display()
        ))
    })
}

fn shared_credentials_path() -> Option<PathBuf> {
    if let Ok(p) = std::env::var("AWS_SHARED_CREDENTIALS_FILE") {
        return Some(PathBuf::from(p));
    }
    std::env::var("HOME").ok().map(|home| {
        let mut p = PathBuf::from(home);
        p.push(".aws");
        p.push("credentials");
        p
    })
}

/// Read one profile from an INI-style shared credentials file.
pub fn parse_shared_credentials(text: &str, profile: &str) -> Option<AwsCredentials> {
    let mut in_profile = false;
    let mut key = None;
    let mut secret = None;
    let mut token = None;

    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') || line.starts_with(';') {
            continue;
        }
        if let Some(section) = line.strip_prefix('[').and_then(|l| l.strip_suffix(']')) {
            let section = section.trim();
            let name = section.strip_prefix("profile ").unwrap_or(section).trim();
            in_profile = name == profile;
            continue;
        }
        if !in_profile {
            continue;
        }
        if let Some((k, v)) = line.split_once('=') {
            let value = v.trim().to_string();
            match k.trim() {
                "aws_access_key_id" => key = Some(value),
                "aws_secret_access_key" => secret = Some(value),
                "aws_session_token" => token = Some(value),
                _ => {}
            }
        }
    }

    Some(AwsCredentials {
        access_key_id: key?,
        secret_access_key: secret?,
        session_token: token,
        expiration: None,
    })
}
