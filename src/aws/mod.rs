//! Minimal AWS plumbing: instance metadata, credential resolution, SigV4
//! request signing and the STS caller-identity call.

mod credentials;
mod imds;
pub mod sigv4;
mod sts;

pub use credentials::{AwsCredentials, CredentialSource, CredentialsProvider, parse_shared_credentials};
pub use imds::{IMDS_ENDPOINT, ImdsClient, detect_ec2};
pub use sts::caller_identity;

use std::sync::Arc;
use thiserror::Error;

use crate::config::AwsSettings;

#[derive(Debug, Error)]
pub enum AwsError {
    #[error("no AWS credentials found ({0})")]
    MissingCredentials(String),
    #[error("IAM role credentials unavailable from instance metadata: {0}")]
    InstanceRole(String),
    #[error("failed to read shared credentials file {path}: {source}")]
    CredentialsFile {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("AWS request failed with status {status}: {body}")]
    Api { status: u16, body: String },
    #[error("unexpected AWS response: {0}")]
    Parse(String),
}

/// Where and how this process talks to AWS, decided once at startup.
pub struct AwsContext {
    pub region: String,
    pub on_ec2: bool,
    pub credentials: Arc<CredentialsProvider>,
}

impl AwsContext {
    pub async fn detect(settings: &AwsSettings) -> Self {
        let imds = ImdsClient::new();
        let on_ec2 = detect_ec2(settings.use_ec2_role, &imds).await;
        let source = CredentialSource::select(on_ec2, settings.profile.as_deref(), &settings.role);

        if on_ec2 {
            tracing::info!("Running on EC2: Using instance IAM role for authentication");
        } else {
            tracing::info!("Local development: credentials from {}", source);
        }
        tracing::info!("AWS region: {}", settings.region);

        Self {
            region: settings.region.clone(),
            on_ec2,
            credentials: Arc::new(CredentialsProvider::new(source, imds)),
        }
    }

    /// Human-readable description of the credential source for diagnostics.
    pub fn environment_label(&self) -> String {
        self.credentials.source().to_string()
    }
}
