use std::env;
use std::time::Duration;

use anyhow::{bail, Context, Result};

use crate::api::DEFAULT_ENDPOINT;

pub const SF_511_API_KEY: &str = "SF_511_API_KEY";
pub const MASTODON_CLIENT_SECRET: &str = "MASTODON_CLIENT_SECRET";
pub const MASTODON_PASSWORD: &str = "MASTODON_PASSWORD";

/// How secret environment variables are interpreted
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SecretsMode {
    /// Variables hold plaintext
    Env,
    /// Variables hold KMS ciphertext bound to this function name
    Kms { function_name: String },
}

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub vehicle_id: String,
    pub agency: String,
    pub monitoring_endpoint: String,
    pub map_bucket: String,
    pub aws_region: String,
    /// Path-style S3 endpoint instead of AWS (MinIO, localstack)
    pub s3_endpoint: Option<String>,
    pub kms_endpoint: Option<String>,

    pub mastodon_server: String,
    pub mastodon_client_id: String,
    pub mastodon_email: String,

    pub secrets_mode: SecretsMode,
    pub poll_interval: Option<Duration>,
    pub http_timeout: Duration,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build the configuration from any key/value source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let env_or =
            |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());
        let required = |key: &str| {
            lookup(key).with_context(|| format!("{key} environment variable is required"))
        };

        let secrets_mode = match env_or("SECRETS_MODE", "env").as_str() {
            "env" => SecretsMode::Env,
            "kms" => SecretsMode::Kms {
                function_name: required("AWS_LAMBDA_FUNCTION_NAME")?,
            },
            other => bail!("SECRETS_MODE must be \"env\" or \"kms\", got {other:?}"),
        };

        let poll_interval = match lookup("POLL_INTERVAL_SECS") {
            Some(secs) => Some(positive_secs("POLL_INTERVAL_SECS", &secs)?),
            None => None,
        };
        let http_timeout = positive_secs("HTTP_TIMEOUT_SECS", &env_or("HTTP_TIMEOUT_SECS", "10"))?;

        Ok(Self {
            vehicle_id: env_or("VEHICLE_ID", "8628"),
            agency: env_or("AGENCY", "SF"),
            monitoring_endpoint: env_or("VEHICLE_MONITORING_ENDPOINT", DEFAULT_ENDPOINT),
            map_bucket: env_or("MAP_BUCKET", "redfrontbusmaps"),
            aws_region: env_or("AWS_REGION", "us-west-1"),
            s3_endpoint: lookup("S3_ENDPOINT"),
            kms_endpoint: lookup("KMS_ENDPOINT"),
            mastodon_server: required("MASTODON_SERVER")?,
            mastodon_client_id: required("MASTODON_CLIENT_ID")?,
            mastodon_email: required("MASTODON_EMAIL")?,
            secrets_mode,
            poll_interval,
            http_timeout,
        })
    }
}

/// Whole seconds, at least one.
fn positive_secs(key: &str, value: &str) -> Result<Duration> {
    let secs: u64 = value
        .trim()
        .parse()
        .with_context(|| format!("{key} must be a number"))?;
    if secs == 0 {
        bail!("{key} must be greater than zero");
    }
    Ok(Duration::from_secs(secs))
}
