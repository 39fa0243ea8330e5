//! Secret resolution strategies.
//!
//! Secrets are looked up by environment variable name. With [`EnvSecrets`] the
//! variable holds the plaintext; with [`KmsSecrets`] it holds base64 ciphertext
//! that is decrypted through AWS KMS, bound to the deployment's function name
//! as encryption context.

use std::collections::HashMap;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine};
use serde::{Deserialize, Serialize};

use crate::error::{BotError, Result};
use crate::sigv4::{self, AwsCredentials, CanonicalRequest};

#[async_trait]
pub trait SecretResolver: Send + Sync {
    async fn resolve(&self, name: &str) -> Result<String>;
}

/// Plaintext secrets straight from the environment.
#[derive(Debug, Default)]
pub struct EnvSecrets;

#[async_trait]
impl SecretResolver for EnvSecrets {
    async fn resolve(&self, name: &str) -> Result<String> {
        std::env::var(name).map_err(|e| BotError::secret(name, e.to_string()))
    }
}

/// Ciphertext in the environment, decrypted with KMS on every lookup.
pub struct KmsSecrets {
    client: reqwest::Client,
    credentials: AwsCredentials,
    region: String,
    function_name: String,
    endpoint: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "PascalCase")]
struct DecryptRequest<'a> {
    ciphertext_blob: &'a str,
    encryption_context: HashMap<&'a str, &'a str>,
}

#[derive(Deserialize)]
#[serde(rename_all = "PascalCase")]
struct DecryptResponse {
    plaintext: String,
}

impl KmsSecrets {
    pub fn new(
        client: reqwest::Client,
        credentials: AwsCredentials,
        region: &str,
        function_name: &str,
    ) -> Self {
        Self {
            client,
            credentials,
            region: region.to_string(),
            function_name: function_name.to_string(),
            endpoint: None,
        }
    }

    /// Send requests to `endpoint` instead of the regional AWS host.
    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(endpoint.trim_end_matches('/').to_string());
        self
    }

    async fn decrypt(&self, name: &str, ciphertext: &str) -> Result<String> {
        // Validate locally so a malformed variable is reported as such, not as a KMS 400.
        STANDARD
            .decode(ciphertext.trim())
            .map_err(|e| BotError::secret(name, format!("ciphertext is not base64: {e}")))?;

        let body = serde_json::to_vec(&DecryptRequest {
            ciphertext_blob: ciphertext.trim(),
            encryption_context: HashMap::from([(
                "LambdaFunctionName",
                self.function_name.as_str(),
            )]),
        })
        .map_err(|e| BotError::secret(name, e.to_string()))?;

        let (url, host) = match &self.endpoint {
            Some(endpoint) => (format!("{endpoint}/"), sigv4::endpoint_host(endpoint)?),
            None => {
                let host = format!("kms.{}.amazonaws.com", self.region);
                (format!("https://{host}/"), host)
            }
        };
        let hash = sigv4::payload_hash(&body);
        let signed = sigv4::sign(
            &self.credentials,
            &self.region,
            "kms",
            &CanonicalRequest {
                method: "POST",
                host: &host,
                path: "/",
                headers: &[
                    ("content-type", "application/x-amz-json-1.1"),
                    ("x-amz-target", "TrentService.Decrypt"),
                ],
                payload_hash: &hash,
            },
            chrono::Utc::now(),
        );

        let mut request = self
            .client
            .post(&url)
            .header("content-type", "application/x-amz-json-1.1")
            .header("x-amz-target", "TrentService.Decrypt")
            .body(body);
        for (header, value) in signed {
            request = request.header(header, value);
        }

        let response = request
            .send()
            .await
            .map_err(|e| BotError::secret(name, e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BotError::secret(name, format!("KMS returned {status}: {body}")));
        }

        let decrypted: DecryptResponse = response
            .json()
            .await
            .map_err(|e| BotError::secret(name, e.to_string()))?;

        let plaintext = STANDARD
            .decode(decrypted.plaintext)
            .map_err(|e| BotError::secret(name, format!("plaintext is not base64: {e}")))?;

        String::from_utf8(plaintext).map_err(|e| BotError::secret(name, e.to_string()))
    }
}

#[async_trait]
impl SecretResolver for KmsSecrets {
    async fn resolve(&self, name: &str) -> Result<String> {
        let ciphertext =
            std::env::var(name).map_err(|e| BotError::secret(name, e.to_string()))?;
        tracing::debug!(secret = name, "Decrypting secret with KMS");
        self.decrypt(name, &ciphertext).await
    }
}
