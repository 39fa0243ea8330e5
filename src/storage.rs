//! Map images live in an S3 bucket, one `<line_ref>.png` per route.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::StatusCode;

use crate::error::{BotError, Result};
use crate::sigv4::{self, AwsCredentials, CanonicalRequest};

#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn download_object(&self, bucket: &str, key: &str) -> Result<Bytes>;
}

/// Object key of the map image for a route.
pub fn map_key(line_ref: &str) -> String {
    format!("{line_ref}.png")
}

/// S3 client using SigV4 header auth.
///
/// Talks to AWS with virtual-hosted-style URLs, or to an explicit endpoint
/// (MinIO, localstack) with path-style URLs.
pub struct S3Store {
    client: reqwest::Client,
    credentials: AwsCredentials,
    region: String,
    endpoint: Option<String>,
}

/// Where a GET for one object goes: full URL plus the signed host and path.
struct Target {
    url: String,
    host: String,
    path: String,
}

impl S3Store {
    pub fn new(client: reqwest::Client, credentials: AwsCredentials, region: &str) -> Self {
        Self {
            client,
            credentials,
            region: region.to_string(),
            endpoint: None,
        }
    }

    pub fn with_endpoint(mut self, endpoint: &str) -> Self {
        self.endpoint = Some(endpoint.trim_end_matches('/').to_string());
        self
    }

    fn target(&self, bucket: &str, key: &str) -> Result<Target> {
        let key_path = key
            .split('/')
            .map(sigv4::encode_segment)
            .collect::<Vec<_>>()
            .join("/");

        match &self.endpoint {
            None => {
                let host = format!("{}.s3.{}.amazonaws.com", bucket, self.region);
                let path = format!("/{key_path}");
                Ok(Target {
                    url: format!("https://{host}{path}"),
                    host,
                    path,
                })
            }
            Some(endpoint) => {
                let path = format!("/{}/{key_path}", sigv4::encode_segment(bucket));
                Ok(Target {
                    url: format!("{endpoint}{path}"),
                    host: sigv4::endpoint_host(endpoint)?,
                    path,
                })
            }
        }
    }
}

/// Classify a failed GET. S3 answers 404 `NoSuchKey` for a missing key when
/// the caller may list the bucket, and 403 `AccessDenied` when it may not;
/// only the former is distinguishable from a genuine permission problem.
fn object_error(status: StatusCode, body: String, bucket: &str, key: &str) -> BotError {
    if status == StatusCode::NOT_FOUND || body.contains("<Code>NoSuchKey</Code>") {
        return BotError::AssetNotFound {
            bucket: bucket.to_string(),
            key: key.to_string(),
        };
    }
    BotError::Storage {
        status: status.as_u16(),
        message: body,
    }
}

#[async_trait]
impl ObjectStore for S3Store {
    async fn download_object(&self, bucket: &str, key: &str) -> Result<Bytes> {
        let target = self.target(bucket, key)?;

        tracing::debug!(bucket, key, "Downloading object");

        let signed = sigv4::sign(
            &self.credentials,
            &self.region,
            "s3",
            &CanonicalRequest {
                method: "GET",
                host: &target.host,
                path: &target.path,
                headers: &[("x-amz-content-sha256", "UNSIGNED-PAYLOAD")],
                payload_hash: "UNSIGNED-PAYLOAD",
            },
            chrono::Utc::now(),
        );

        let mut request = self
            .client
            .get(&target.url)
            .header("x-amz-content-sha256", "UNSIGNED-PAYLOAD");
        for (header, value) in signed {
            request = request.header(header, value);
        }

        let response = request.send().await.map_err(|e| BotError::Storage {
            status: 0,
            message: e.to_string(),
        })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(object_error(status, body, bucket, key));
        }

        let bytes = response.bytes().await.map_err(|e| BotError::Storage {
            status: status.as_u16(),
            message: e.to_string(),
        })?;

        tracing::debug!(bytes = bytes.len(), "Downloaded object");
        Ok(bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub_server;

    fn store(client: reqwest::Client) -> S3Store {
        S3Store::new(
            client,
            AwsCredentials {
                access_key_id: "AKIDEXAMPLE".into(),
                secret_access_key: "secret".into(),
                session_token: None,
            },
            "us-west-1",
        )
    }

    #[test]
    fn map_key_per_route() {
        assert_eq!(map_key("19"), "19.png");
        assert_eq!(map_key("5R"), "5R.png");
    }

    #[test]
    fn virtual_hosted_bucket() {
        let target = store(reqwest::Client::new())
            .target("redfrontbusmaps", "19.png")
            .unwrap();
        assert_eq!(target.host, "redfrontbusmaps.s3.us-west-1.amazonaws.com");
        assert_eq!(target.path, "/19.png");
        assert_eq!(
            target.url,
            "https://redfrontbusmaps.s3.us-west-1.amazonaws.com/19.png"
        );
    }

    #[test]
    fn path_style_endpoint() {
        let target = store(reqwest::Client::new())
            .with_endpoint("http://localhost:9000/")
            .target("redfrontbusmaps", "19.png")
            .unwrap();
        assert_eq!(target.host, "localhost:9000");
        assert_eq!(target.path, "/redfrontbusmaps/19.png");
        assert_eq!(target.url, "http://localhost:9000/redfrontbusmaps/19.png");
    }

    #[test]
    fn failed_get_classification() {
        let err = object_error(StatusCode::NOT_FOUND, String::new(), "maps", "19.png");
        assert!(matches!(err, BotError::AssetNotFound { ref key, .. } if key == "19.png"));

        let body = "<Error><Code>NoSuchKey</Code></Error>".to_string();
        let err = object_error(StatusCode::FORBIDDEN, body, "maps", "19.png");
        assert!(matches!(err, BotError::AssetNotFound { .. }));

        let body = "<Error><Code>AccessDenied</Code></Error>".to_string();
        let err = object_error(StatusCode::FORBIDDEN, body, "maps", "19.png");
        assert!(matches!(err, BotError::Storage { status: 403, .. }));
    }

    #[tokio::test]
    async fn downloads_signed_object() {
        let (base_url, requests) = stub_server::serve(vec![(200, "PNGDATA")]).await;

        let bytes = store(stub_server::client())
            .with_endpoint(&base_url)
            .download_object("redfrontbusmaps", "19.png")
            .await
            .unwrap();

        assert_eq!(&bytes[..], b"PNGDATA");
        let requests = requests.await.unwrap();
        assert!(requests[0].starts_with("GET /redfrontbusmaps/19.png HTTP/1.1\r\n"));
        assert!(requests[0].contains("authorization: AWS4-HMAC-SHA256 Credential=AKIDEXAMPLE/"));
        assert!(requests[0].contains("x-amz-content-sha256: UNSIGNED-PAYLOAD"));
    }

    #[tokio::test]
    async fn missing_key_is_asset_not_found() {
        let body = "<Error><Code>NoSuchKey</Code><Key>38R.png</Key></Error>";
        let (base_url, _requests) = stub_server::serve(vec![(404, body)]).await;

        let err = store(stub_server::client())
            .with_endpoint(&base_url)
            .download_object("redfrontbusmaps", "38R.png")
            .await
            .unwrap_err();

        assert!(matches!(
            err,
            BotError::AssetNotFound { ref bucket, ref key }
                if bucket == "redfrontbusmaps" && key == "38R.png"
        ));
    }

    #[tokio::test]
    async fn other_failures_are_storage_errors() {
        let (base_url, _requests) =
            stub_server::serve(vec![(500, "<Error><Code>InternalError</Code></Error>")]).await;

        let err = store(stub_server::client())
            .with_endpoint(&base_url)
            .download_object("redfrontbusmaps", "19.png")
            .await
            .unwrap_err();

        assert!(matches!(err, BotError::Storage { status: 500, ref message }
            if message.contains("InternalError")));
    }
}
