//! Mastodon REST client: the announcement target and, through the account's
//! own post history, the only record of what was last announced.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tokio::sync::OnceCell;

use crate::config::{MASTODON_CLIENT_SECRET, MASTODON_PASSWORD};
use crate::error::{BotError, Result};
use crate::models::OwnPost;
use crate::secrets::SecretResolver;

#[async_trait]
pub trait SocialPlatform: Send + Sync {
    /// Latest post by this account, excluding replies and reblogs.
    async fn latest_own_post(&self) -> Result<Option<OwnPost>>;

    /// Upload an attachment, returning its media id.
    async fn upload_media(
        &self,
        data: Bytes,
        mime_type: &str,
        description: &str,
    ) -> Result<String>;

    async fn publish_post(&self, text: &str, media_ids: &[String]) -> Result<()>;
}

/// Produces a logged-in session.
#[async_trait]
pub trait Connect: Send + Sync {
    type Session: SocialPlatform;

    async fn connect(&self) -> Result<Self::Session>;
}

/// Logs in on first use and keeps the session for the life of the process.
///
/// Nothing touches the platform (or its secrets) until an invocation gets
/// past the "not operating" check.
pub struct LazySession<C: Connect> {
    connector: C,
    session: OnceCell<C::Session>,
}

impl<C: Connect> LazySession<C> {
    pub fn new(connector: C) -> Self {
        Self {
            connector,
            session: OnceCell::new(),
        }
    }

    async fn session(&self) -> Result<&C::Session> {
        self.session
            .get_or_try_init(|| self.connector.connect())
            .await
    }
}

#[async_trait]
impl<C: Connect> SocialPlatform for LazySession<C> {
    async fn latest_own_post(&self) -> Result<Option<OwnPost>> {
        self.session().await?.latest_own_post().await
    }

    async fn upload_media(
        &self,
        data: Bytes,
        mime_type: &str,
        description: &str,
    ) -> Result<String> {
        self.session()
            .await?
            .upload_media(data, mime_type, description)
            .await
    }

    async fn publish_post(&self, text: &str, media_ids: &[String]) -> Result<()> {
        self.session().await?.publish_post(text, media_ids).await
    }
}

/// Everything needed for the OAuth password grant.
pub struct MastodonCredentials {
    pub server: String,
    pub client_id: String,
    pub client_secret: String,
    pub email: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct Account {
    id: String,
    #[serde(default)]
    acct: String,
}

#[derive(Debug, Deserialize)]
struct Status {
    content: String,
    created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct MediaAttachment {
    id: String,
}

/// Resolves the login secrets and logs in to Mastodon.
pub struct MastodonConnector {
    client: reqwest::Client,
    server: String,
    client_id: String,
    email: String,
    secrets: Arc<dyn SecretResolver>,
}

impl MastodonConnector {
    pub fn new(
        client: reqwest::Client,
        server: &str,
        client_id: &str,
        email: &str,
        secrets: Arc<dyn SecretResolver>,
    ) -> Self {
        Self {
            client,
            server: server.to_string(),
            client_id: client_id.to_string(),
            email: email.to_string(),
            secrets,
        }
    }
}

#[async_trait]
impl Connect for MastodonConnector {
    type Session = MastodonClient;

    async fn connect(&self) -> Result<MastodonClient> {
        let credentials = MastodonCredentials {
            server: self.server.clone(),
            client_id: self.client_id.clone(),
            client_secret: self.secrets.resolve(MASTODON_CLIENT_SECRET).await?,
            email: self.email.clone(),
            password: self.secrets.resolve(MASTODON_PASSWORD).await?,
        };
        MastodonClient::connect(self.client.clone(), credentials).await
    }
}

/// Logged-in session for one account
pub struct MastodonClient {
    client: reqwest::Client,
    base_url: String,
    access_token: String,
    account_id: String,
}

impl MastodonClient {
    /// Log in with the password grant and look up the account id.
    pub async fn connect(
        client: reqwest::Client,
        credentials: MastodonCredentials,
    ) -> Result<Self> {
        let base_url = credentials.server.trim_end_matches('/').to_string();

        let response = client
            .post(format!("{base_url}/oauth/token"))
            .form(&[
                ("grant_type", "password"),
                ("client_id", credentials.client_id.as_str()),
                ("client_secret", credentials.client_secret.as_str()),
                ("username", credentials.email.as_str()),
                ("password", credentials.password.as_str()),
                ("scope", "read write"),
            ])
            .send()
            .await
            .map_err(|e| BotError::Social(format!("login request failed: {e}")))?;

        let token: TokenResponse = read_json(response, "login").await?;

        let response = client
            .get(format!("{base_url}/api/v1/accounts/verify_credentials"))
            .bearer_auth(&token.access_token)
            .send()
            .await
            .map_err(|e| BotError::Social(format!("verify_credentials failed: {e}")))?;

        let account: Account = read_json(response, "verify_credentials").await?;
        tracing::info!(account = %account.acct, id = %account.id, "Logged in to Mastodon");

        Ok(Self {
            client,
            base_url,
            access_token: token.access_token,
            account_id: account.id,
        })
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(
    response: reqwest::Response,
    what: &str,
) -> Result<T> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(BotError::Social(format!("{what} returned {status}: {body}")));
    }
    response
        .json()
        .await
        .map_err(|e| BotError::Social(format!("{what} returned malformed JSON: {e}")))
}

async fn check_published(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(BotError::Publish {
        status: status.as_u16(),
        message: body,
    })
}

fn publish_failed(e: reqwest::Error) -> BotError {
    BotError::Publish {
        status: e.status().map(|s| s.as_u16()).unwrap_or(0),
        message: e.to_string(),
    }
}

#[async_trait]
impl SocialPlatform for MastodonClient {
    async fn latest_own_post(&self) -> Result<Option<OwnPost>> {
        let response = self
            .client
            .get(format!(
                "{}/api/v1/accounts/{}/statuses",
                self.base_url, self.account_id
            ))
            .query(&[
                ("exclude_replies", "true"),
                ("exclude_reblogs", "true"),
                ("limit", "1"),
            ])
            .bearer_auth(&self.access_token)
            .send()
            .await
            .map_err(|e| BotError::Social(format!("statuses request failed: {e}")))?;

        let statuses: Vec<Status> = read_json(response, "account statuses").await?;
        Ok(statuses.into_iter().next().map(|status| OwnPost {
            content: status.content,
            created_at: status.created_at,
        }))
    }

    async fn upload_media(
        &self,
        data: Bytes,
        mime_type: &str,
        description: &str,
    ) -> Result<String> {
        let size = data.len();
        let file = reqwest::multipart::Part::bytes(data.to_vec())
            .file_name("map.png")
            .mime_str(mime_type)
            .map_err(publish_failed)?;
        let form = reqwest::multipart::Form::new()
            .part("file", file)
            .text("description", description.to_string());

        let response = self
            .client
            .post(format!("{}/api/v2/media", self.base_url))
            .bearer_auth(&self.access_token)
            .multipart(form)
            .send()
            .await
            .map_err(publish_failed)?;

        let media: MediaAttachment = check_published(response)
            .await?
            .json()
            .await
            .map_err(publish_failed)?;

        tracing::debug!(media_id = %media.id, bytes = size, "Uploaded media");
        Ok(media.id)
    }

    async fn publish_post(&self, text: &str, media_ids: &[String]) -> Result<()> {
        let mut form: Vec<(&str, &str)> = vec![("status", text)];
        form.extend(media_ids.iter().map(|id| ("media_ids[]", id.as_str())));

        let response = self
            .client
            .post(format!("{}/api/v1/statuses", self.base_url))
            .bearer_auth(&self.access_token)
            .form(&form)
            .send()
            .await
            .map_err(publish_failed)?;

        check_published(response).await?;
        Ok(())
    }
}
