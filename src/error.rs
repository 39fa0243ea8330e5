use thiserror::Error;

pub type Result<T> = std::result::Result<T, BotError>;

/// Failures that abort a single invocation.
///
/// "Not operating" and "no change" are not errors; see [`crate::decide::SkipReason`].
#[derive(Debug, Error)]
pub enum BotError {
    #[error("secret {name} unavailable: {message}")]
    SecretUnavailable { name: String, message: String },

    #[error("vehicle monitoring feed error: {0}")]
    UpstreamFeed(String),

    #[error("no baseline post: {0}")]
    NoBaselinePost(String),

    #[error("map image not found: {bucket}/{key}")]
    AssetNotFound { bucket: String, key: String },

    #[error("object storage error (status {status}): {message}")]
    Storage { status: u16, message: String },

    #[error("social platform error: {0}")]
    Social(String),

    #[error("publish rejected (status {status}): {message}")]
    Publish { status: u16, message: String },

    #[error("configuration error: {0}")]
    Config(String),
}

impl BotError {
    pub fn secret(name: &str, message: impl Into<String>) -> Self {
        BotError::SecretUnavailable {
            name: name.to_string(),
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display() {
        let err = BotError::AssetNotFound {
            bucket: "redfrontbusmaps".into(),
            key: "19.png".into(),
        };
        assert_eq!(err.to_string(), "map image not found: redfrontbusmaps/19.png");

        let err = BotError::Publish {
            status: 422,
            message: "Validation failed".into(),
        };
        assert_eq!(err.to_string(), "publish rejected (status 422): Validation failed");

        let err = BotError::secret("MASTODON_PASSWORD", "not set");
        assert!(err.to_string().contains("MASTODON_PASSWORD"));
        assert!(err.to_string().contains("not set"));
    }
}
