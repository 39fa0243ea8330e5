//! One invocation: fetch, decide, and announce when the route changed.

use chrono::{DateTime, Utc};

use crate::api::FeedSource;
use crate::baseline;
use crate::decide::{decide, Decision, SkipReason};
use crate::error::Result;
use crate::mastodon::SocialPlatform;
use crate::storage::{map_key, ObjectStore};

const MAP_MIME_TYPE: &str = "image/png";

/// Result of an invocation that did not fail.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Skipped(SkipReason),
    Announced {
        line_ref: String,
        display_name: String,
        status_text: String,
    },
}

pub fn announcement_text(vehicle_id: &str, line_ref: &str, display_name: &str) -> String {
    format!(
        "#RedFrontBus 🔴 (#{vehicle_id}) is currently operating on route \
         {line_ref} {display_name}. Tag me if you see me!"
    )
}

pub fn map_description(line_ref: &str, display_name: &str) -> String {
    format!("A map of the {line_ref} {display_name} route")
}

/// The tracked vehicle plus the collaborators each invocation talks to.
/// Built once per process and reused across invocations.
pub struct RouteBot<F, S, P> {
    feed: F,
    store: S,
    social: P,
    vehicle_id: String,
    bucket: String,
}

impl<F, S, P> RouteBot<F, S, P>
where
    F: FeedSource,
    S: ObjectStore,
    P: SocialPlatform,
{
    pub fn new(feed: F, store: S, social: P, vehicle_id: &str, bucket: &str) -> Self {
        Self {
            feed,
            store,
            social,
            vehicle_id: vehicle_id.to_string(),
            bucket: bucket.to_string(),
        }
    }

    pub async fn run(&self) -> Result<Outcome> {
        self.run_at(Utc::now()).await
    }

    /// Run one invocation as of `now`.
    pub async fn run_at(&self, now: DateTime<Utc>) -> Result<Outcome> {
        let observation = match self.feed.current_observation().await? {
            Some(observation) if observation.is_operating() => observation,
            _ => {
                tracing::info!(
                    vehicle_id = %self.vehicle_id,
                    "Red Front Bus is not currently operating"
                );
                return Ok(Outcome::Skipped(SkipReason::NotOperating));
            }
        };

        let latest = self.social.latest_own_post().await?;
        let last = baseline::last_announcement(latest.as_ref())?;
        tracing::debug!(last = %last, current = %observation, "Comparing with last announcement");

        match decide(&observation, &last, now) {
            Decision::Skip(reason) => {
                tracing::info!(%reason, line_ref = %last.line_ref, "No announcement needed");
                Ok(Outcome::Skipped(reason))
            }
            Decision::Announce {
                line_ref,
                display_name,
            } => self.announce(line_ref, display_name).await,
        }
    }

    async fn announce(&self, line_ref: String, display_name: String) -> Result<Outcome> {
        let map = self
            .store
            .download_object(&self.bucket, &map_key(&line_ref))
            .await?;

        let media_id = self
            .social
            .upload_media(map, MAP_MIME_TYPE, &map_description(&line_ref, &display_name))
            .await?;

        let status_text = announcement_text(&self.vehicle_id, &line_ref, &display_name);
        self.social.publish_post(&status_text, &[media_id]).await?;

        tracing::info!(line_ref = %line_ref, display_name = %display_name, "Announced route");

        Ok(Outcome::Announced {
            line_ref,
            display_name,
            status_text,
        })
    }
}
