use async_trait::async_trait;
use bytes::Bytes;
use serde::Deserialize;

use crate::error::{BotError, Result};
use crate::models::Observation;

pub const DEFAULT_ENDPOINT: &str = "https://api.511.org/transit/VehicleMonitoring";

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// Source of the tracked vehicle's current route
#[async_trait]
pub trait FeedSource: Send + Sync {
    /// `None` when the feed has no activity for the vehicle.
    async fn current_observation(&self) -> Result<Option<Observation>>;
}

// SIRI VehicleMonitoring response, reduced to the fields we read.

#[derive(Debug, Deserialize)]
struct SiriEnvelope {
    #[serde(rename = "Siri")]
    siri: Siri,
}

#[derive(Debug, Deserialize)]
struct Siri {
    #[serde(rename = "ServiceDelivery")]
    service_delivery: ServiceDelivery,
}

#[derive(Debug, Deserialize)]
struct ServiceDelivery {
    #[serde(rename = "VehicleMonitoringDelivery")]
    vehicle_monitoring_delivery: OneOrMany<VehicleMonitoringDelivery>,
}

/// SIRI 1.x serializes the delivery as an object, 2.0 as an array.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum OneOrMany<T> {
    Many(Vec<T>),
    One(T),
}

impl<T> OneOrMany<T> {
    fn first(&self) -> Option<&T> {
        match self {
            OneOrMany::Many(items) => items.first(),
            OneOrMany::One(item) => Some(item),
        }
    }
}

#[derive(Debug, Deserialize)]
struct VehicleMonitoringDelivery {
    #[serde(rename = "VehicleActivity", default)]
    vehicle_activity: Option<Vec<VehicleActivity>>,
}

#[derive(Debug, Deserialize)]
struct VehicleActivity {
    #[serde(rename = "MonitoredVehicleJourney")]
    monitored_vehicle_journey: MonitoredVehicleJourney,
}

#[derive(Debug, Deserialize)]
struct MonitoredVehicleJourney {
    #[serde(rename = "LineRef", default)]
    line_ref: Option<String>,

    #[serde(rename = "PublishedLineName", default)]
    published_line_name: Option<String>,
}

/// 511.org VehicleMonitoring client for one vehicle
pub struct VehicleMonitoringClient {
    client: reqwest::Client,
    endpoint: String,
    agency: String,
    vehicle_id: String,
    api_key: String,
}

impl VehicleMonitoringClient {
    pub fn new(
        client: reqwest::Client,
        endpoint: &str,
        agency: &str,
        vehicle_id: &str,
        api_key: String,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.to_string(),
            agency: agency.to_string(),
            vehicle_id: vehicle_id.to_string(),
            api_key,
        }
    }

    /// Fetch the raw monitoring response for the tracked vehicle
    pub async fn fetch_vehicle_monitoring(&self) -> Result<Bytes> {
        tracing::debug!(
            url = %self.endpoint,
            vehicle_id = %self.vehicle_id,
            "Fetching vehicle monitoring"
        );

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[
                ("format", "json"),
                ("agency", self.agency.as_str()),
                ("vehicleID", self.vehicle_id.as_str()),
                ("api_key", self.api_key.as_str()),
            ])
            .send()
            .await
            .map_err(|e| BotError::UpstreamFeed(format!("request failed: {}", e.without_url())))?;

        let status = response.status();
        if !status.is_success() {
            return Err(BotError::UpstreamFeed(format!("API returned error status: {status}")));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| BotError::UpstreamFeed(format!("failed to read response body: {e}")))?;

        tracing::debug!(bytes = bytes.len(), "Received data from API");
        Ok(bytes)
    }

    /// Poll the API and return the vehicle's current observation
    pub async fn poll_vehicle(&self) -> Result<Option<Observation>> {
        let data = self.fetch_vehicle_monitoring().await?;
        let observation = parse_feed(&data)?;

        match &observation {
            Some(obs) => {
                tracing::info!(vehicle_id = %self.vehicle_id, observation = %obs, "Polled vehicle")
            }
            None => tracing::info!(vehicle_id = %self.vehicle_id, "No vehicle activity in feed"),
        }

        Ok(observation)
    }
}

#[async_trait]
impl FeedSource for VehicleMonitoringClient {
    async fn current_observation(&self) -> Result<Option<Observation>> {
        self.poll_vehicle().await
    }
}

/// Decode a VehicleMonitoring body (UTF-8, BOM optional) into an observation
/// of its first vehicle activity.
pub fn parse_feed(data: &[u8]) -> Result<Option<Observation>> {
    let data = data.strip_prefix(UTF8_BOM).unwrap_or(data);
    let text = std::str::from_utf8(data)
        .map_err(|e| BotError::UpstreamFeed(format!("response is not UTF-8: {e}")))?;

    let envelope: SiriEnvelope = serde_json::from_str(text)
        .map_err(|e| BotError::UpstreamFeed(format!("malformed response: {e}")))?;

    let activity = envelope
        .siri
        .service_delivery
        .vehicle_monitoring_delivery
        .first()
        .and_then(|delivery| delivery.vehicle_activity.as_ref())
        .and_then(|activity| activity.first());

    let Some(activity) = activity else {
        return Ok(None);
    };

    let journey = &activity.monitored_vehicle_journey;
    Ok(Some(Observation {
        line_ref: journey.line_ref.clone(),
        published_line_name: journey.published_line_name.clone().unwrap_or_default(),
    }))
}
