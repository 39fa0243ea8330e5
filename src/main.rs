mod api;
mod baseline;
mod bot;
mod config;
mod decide;
mod error;
mod mastodon;
mod models;
mod namer;
mod secrets;
mod sigv4;
mod storage;
#[cfg(test)]
mod stub_server;

use std::sync::Arc;

use anyhow::{Context, Result};
use api::VehicleMonitoringClient;
use bot::{Outcome, RouteBot};
use config::{Config, SecretsMode};
use mastodon::{LazySession, MastodonConnector};
use secrets::{EnvSecrets, KmsSecrets, SecretResolver};
use sigv4::AwsCredentials;
use storage::S3Store;

#[tokio::main]
async fn main() -> Result<()> {
    // A missing .env file is normal outside development
    let _ = dotenvy::dotenv();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = Config::from_env().context("Failed to load configuration")?;

    tracing::info!(
        vehicle_id = %config.vehicle_id,
        agency = %config.agency,
        "Red Front Bus route announcer"
    );

    let http = reqwest::Client::builder()
        .timeout(config.http_timeout)
        .build()
        .context("Failed to create HTTP client")?;

    let secrets: Arc<dyn SecretResolver> = match &config.secrets_mode {
        SecretsMode::Env => Arc::new(EnvSecrets),
        SecretsMode::Kms { function_name } => {
            let kms = KmsSecrets::new(
                http.clone(),
                AwsCredentials::from_env()?,
                &config.aws_region,
                function_name,
            );
            match &config.kms_endpoint {
                Some(endpoint) => Arc::new(kms.with_endpoint(endpoint)),
                None => Arc::new(kms),
            }
        }
    };

    let api_key = secrets.resolve(config::SF_511_API_KEY).await?;
    let feed = VehicleMonitoringClient::new(
        http.clone(),
        &config.monitoring_endpoint,
        &config.agency,
        &config.vehicle_id,
        api_key,
    );

    let mut store = S3Store::new(http.clone(), AwsCredentials::from_env()?, &config.aws_region);
    if let Some(endpoint) = &config.s3_endpoint {
        store = store.with_endpoint(endpoint);
    }

    // Login happens on the first invocation that finds the vehicle operating
    let social = LazySession::new(MastodonConnector::new(
        http.clone(),
        &config.mastodon_server,
        &config.mastodon_client_id,
        &config.mastodon_email,
        secrets.clone(),
    ));

    let bot = RouteBot::new(feed, store, social, &config.vehicle_id, &config.map_bucket);

    let Some(period) = config.poll_interval else {
        let outcome = bot.run().await.context("Invocation failed")?;
        report(&outcome);
        return Ok(());
    };

    tracing::info!(secs = period.as_secs(), "Starting polling loop");
    let mut interval = tokio::time::interval(period);
    let mut poll_count: u64 = 0;

    loop {
        interval.tick().await;
        poll_count += 1;

        match bot.run().await {
            Ok(outcome) => report(&outcome),
            Err(e) => {
                tracing::error!(
                    poll = poll_count,
                    error = %e,
                    "Invocation failed, will retry on next interval"
                );
            }
        }
    }
}

fn report(outcome: &Outcome) {
    match outcome {
        Outcome::Skipped(reason) => tracing::info!(%reason, "Exiting without posting"),
        Outcome::Announced {
            line_ref,
            display_name,
            status_text,
        } => tracing::info!(%line_ref, %display_name, status = %status_text, "Posted"),
    }
}
