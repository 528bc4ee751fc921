mod config;
mod driver;
mod identity;
mod location;
mod sensors;
mod submit;
mod telemetry;

use crate::config::Config;
use crate::sensors::Sensors;
use crate::submit::TelemetryClient;
use crate::telemetry::UploaderContext;
use anyhow::{Context, Result};

fn init_tracing() -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info,sensor_uploader=info".into());
    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(true)
        .try_init()
        .map_err(|err| anyhow::anyhow!(err.to_string()))?;
    Ok(())
}

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::from_env()?;
    init_tracing()?;

    let device_id = identity::resolve_device_id(config.device_id.as_deref())?;

    let location = if config.enable_geolocation {
        let client = reqwest::Client::builder()
            .build()
            .context("build geolocation HTTP client")?;
        location::resolve_location(&client, &config.geolocation_url).await
    } else {
        None
    };

    let ctx = UploaderContext {
        device_id,
        location,
    };
    let mut sensors = Sensors::from_source(&config.sensor_source)?;
    let sink = TelemetryClient::new(&config.backend_url, config.request_timeout)?;

    tracing::info!(
        device_id = %ctx.device_id,
        backend = %config.backend_url,
        interval_secs = config.interval.as_secs(),
        location = ?ctx.location,
        "sensor-uploader starting (CTRL+C to stop)"
    );

    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(error=%err, "failed to listen for shutdown signal");
            std::future::pending::<()>().await;
        }
    };

    driver::run(&ctx, &mut sensors, &sink, config.interval, shutdown).await?;
    Ok(())
}
