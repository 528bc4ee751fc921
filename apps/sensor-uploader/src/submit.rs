use crate::sensors::SensorReader;
use crate::telemetry::{MetricKind, TelemetryPayload, UploaderContext};
use anyhow::{Context, Result};
use reqwest::header::CONTENT_TYPE;
use reqwest::Client;
use std::future::Future;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitResponse {
    pub status: u16,
    pub body: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    #[error("URL error occurred: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("HTTP error occurred: {status} {reason}")]
    Status { status: u16, reason: String },
    #[error("failed to encode payload: {0}")]
    Encode(#[from] serde_json::Error),
}

impl SubmitError {
    pub fn class(&self) -> &'static str {
        match self {
            SubmitError::Transport(_) => "transport",
            SubmitError::Status { .. } => "http_status",
            SubmitError::Encode(_) => "encode",
        }
    }
}

/// Destination for one serialized reading. Delivery is best effort: implementations
/// never retry, and callers never queue a failed payload.
pub trait TelemetrySink {
    fn send(
        &self,
        kind: MetricKind,
        payload: &TelemetryPayload,
    ) -> impl Future<Output = Result<SubmitResponse, SubmitError>>;
}

#[derive(Clone)]
pub struct TelemetryClient {
    client: Client,
    base_url: String,
}

impl TelemetryClient {
    pub fn new(base_url: &str, timeout: Option<Duration>) -> Result<Self> {
        // No idle pool: every POST opens and closes its own connection.
        let mut builder = Client::builder().pool_max_idle_per_host(0);
        if let Some(timeout) = timeout {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("build telemetry HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn endpoint(&self, kind: MetricKind) -> String {
        format!("{}{}", self.base_url, kind.endpoint_path())
    }
}

impl TelemetrySink for TelemetryClient {
    async fn send(
        &self,
        kind: MetricKind,
        payload: &TelemetryPayload,
    ) -> Result<SubmitResponse, SubmitError> {
        let body = serde_json::to_vec(payload)?;
        let response = self
            .client
            .post(self.endpoint(kind))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(SubmitError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SubmitError::Status {
                status: status.as_u16(),
                reason: status.canonical_reason().unwrap_or("").to_string(),
            });
        }

        let body = response.text().await.map_err(SubmitError::Transport)?;
        Ok(SubmitResponse {
            status: status.as_u16(),
            body,
        })
    }
}

/// Reads one metric and hands it to the sink.
///
/// Delivery failures are logged and reported as `Ok(None)` so the cycle moves on to the
/// next metric. Sensor failures are not caught here and end the loop.
pub async fn submit_metric<S, K>(
    ctx: &UploaderContext,
    sensors: &mut S,
    sink: &K,
    kind: MetricKind,
) -> Result<Option<SubmitResponse>>
where
    S: SensorReader,
    K: TelemetrySink,
{
    let reading = sensors.reading(kind)?;
    let payload = TelemetryPayload::new(ctx, &reading);

    match sink.send(kind, &payload).await {
        Ok(response) => {
            tracing::info!(
                metric = %kind,
                value = %payload.value,
                status = response.status,
                body = %response.body,
                "telemetry submitted"
            );
            Ok(Some(response))
        }
        Err(err) => {
            tracing::warn!(metric = %kind, class = err.class(), error = %err, "request failed");
            Ok(None)
        }
    }
}
