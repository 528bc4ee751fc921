use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MetricKind {
    Temperature,
    Humidity,
    Pressure,
}

impl MetricKind {
    /// Submission order within one cycle.
    pub const CYCLE: [MetricKind; 3] = [
        MetricKind::Temperature,
        MetricKind::Humidity,
        MetricKind::Pressure,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            MetricKind::Temperature => "temperature",
            MetricKind::Humidity => "humidity",
            MetricKind::Pressure => "pressure",
        }
    }

    pub fn endpoint_path(self) -> &'static str {
        match self {
            MetricKind::Temperature => "/temperatures",
            MetricKind::Humidity => "/humidities",
            MetricKind::Pressure => "/pressures",
        }
    }
}

impl fmt::Display for MetricKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Reading {
    pub kind: MetricKind,
    pub value: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

/// Resolved once at startup and shared by reference for the rest of the process.
#[derive(Debug, Clone)]
pub struct UploaderContext {
    pub device_id: String,
    pub location: Option<Location>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TelemetryPayload {
    #[serde(rename = "deviceId")]
    pub device_id: String,
    pub value: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latitude: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub longitude: Option<String>,
}

impl TelemetryPayload {
    pub fn new(ctx: &UploaderContext, reading: &Reading) -> Self {
        Self {
            device_id: ctx.device_id.clone(),
            value: format_number(reading.value),
            latitude: ctx.location.map(|loc| format_number(loc.latitude)),
            longitude: ctx.location.map(|loc| format_number(loc.longitude)),
        }
    }
}

// f64's Display drops the fractional part for integral values: 234.0 -> "234".
fn format_number(value: f64) -> String {
    value.to_string()
}
