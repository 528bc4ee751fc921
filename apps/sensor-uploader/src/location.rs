use crate::telemetry::Location;
use reqwest::Client;
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct GeoLookup {
    latitude: Option<f64>,
    longitude: Option<f64>,
}

/// One-shot IP geolocation lookup. Any failure yields `None`; payloads then omit the
/// location fields instead of aborting the uploader.
pub async fn resolve_location(client: &Client, url: &str) -> Option<Location> {
    let response = match client.get(url).send().await {
        Ok(response) => response,
        Err(err) => {
            tracing::warn!(url, error=%err, "geolocation lookup failed");
            return None;
        }
    };

    let status = response.status();
    if !status.is_success() {
        tracing::warn!(
            url,
            status = status.as_u16(),
            reason = status.canonical_reason().unwrap_or(""),
            "geolocation lookup returned non-success"
        );
        return None;
    }

    let lookup: GeoLookup = match response.json().await {
        Ok(parsed) => parsed,
        Err(err) => {
            tracing::warn!(url, error=%err, "geolocation response was not valid JSON");
            return None;
        }
    };

    match (lookup.latitude, lookup.longitude) {
        (Some(latitude), Some(longitude)) if latitude.is_finite() && longitude.is_finite() => {
            tracing::info!(latitude, longitude, "resolved device location");
            Some(Location {
                latitude,
                longitude,
            })
        }
        _ => {
            tracing::warn!(url, "geolocation response missing latitude/longitude");
            None
        }
    }
}
