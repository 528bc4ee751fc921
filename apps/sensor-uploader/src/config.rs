use anyhow::{anyhow, bail, Context, Result};
use dotenvy::dotenv;
use std::env;
use std::path::PathBuf;
use std::time::Duration;
use url::Url;

pub const DEFAULT_BACKEND_URL: &str = "https://iot-raspberrypi-backend-12a94ca200cf.herokuapp.com";
pub const DEFAULT_GEOLOCATION_URL: &str = "https://ipapi.co/json";
pub const DEFAULT_SYSFS_DIR: &str = "/sys/bus/iio/devices/iio:device0";
const DEFAULT_INTERVAL_SECS: u64 = 5;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SensorSource {
    Random,
    Sysfs(PathBuf),
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend_url: String,
    pub interval: Duration,
    pub device_id: Option<String>,
    pub enable_geolocation: bool,
    pub geolocation_url: String,
    pub sensor_source: SensorSource,
    pub request_timeout: Option<Duration>,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let env = EnvReader { lookup };

        let backend_url = env.string("UPLOADER_BACKEND_URL", DEFAULT_BACKEND_URL);
        let backend_url = normalize_base_url(&backend_url).context("invalid UPLOADER_BACKEND_URL")?;

        let interval_secs = env.u64("UPLOADER_INTERVAL_SECS", DEFAULT_INTERVAL_SECS)?;
        if interval_secs == 0 {
            bail!("UPLOADER_INTERVAL_SECS must be greater than zero");
        }

        let device_id = env.optional("UPLOADER_DEVICE_ID");
        let enable_geolocation = env.flag("UPLOADER_ENABLE_GEOLOCATION", false);

        let geolocation_url = env.string("UPLOADER_GEOLOCATION_URL", DEFAULT_GEOLOCATION_URL);
        Url::parse(&geolocation_url).context("invalid UPLOADER_GEOLOCATION_URL")?;

        let sensor_source = match env.string("UPLOADER_SENSOR", "random").to_ascii_lowercase().as_str() {
            "random" => SensorSource::Random,
            "sysfs" => SensorSource::Sysfs(PathBuf::from(env.string("UPLOADER_SYSFS_DIR", DEFAULT_SYSFS_DIR))),
            other => return Err(anyhow!("unknown UPLOADER_SENSOR {other:?} (expected random or sysfs)")),
        };

        let request_timeout = match env.optional("UPLOADER_REQUEST_TIMEOUT_SECS") {
            Some(raw) => {
                let secs = raw
                    .parse::<u64>()
                    .context("invalid UPLOADER_REQUEST_TIMEOUT_SECS")?;
                Some(Duration::from_secs(secs))
            }
            None => None,
        };

        Ok(Self {
            backend_url,
            interval: Duration::from_secs(interval_secs),
            device_id,
            enable_geolocation,
            geolocation_url,
            sensor_source,
            request_timeout,
        })
    }
}

/// Endpoint paths are appended verbatim, so the base URL is kept without a trailing slash.
fn normalize_base_url(raw: &str) -> Result<String> {
    let parsed = Url::parse(raw)?;
    if !matches!(parsed.scheme(), "http" | "https") {
        bail!("unsupported scheme {}", parsed.scheme());
    }
    Ok(raw.trim_end_matches('/').to_string())
}

struct EnvReader<F> {
    lookup: F,
}

impl<F> EnvReader<F>
where
    F: Fn(&str) -> Option<String>,
{
    fn optional(&self, key: &str) -> Option<String> {
        (self.lookup)(key)
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty())
    }

    fn string(&self, key: &str, default: &str) -> String {
        self.optional(key).unwrap_or_else(|| default.to_string())
    }

    fn u64(&self, key: &str, default: u64) -> Result<u64> {
        match self.optional(key) {
            Some(value) => value.parse::<u64>().with_context(|| format!("invalid {key}")),
            None => Ok(default),
        }
    }

    fn flag(&self, key: &str, default: bool) -> bool {
        self.optional(key)
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(default)
    }
}
