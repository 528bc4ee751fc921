//! Sensor sources. Each source returns one scalar per metric kind; driver setup
//! (loading kernel modules, binding the I2C device) happens outside this process.

use crate::config::SensorSource;
use crate::telemetry::{MetricKind, Reading};
use anyhow::{Context, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::{Path, PathBuf};

const RANDOM_MAX: u32 = 1000;

pub trait SensorReader {
    fn read(&mut self, kind: MetricKind) -> Result<f64>;

    fn reading(&mut self, kind: MetricKind) -> Result<Reading> {
        let value = self
            .read(kind)
            .with_context(|| format!("read {kind} sensor"))?;
        Ok(Reading { kind, value })
    }
}

pub enum Sensors {
    Random(RandomSensor),
    Sysfs(SysfsSensor),
}

impl Sensors {
    pub fn from_source(source: &SensorSource) -> Result<Self> {
        match source {
            SensorSource::Random => Ok(Sensors::Random(RandomSensor::new())),
            SensorSource::Sysfs(dir) => Ok(Sensors::Sysfs(SysfsSensor::open(dir)?)),
        }
    }
}

impl SensorReader for Sensors {
    fn read(&mut self, kind: MetricKind) -> Result<f64> {
        match self {
            Sensors::Random(sensor) => sensor.read(kind),
            Sensors::Sysfs(sensor) => sensor.read(kind),
        }
    }
}

/// Stand-in for real hardware: uniform integers in `[0, 1000]`.
pub struct RandomSensor {
    rng: StdRng,
}

impl RandomSensor {
    pub fn new() -> Self {
        Self {
            rng: StdRng::from_entropy(),
        }
    }
}

impl Default for RandomSensor {
    fn default() -> Self {
        Self::new()
    }
}

impl SensorReader for RandomSensor {
    fn read(&mut self, _kind: MetricKind) -> Result<f64> {
        Ok(f64::from(self.rng.gen_range(0..=RANDOM_MAX)))
    }
}

/// Linux IIO device (e.g. a BME280 bound to `bmp280`).
pub struct SysfsSensor {
    dir: PathBuf,
}

impl SysfsSensor {
    pub fn open(dir: &Path) -> Result<Self> {
        if !dir.is_dir() {
            anyhow::bail!("IIO device directory {} not found", dir.display());
        }
        Ok(Self {
            dir: dir.to_path_buf(),
        })
    }

    fn channel(kind: MetricKind) -> (&'static str, f64) {
        match kind {
            // millidegrees C -> C
            MetricKind::Temperature => ("in_temp_input", 0.001),
            // milli-percent -> %RH
            MetricKind::Humidity => ("in_humidityrelative_input", 0.001),
            // kPa -> hPa
            MetricKind::Pressure => ("in_pressure_input", 10.0),
        }
    }
}

impl SensorReader for SysfsSensor {
    fn read(&mut self, kind: MetricKind) -> Result<f64> {
        let (file, scale) = Self::channel(kind);
        let path = self.dir.join(file);
        let raw = fs::read_to_string(&path).with_context(|| format!("read {}", path.display()))?;
        let value = raw
            .trim()
            .parse::<f64>()
            .with_context(|| format!("parse {} ({:?})", path.display(), raw.trim()))?;
        Ok(value * scale)
    }
}
