use std::{fmt, path::Path, path::PathBuf, str::FromStr, time::Duration};

use serde::{de, Deserialize, Deserializer};
use tracing::metadata::LevelFilter;

use crate::error::ConfigError;

/// Loads and validates the configuration at `path`
pub fn load(path: &Path) -> Result<Config, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::Missing(path.to_path_buf()));
    }
    let buf = std::fs::read_to_string(path)?;
    from_str(&buf)
}

pub fn from_str(text: &str) -> Result<Config, ConfigError> {
    let cfg: Config = config::Config::builder()
        .add_source(config::File::from_str(text, config::FileFormat::Yaml))
        .build()?
        .try_deserialize()?;
    cfg.validate()?;
    Ok(cfg)
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Config {
    /// only used to label log output
    #[serde(default)]
    pub device: Device,
    pub sensor: Sensor,
    #[serde(default)]
    pub logging: Logging,
    /// where readings are written
    #[serde(default)]
    pub output: Output,
    #[serde(default)]
    pub alerts: Alerts,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Device {
    #[serde(default = "Device::default_name")]
    pub name: String,
    #[serde(default)]
    pub location: Option<String>,
}

impl Device {
    fn default_name() -> String {
        "raspberry-pi-climate".into()
    }
}

impl Default for Device {
    fn default() -> Self {
        Self {
            name: Self::default_name(),
            location: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Transport {
    /// a real BME280 on a linux i2c bus
    #[default]
    I2c,
    /// generated data, for running without hardware
    Simulated,
}

#[derive(Debug, Clone, Deserialize, PartialEq)]
pub struct Sensor {
    #[serde(default)]
    pub transport: Transport,
    /// bus number, `/dev/i2c-<n>`
    #[serde(default = "Sensor::default_bus")]
    pub i2c_bus: u32,
    /// overrides `i2c_bus` with an explicit device node
    #[serde(default)]
    pub i2c_device: Option<PathBuf>,
    pub i2c_address: I2cAddress,
    /// seconds. signed so that negative values are reported as such instead of as a type error
    #[serde(default = "Sensor::default_read_interval")]
    pub read_interval: i64,
    #[serde(default = "Sensor::default_retry_limit")]
    pub retry_limit: i64,
    #[serde(default = "Sensor::default_read_timeout_ms")]
    pub read_timeout_ms: i64,
    /// hPa, used for the altitude estimate
    #[serde(default = "Sensor::default_sea_level_pressure")]
    pub sea_level_pressure: f64,
    #[serde(default)]
    pub temperature_offset: f64,
    #[serde(default)]
    pub humidity_offset: f64,
    #[serde(default)]
    pub pressure_offset: f64,
}

impl Sensor {
    fn default_bus() -> u32 {
        1
    }
    fn default_read_interval() -> i64 {
        30
    }
    fn default_retry_limit() -> i64 {
        3
    }
    fn default_read_timeout_ms() -> i64 {
        2000
    }
    fn default_sea_level_pressure() -> f64 {
        1013.25
    }

    pub fn device_path(&self) -> PathBuf {
        self.i2c_device
            .clone()
            .unwrap_or_else(|| PathBuf::from(format!("/dev/i2c-{}", self.i2c_bus)))
    }

    pub fn read_interval(&self) -> Duration {
        Duration::from_secs(self.read_interval.unsigned_abs())
    }

    pub fn retry_limit(&self) -> u32 {
        self.retry_limit.clamp(1, u32::MAX as i64) as u32
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_millis(self.read_timeout_ms.unsigned_abs())
    }
}

/// 7-bit i2c address. accepts an integer (`118`, or `0x76` as yaml reads it) or a string (`"0x76"`)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct I2cAddress(pub u8);

impl I2cAddress {
    /// lowest and highest non-reserved 7 bit addresses
    const MIN: u8 = 0x03;
    const MAX: u8 = 0x77;

    fn checked(value: i64) -> Result<Self, String> {
        match u8::try_from(value) {
            Ok(addr) if (Self::MIN..=Self::MAX).contains(&addr) => Ok(Self(addr)),
            _ => Err(format!(
                "{value:#x} is not a usable 7-bit i2c address ({:#04x}..={:#04x})",
                Self::MIN,
                Self::MAX
            )),
        }
    }
}

impl FromStr for I2cAddress {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let parsed = match s.strip_prefix("0x").or_else(|| s.strip_prefix("0X")) {
            Some(hex) => i64::from_str_radix(hex, 16),
            None => s.parse::<i64>(),
        };
        let value = parsed.map_err(|e| format!("could not parse {s:?} as an address: {e}"))?;
        Self::checked(value)
    }
}

impl fmt::Display for I2cAddress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#04x}", self.0)
    }
}

impl<'de> Deserialize<'de> for I2cAddress {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct AddrVisitor;
        impl<'de> de::Visitor<'de> for AddrVisitor {
            type Value = I2cAddress;
            fn expecting(&self, f: &mut fmt::Formatter) -> fmt::Result {
                f.write_str("an i2c address as an integer or hex string")
            }
            fn visit_i64<E: de::Error>(self, v: i64) -> Result<Self::Value, E> {
                I2cAddress::checked(v).map_err(E::custom)
            }
            fn visit_u64<E: de::Error>(self, v: u64) -> Result<Self::Value, E> {
                let v = i64::try_from(v).map_err(E::custom)?;
                I2cAddress::checked(v).map_err(E::custom)
            }
            fn visit_str<E: de::Error>(self, v: &str) -> Result<Self::Value, E> {
                v.parse().map_err(E::custom)
            }
        }
        deserializer.deserialize_any(AddrVisitor)
    }
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct Logging {
    /// default filter level, `RUST_LOG` takes precedence
    #[serde(default = "Logging::default_level")]
    pub level: String,
    /// diagnostic log file, in addition to stdout. reopened on SIGHUP
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Logging {
    fn default_level() -> String {
        "info".into()
    }

    pub fn level_filter(&self) -> Result<LevelFilter, ConfigError> {
        LevelFilter::from_str(&self.level)
            .map_err(|e| ConfigError::invalid("logging.level", e.to_string()))
    }
}

impl Default for Logging {
    fn default() -> Self {
        Self {
            level: Self::default_level(),
            file: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputKind {
    /// readings are emitted as log events
    #[default]
    Log,
    /// readings are appended to `path` as JSON lines
    File,
}

#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Default)]
pub struct Output {
    #[serde(default)]
    pub kind: OutputKind,
    #[serde(default)]
    pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Default)]
pub struct Alerts {
    pub temperature_min: Option<f64>,
    pub temperature_max: Option<f64>,
    pub humidity_min: Option<f64>,
    pub humidity_max: Option<f64>,
}

impl Config {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let s = &self.sensor;
        if s.read_interval < 1 {
            return Err(ConfigError::invalid(
                "sensor.read_interval",
                format!("must be a positive number of seconds, got {}", s.read_interval),
            ));
        }
        if s.retry_limit < 1 {
            return Err(ConfigError::invalid(
                "sensor.retry_limit",
                format!("must be at least 1, got {}", s.retry_limit),
            ));
        }
        if s.read_timeout_ms < 1 {
            return Err(ConfigError::invalid(
                "sensor.read_timeout_ms",
                format!("must be at least 1, got {}", s.read_timeout_ms),
            ));
        }
        if !(s.sea_level_pressure.is_finite() && s.sea_level_pressure > 0.0) {
            return Err(ConfigError::invalid(
                "sensor.sea_level_pressure",
                format!("must be a positive pressure in hPa, got {}", s.sea_level_pressure),
            ));
        }
        for (key, offset) in [
            ("sensor.temperature_offset", s.temperature_offset),
            ("sensor.humidity_offset", s.humidity_offset),
            ("sensor.pressure_offset", s.pressure_offset),
        ] {
            if !offset.is_finite() {
                return Err(ConfigError::invalid(key, "must be a finite number"));
            }
        }
        self.logging.level_filter()?;
        if self.output.kind == OutputKind::File && self.output.path.is_none() {
            return Err(ConfigError::invalid(
                "output.path",
                "required when `output.kind` is `file`",
            ));
        }
        let a = &self.alerts;
        for (key, min, max) in [
            ("alerts.temperature_min", a.temperature_min, a.temperature_max),
            ("alerts.humidity_min", a.humidity_min, a.humidity_max),
        ] {
            if let (Some(min), Some(max)) = (min, max) {
                if min > max {
                    return Err(ConfigError::invalid(
                        key,
                        format!("minimum ({min}) is above the maximum ({max})"),
                    ));
                }
            }
        }
        Ok(())
    }
}
