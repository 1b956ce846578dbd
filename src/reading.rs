//! Readings: a calibrated, timestamped, validated measurement

use std::fmt;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::{
    daemon::config::{self, Alerts},
    sensor::Measurement,
};

/// BME280 operating range (datasheet section 1). anything outside it is the sensor lying
pub const TEMPERATURE_RANGE: (f64, f64) = (-40.0, 85.0);
pub const HUMIDITY_RANGE: (f64, f64) = (0.0, 100.0);
pub const PRESSURE_RANGE: (f64, f64) = (300.0, 1100.0);

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reading {
    pub timestamp: DateTime<Utc>,
    /// °C
    pub temperature: f64,
    /// %RH
    pub humidity: f64,
    /// hPa
    pub pressure: Option<f64>,
    /// meters, estimated from pressure
    pub altitude: Option<f64>,
    /// false if any value is outside of what the sensor can physically report
    pub valid: bool,
}

impl fmt::Display for Reading {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: {:.2}°C, {:.2}%RH",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.temperature,
            self.humidity
        )?;
        if let Some(pressure) = self.pressure {
            write!(f, ", {pressure:.2} hPa")?;
        }
        if let Some(altitude) = self.altitude {
            write!(f, ", ~{altitude:.1} m")?;
        }
        if !self.valid {
            write!(f, " (INVALID)")?;
        }
        Ok(())
    }
}

/// Per-device offsets (the BME280 self-heats, and boards differ)
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibration {
    pub temperature_offset: f64,
    pub humidity_offset: f64,
    pub pressure_offset: f64,
    /// hPa
    pub sea_level_pressure: f64,
}

impl Default for Calibration {
    fn default() -> Self {
        Self {
            temperature_offset: 0.0,
            humidity_offset: 0.0,
            pressure_offset: 0.0,
            sea_level_pressure: 1013.25,
        }
    }
}

impl From<&config::Sensor> for Calibration {
    fn from(cfg: &config::Sensor) -> Self {
        Self {
            temperature_offset: cfg.temperature_offset,
            humidity_offset: cfg.humidity_offset,
            pressure_offset: cfg.pressure_offset,
            sea_level_pressure: cfg.sea_level_pressure,
        }
    }
}

impl Calibration {
    pub fn apply(&self, raw: Measurement, timestamp: DateTime<Utc>) -> Reading {
        let temperature = raw.temperature + self.temperature_offset;
        let humidity = raw.humidity + self.humidity_offset;
        let pressure = raw.pressure.map(|p| p + self.pressure_offset);
        let altitude = pressure.map(|p| altitude(p, self.sea_level_pressure));
        let valid = in_range(temperature, TEMPERATURE_RANGE)
            && in_range(humidity, HUMIDITY_RANGE)
            && pressure.map_or(true, |p| in_range(p, PRESSURE_RANGE));
        Reading {
            timestamp,
            temperature,
            humidity,
            pressure,
            altitude,
            valid,
        }
    }
}

fn in_range(value: f64, (min, max): (f64, f64)) -> bool {
    value.is_finite() && value >= min && value <= max
}

/// International barometric formula, both pressures in hPa
pub fn altitude(pressure: f64, sea_level_pressure: f64) -> f64 {
    44330.0 * (1.0 - (pressure / sea_level_pressure).powf(0.1903))
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Alert {
    TemperatureLow { value: f64, limit: f64 },
    TemperatureHigh { value: f64, limit: f64 },
    HumidityLow { value: f64, limit: f64 },
    HumidityHigh { value: f64, limit: f64 },
}

impl fmt::Display for Alert {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TemperatureLow { value, limit } => {
                write!(f, "temperature {value:.2}°C is below {limit:.2}°C")
            }
            Self::TemperatureHigh { value, limit } => {
                write!(f, "temperature {value:.2}°C is above {limit:.2}°C")
            }
            Self::HumidityLow { value, limit } => {
                write!(f, "humidity {value:.2}%RH is below {limit:.2}%RH")
            }
            Self::HumidityHigh { value, limit } => {
                write!(f, "humidity {value:.2}%RH is above {limit:.2}%RH")
            }
        }
    }
}

/// Thresholds the reading crosses. invalid readings never alert
pub fn check_alerts(alerts: &Alerts, reading: &Reading) -> Vec<Alert> {
    let mut out = vec![];
    if !reading.valid {
        return out;
    }
    let (t, h) = (reading.temperature, reading.humidity);
    if let Some(limit) = alerts.temperature_min.filter(|l| t < *l) {
        out.push(Alert::TemperatureLow { value: t, limit });
    }
    if let Some(limit) = alerts.temperature_max.filter(|l| t > *l) {
        out.push(Alert::TemperatureHigh { value: t, limit });
    }
    if let Some(limit) = alerts.humidity_min.filter(|l| h < *l) {
        out.push(Alert::HumidityLow { value: h, limit });
    }
    if let Some(limit) = alerts.humidity_max.filter(|l| h > *l) {
        out.push(Alert::HumidityHigh { value: h, limit });
    }
    out
}
