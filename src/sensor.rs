//! Sensor interface: anything that can produce temperature / humidity (/ pressure) measurements

use crate::{
    daemon::config::{self, Transport},
    error::SensorError,
};

pub mod bme280;
#[cfg(test)]
pub mod mock;
pub mod simulated;

pub use self::bme280::Bme280Sensor;
pub use simulated::SimulatedSensor;

/// Raw values as reported by the device, before calibration
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Measurement {
    /// °C
    pub temperature: f64,
    /// %RH
    pub humidity: f64,
    /// hPa, if the device measures it
    pub pressure: Option<f64>,
}

/// A sensor the monitor owns for its entire lifetime.
///
/// `open` is called once before any reads, `close` at least once on every exit path.
#[async_trait]
pub trait Sensor: Send {
    /// human readable name, for logs
    fn describe(&self) -> String;

    /// Connects to the device. fails with [`SensorError::Unavailable`] if it does not respond
    async fn open(&mut self) -> Result<(), SensorError>;

    /// Takes one measurement. failures are reported, retrying is up to the caller
    async fn read_measurement(&mut self) -> Result<Measurement, SensorError>;

    /// Releases the device. must be idempotent, and safe after any failure
    fn close(&mut self);
}

#[async_trait]
impl<T: Sensor + ?Sized> Sensor for Box<T> {
    fn describe(&self) -> String {
        (**self).describe()
    }
    async fn open(&mut self) -> Result<(), SensorError> {
        (**self).open().await
    }
    async fn read_measurement(&mut self) -> Result<Measurement, SensorError> {
        (**self).read_measurement().await
    }
    fn close(&mut self) {
        (**self).close()
    }
}

/// Picks the sensor implementation for the configured transport
pub fn from_config(cfg: &config::Sensor) -> Box<dyn Sensor> {
    match cfg.transport {
        Transport::I2c => Box::new(Bme280Sensor::linux(cfg.device_path(), cfg.i2c_address)),
        Transport::Simulated => Box::new(SimulatedSensor::new()),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn transport_selection() {
        let cfg = config::from_str("sensor:\n  i2c_address: 0x76\n  transport: simulated\n")
            .unwrap();
        assert!(from_config(&cfg.sensor).describe().contains("simulated"));
        let cfg = config::from_str("sensor:\n  i2c_address: 0x76\n  i2c_bus: 3\n").unwrap();
        let desc = from_config(&cfg.sensor).describe();
        assert!(desc.contains("/dev/i2c-3") && desc.contains("0x76"), "{desc}");
    }
}
