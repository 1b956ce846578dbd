use chrono::{Local, Timelike};
use rand::{rngs::StdRng, Rng, SeedableRng};

use super::{Measurement, Sensor};
use crate::error::SensorError;

const BASE_TEMPERATURE: f64 = 22.0;
const BASE_HUMIDITY: f64 = 45.0;
const BASE_PRESSURE: f64 = 1013.25;

/// Fake sensor for running without hardware. follows a rough day / night temperature cycle
pub struct SimulatedSensor {
    rng: StdRng,
    open: bool,
}

impl SimulatedSensor {
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    pub fn with_rng(rng: StdRng) -> Self {
        Self { rng, open: false }
    }

    fn sample(&mut self, hour: u32) -> Measurement {
        Measurement {
            temperature: BASE_TEMPERATURE + diurnal_offset(hour) + self.rng.gen_range(-0.5..=0.5),
            humidity: BASE_HUMIDITY + self.rng.gen_range(-5.0..=5.0),
            pressure: Some(BASE_PRESSURE + self.rng.gen_range(-10.0..=10.0)),
        }
    }
}

impl Default for SimulatedSensor {
    fn default() -> Self {
        Self::new()
    }
}

/// colder at night (02-06h), warmer in the afternoon (12-16h)
fn diurnal_offset(hour: u32) -> f64 {
    match hour {
        2..=6 => -3.0,
        12..=16 => 3.0,
        _ => 0.0,
    }
}

#[async_trait]
impl Sensor for SimulatedSensor {
    fn describe(&self) -> String {
        "simulated BME280".into()
    }

    async fn open(&mut self) -> Result<(), SensorError> {
        warn!("Using a simulated sensor, readings are not real");
        self.open = true;
        Ok(())
    }

    async fn read_measurement(&mut self) -> Result<Measurement, SensorError> {
        if !self.open {
            return Err(SensorError::Unavailable("sensor is not open".into()));
        }
        Ok(self.sample(Local::now().hour()))
    }

    fn close(&mut self) {
        self.open = false;
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn day_night_cycle() {
        assert_eq!(diurnal_offset(4), -3.0);
        assert_eq!(diurnal_offset(14), 3.0);
        assert_eq!(diurnal_offset(9), 0.0);
        assert_eq!(diurnal_offset(23), 0.0);
    }

    #[test]
    fn samples_stay_near_baseline() {
        let mut sensor = SimulatedSensor::with_rng(StdRng::seed_from_u64(7));
        for hour in 0..24 {
            let m = sensor.sample(hour);
            assert!((m.temperature - BASE_TEMPERATURE).abs() <= 3.5, "{m:?}");
            assert!((m.humidity - BASE_HUMIDITY).abs() <= 5.0, "{m:?}");
            let p = m.pressure.unwrap();
            assert!((p - BASE_PRESSURE).abs() <= 10.0, "{m:?}");
        }
    }

    #[tokio::test]
    async fn must_be_opened() {
        let mut sensor = SimulatedSensor::with_rng(StdRng::seed_from_u64(1));
        sensor.read_measurement().await.unwrap_err();
        sensor.open().await.unwrap();
        sensor.read_measurement().await.unwrap();
        sensor.close();
        sensor.close();
        sensor.read_measurement().await.unwrap_err();
    }
}
