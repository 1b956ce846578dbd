//! Scripted sensor for tests

use std::{
    collections::VecDeque,
    sync::{
        atomic::{AtomicU32, Ordering::SeqCst},
        Arc,
    },
    time::Duration,
};

use super::{Measurement, Sensor};
use crate::error::SensorError;

/// what the mock did, shared with the test after the mock is moved into a monitor
#[derive(Debug, Default)]
pub struct MockStats {
    pub opens: AtomicU32,
    pub reads: AtomicU32,
    pub closes: AtomicU32,
    in_flight: AtomicU32,
    pub max_in_flight: AtomicU32,
}

impl MockStats {
    pub fn opens(&self) -> u32 {
        self.opens.load(SeqCst)
    }
    pub fn reads(&self) -> u32 {
        self.reads.load(SeqCst)
    }
    pub fn closes(&self) -> u32 {
        self.closes.load(SeqCst)
    }
    pub fn max_in_flight(&self) -> u32 {
        self.max_in_flight.load(SeqCst)
    }
}

pub struct MockSensor {
    script: VecDeque<Result<Measurement, SensorError>>,
    /// returned once the script runs out
    fallback: Result<Measurement, SensorError>,
    open_error: Option<SensorError>,
    latency: Duration,
    stats: Arc<MockStats>,
}

impl MockSensor {
    pub fn steady(temperature: f64, humidity: f64) -> Self {
        Self {
            script: VecDeque::new(),
            fallback: Ok(Measurement {
                temperature,
                humidity,
                pressure: None,
            }),
            open_error: None,
            latency: Duration::ZERO,
            stats: Default::default(),
        }
    }

    pub fn failing() -> Self {
        Self {
            fallback: Err(SensorError::Read("checksum mismatch".into())),
            ..Self::steady(0.0, 0.0)
        }
    }

    pub fn unavailable() -> Self {
        Self {
            open_error: Some(SensorError::Unavailable("no ACK at 0x76".into())),
            ..Self::steady(0.0, 0.0)
        }
    }

    /// results returned (in order) before falling back to the default behaviour
    pub fn with_script(mut self, script: Vec<Result<Measurement, SensorError>>) -> Self {
        self.script = script.into();
        self
    }

    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = latency;
        self
    }

    pub fn stats(&self) -> Arc<MockStats> {
        self.stats.clone()
    }
}

#[async_trait]
impl Sensor for MockSensor {
    fn describe(&self) -> String {
        "mock sensor".into()
    }

    async fn open(&mut self) -> Result<(), SensorError> {
        self.stats.opens.fetch_add(1, SeqCst);
        match &self.open_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn read_measurement(&mut self) -> Result<Measurement, SensorError> {
        self.stats.reads.fetch_add(1, SeqCst);
        let now = self.stats.in_flight.fetch_add(1, SeqCst) + 1;
        self.stats.max_in_flight.fetch_max(now, SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.stats.in_flight.fetch_sub(1, SeqCst);
        self.script
            .pop_front()
            .unwrap_or_else(|| self.fallback.clone())
    }

    fn close(&mut self) {
        self.stats.closes.fetch_add(1, SeqCst);
    }
}

#[tokio::test]
async fn close_is_idempotent() {
    let mut sensor = MockSensor::steady(21.5, 45.0);
    let stats = sensor.stats();
    sensor.open().await.unwrap();
    sensor.close();
    sensor.close();
    assert_eq!(stats.closes(), 2);
}
