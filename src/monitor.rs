//! The monitoring loop: read, validate, emit, sleep. until told to stop, or the sensor is gone for good

use std::time::Duration;

use tokio::{
    select,
    time::{interval, sleep, timeout, MissedTickBehavior},
};

use crate::{
    daemon::{
        config::{Alerts, Config},
        shutdown::ShutdownHandle,
    },
    error::{DaemonError, SensorError},
    reading::{check_alerts, Calibration, Reading},
    sensor::{Measurement, Sensor},
    sink::ReadingSink,
};

pub mod clock;
pub mod state;

pub use clock::Clock;
pub use state::ServiceState;

/// how long a read that is in flight when shutdown is requested may take to finish
pub const SHUTDOWN_GRACE: Duration = Duration::from_secs(2);
/// delay between attempts to open the sensor at startup
pub const OPEN_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Everything the daemon needs at runtime. owns the sensor exclusively
pub struct Monitor<S: Sensor, K: ReadingSink> {
    sensor: S,
    sink: K,
    shutdown: ShutdownHandle,
    calibration: Calibration,
    alerts: Alerts,
    interval: Duration,
    read_timeout: Duration,
    retry_limit: u32,
    clock: Clock,
    state: ServiceState,
    /// consecutive failed reads
    failures: u32,
    device: String,
}

impl<S: Sensor, K: ReadingSink> Monitor<S, K> {
    pub fn new(cfg: &Config, sensor: S, sink: K, shutdown: ShutdownHandle) -> Self {
        Self {
            sensor,
            sink,
            shutdown,
            calibration: Calibration::from(&cfg.sensor),
            alerts: cfg.alerts,
            interval: cfg.sensor.read_interval(),
            read_timeout: cfg.sensor.read_timeout(),
            retry_limit: cfg.sensor.retry_limit(),
            clock: Clock::start(),
            state: ServiceState::Starting,
            failures: 0,
            device: match &cfg.device.location {
                Some(location) => format!("{} ({location})", cfg.device.name),
                None => cfg.device.name.clone(),
            },
        }
    }

    /// Service mode. returns `Ok` after a requested shutdown, `Err` on a fatal sensor failure.
    ///
    /// The sensor is closed exactly once before this returns, whatever the outcome.
    pub async fn run(mut self) -> Result<(), DaemonError> {
        info!(device = %self.device, "Starting monitor ({})", self.sensor.describe());
        let result = self.run_inner().await;
        if let Err(e) = &result {
            error!("Monitor stopping after fatal error: {e}");
        }
        self.release();
        result
    }

    async fn run_inner(&mut self) -> Result<(), DaemonError> {
        if !self.open_sensor(self.retry_limit).await? {
            return Ok(());
        }
        self.set_state(ServiceState::Running)?;
        info!(
            interval = ?self.interval,
            retry_limit = self.retry_limit,
            "Monitoring -- reading every {:?}",
            self.interval
        );

        // ticks are measured from the start of the previous one. a slow read delays the next tick
        // instead of causing a burst, and since each read is awaited before the next tick no two
        // reads are ever outstanding
        let mut ticker = interval(self.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            select! {
                biased;
                _ = self.shutdown.wait_for_shutdown() => {
                    info!("Shutdown requested");
                    return Ok(());
                }
                _ = ticker.tick() => {}
            }
            let (result, interrupted) = self.read_bounded().await;
            match result {
                Ok(measurement) => {
                    self.on_success(measurement);
                }
                Err(e) if interrupted => {
                    warn!("Read in flight during shutdown failed: {e}");
                }
                Err(e) => self.on_failure(e)?,
            }
            if interrupted {
                info!("Shutdown requested");
                return Ok(());
            }
        }
    }

    /// Self-test mode: open, read once, close. never enters the loop
    pub async fn self_test(mut self) -> Result<Reading, DaemonError> {
        info!("Testing {}", self.sensor.describe());
        let result: Result<Reading, DaemonError> = async {
            self.open_sensor(1).await.map_err(|e| match e {
                DaemonError::SensorFatal { last, .. } => DaemonError::SelfTest(last),
                other => other,
            })?;
            self.set_state(ServiceState::Running)?;
            match self.read_bounded().await.0 {
                Ok(measurement) => Ok(self.on_success(measurement)),
                Err(e) => {
                    error!("Test read failed: {e}");
                    Err(DaemonError::SelfTest(e))
                }
            }
        }
        .await;
        self.release();
        result
    }

    /// Returns false if shutdown was requested while waiting to retry
    async fn open_sensor(&mut self, attempts: u32) -> Result<bool, DaemonError> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.sensor.open().await {
                Ok(()) => {
                    info!("Opened {}", self.sensor.describe());
                    return Ok(true);
                }
                Err(e) if attempt >= attempts => {
                    error!("Failed to open sensor ({attempt}/{attempts}): {e}");
                    return Err(DaemonError::SensorFatal {
                        attempts: attempt,
                        last: e,
                    });
                }
                Err(e) => {
                    warn!("Failed to open sensor ({attempt}/{attempts}): {e}, retrying");
                }
            }
            select! {
                _ = self.shutdown.wait_for_shutdown() => return Ok(false),
                _ = sleep(OPEN_RETRY_DELAY) => {}
            }
        }
    }

    /// One read, bounded by the read timeout.
    ///
    /// if shutdown is requested while the read is in flight, it gets [`SHUTDOWN_GRACE`] to finish.
    /// the second value is true in that case
    async fn read_bounded(&mut self) -> (Result<Measurement, SensorError>, bool) {
        let Self {
            sensor,
            shutdown,
            read_timeout,
            ..
        } = self;
        let limit = *read_timeout;
        let read = timeout(limit, sensor.read_measurement());
        tokio::pin!(read);
        select! {
            biased;
            res = &mut read => (res.unwrap_or(Err(SensorError::Timeout(limit))), false),
            _ = shutdown.wait_for_shutdown() => {
                debug!("Shutdown requested while a read is in flight, letting it finish");
                let res = match timeout(SHUTDOWN_GRACE, read).await {
                    Ok(res) => res.unwrap_or(Err(SensorError::Timeout(limit))),
                    Err(_) => Err(SensorError::Timeout(SHUTDOWN_GRACE)),
                };
                (res, true)
            }
        }
    }

    fn on_success(&mut self, measurement: Measurement) -> Reading {
        let reading = self.calibration.apply(measurement, self.clock.now());
        if self.failures > 0 {
            info!("Sensor recovered after {} failed read(s)", self.failures);
        }
        self.failures = 0;
        // Starting/Degraded/Running all allow this
        let _ = self.set_state(ServiceState::Running);

        if !reading.valid {
            warn!(%reading, "Reading outside of the sensor's physical range, marked invalid");
        }
        if let Err(e) = self.sink.emit(&reading) {
            warn!("Failed to write reading, it is lost: {e}");
        }
        for alert in check_alerts(&self.alerts, &reading) {
            warn!(device = %self.device, "Alert: {alert}");
        }
        reading
    }

    fn on_failure(&mut self, error: SensorError) -> Result<(), DaemonError> {
        self.failures += 1;
        if self.failures >= self.retry_limit {
            error!(
                "Read failed ({}/{}): {error}, giving up",
                self.failures, self.retry_limit
            );
            return Err(DaemonError::SensorFatal {
                attempts: self.failures,
                last: error,
            });
        }
        self.set_state(ServiceState::Degraded)?;
        warn!(
            "Read failed ({}/{}): {error}, retrying next tick",
            self.failures, self.retry_limit
        );
        Ok(())
    }

    fn set_state(&mut self, next: ServiceState) -> Result<(), DaemonError> {
        if !self.state.can_transition_to(next) {
            error!("Illegal state transition {} -> {next}", self.state);
            return Err(DaemonError::Runtime(format!(
                "illegal state transition {} -> {next}",
                self.state
            )));
        }
        if self.state != next {
            info!("State {} -> {next}", self.state);
            self.state = next;
        }
        Ok(())
    }

    /// closes the sensor. every exit path of `run` / `self_test` goes through here exactly once
    fn release(&mut self) {
        let _ = self.set_state(ServiceState::Stopping);
        self.sensor.close();
        let _ = self.set_state(ServiceState::Stopped);
        info!("Sensor released");
    }
}
