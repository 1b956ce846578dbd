use std::{
    path::PathBuf,
    sync::{Arc, Mutex},
};

use ::bme280::{i2c::BME280, Measurements};
use embedded_hal::{delay::DelayNs, i2c::I2c};
use linux_embedded_hal::{Delay, I2cdev};
use tokio::task::{spawn_blocking, JoinError, JoinHandle};

use super::{Measurement, Sensor};
use crate::{daemon::config::I2cAddress, error::SensorError};

/// opens the bus. called again whenever the device has to be rebuilt from scratch
type Connect<T, D> = Box<dyn FnMut() -> Result<(T, D), SensorError> + Send>;

/// BME280 on an i2c bus.
///
/// Every bus transaction runs on the blocking pool, so the caller's timeouts keep working
/// even when the bus hangs. A read that is abandoned takes the device with it, and the next
/// read opens it again.
pub struct Bme280Sensor<T: I2c, D: DelayNs> {
    name: String,
    address: I2cAddress,
    connect: Arc<Mutex<Connect<T, D>>>,
    /// `None` while closed, or while a read is out on the blocking pool
    device: Option<Device<T, D>>,
    /// between a successful `open` and `close`
    opened: bool,
}

struct Device<T: I2c, D: DelayNs> {
    bme: BME280<T>,
    delay: D,
    /// set after a failed read. the chip may have browned out and lost its configuration
    needs_init: bool,
}

impl Bme280Sensor<I2cdev, Delay> {
    /// a BME280 at `address` on the linux i2c device node `device` (e.g. `/dev/i2c-1`)
    pub fn linux(device: PathBuf, address: I2cAddress) -> Self {
        let name = format!("BME280 at {address} on {}", device.display());
        Self::new(
            name,
            address,
            Box::new(move || {
                let bus = I2cdev::new(&device).map_err(SensorError::unavailable)?;
                Ok((bus, Delay))
            }),
        )
    }
}

impl<T, D> Bme280Sensor<T, D>
where
    T: I2c + Send + 'static,
    D: DelayNs + Send + 'static,
{
    pub fn new(name: String, address: I2cAddress, connect: Connect<T, D>) -> Self {
        Self {
            name,
            address,
            connect: Arc::new(Mutex::new(connect)),
            device: None,
            opened: false,
        }
    }

    /// connects and initializes on the blocking pool
    fn connect(&self) -> JoinHandle<Result<Device<T, D>, SensorError>> {
        let connect = self.connect.clone();
        let address = self.address;
        spawn_blocking(move || {
            let mut connect = connect
                .lock()
                .map_err(|_| SensorError::Unavailable("bus connector poisoned".into()))?;
            let (bus, delay) = (&mut **connect)()?;
            Device::init(bus, delay, address)
        })
    }
}

impl<T: I2c, D: DelayNs> Device<T, D> {
    fn init(bus: T, mut delay: D, address: I2cAddress) -> Result<Self, SensorError> {
        let mut bme = BME280::new(bus, address.0);
        bme.init(&mut delay).map_err(SensorError::unavailable)?;
        Ok(Self {
            bme,
            delay,
            needs_init: false,
        })
    }

    fn read(&mut self) -> Result<Measurement, SensorError> {
        let result = self.measure();
        if result.is_err() {
            self.needs_init = true;
        }
        result
    }

    fn measure(&mut self) -> Result<Measurement, SensorError> {
        if self.needs_init {
            // re-init, if connected it will work.
            self.bme.init(&mut self.delay).map_err(SensorError::read)?;
            self.needs_init = false;
            // the first measurement after init can be stale
            let _ = self.bme.measure(&mut self.delay).map_err(SensorError::read)?;
        }
        let Measurements {
            temperature,
            humidity,
            pressure,
            ..
        } = self.bme.measure(&mut self.delay).map_err(SensorError::read)?;
        Ok(Measurement {
            temperature: temperature as f64,
            humidity: humidity as f64,
            // the driver reports Pa
            pressure: Some(pressure as f64 / 100.0),
        })
    }
}

fn lost(error: JoinError) -> SensorError {
    SensorError::Read(format!("sensor task failed: {error}"))
}

#[async_trait]
impl<T, D> Sensor for Bme280Sensor<T, D>
where
    T: I2c + Send + 'static,
    D: DelayNs + Send + 'static,
{
    fn describe(&self) -> String {
        self.name.clone()
    }

    async fn open(&mut self) -> Result<(), SensorError> {
        self.device = Some(self.connect().await.map_err(lost)??);
        self.opened = true;
        Ok(())
    }

    async fn read_measurement(&mut self) -> Result<Measurement, SensorError> {
        let mut device = match self.device.take() {
            Some(device) => device,
            None if self.opened => {
                warn!("{} was dropped by an abandoned read, reopening", self.name);
                self.connect().await.map_err(lost)??
            }
            None => return Err(SensorError::Unavailable("sensor is not open".into())),
        };
        // if this future is dropped (timeout, shutdown) the device goes with the blocking task
        let (device, result) = spawn_blocking(move || {
            let result = device.read();
            (device, result)
        })
        .await
        .map_err(lost)?;
        self.device = Some(device);
        result
    }

    fn close(&mut self) {
        self.opened = false;
        if self.device.take().is_some() {
            debug!("Closed {}", self.name);
        }
    }
}
