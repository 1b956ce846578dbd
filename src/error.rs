use std::{fmt::Debug, path::PathBuf};

/// `sysexits.h` codes, so systemd logs something more useful than `status=1`
pub const EX_UNAVAILABLE: u8 = 69;
pub const EX_CONFIG: u8 = 78;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("configuration file {0:?} does not exist")]
    Missing(PathBuf),
    #[error("failed to read configuration: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed configuration: {0}")]
    Parse(#[from] config::ConfigError),
    #[error("invalid value for `{key}`: {reason}")]
    Invalid { key: &'static str, reason: String },
}

impl ConfigError {
    pub fn invalid(key: &'static str, reason: impl Into<String>) -> Self {
        Self::Invalid {
            key,
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error)]
pub enum SensorError {
    /// the device could not be opened, or did not respond at its address
    #[error("sensor unavailable: {0}")]
    Unavailable(String),
    /// communication / checksum / compensation failure during a measurement
    #[error("sensor read failed: {0}")]
    Read(String),
    #[error("sensor read timed out after {0:?}")]
    Timeout(std::time::Duration),
}

impl SensorError {
    /// wraps a driver error, which (for embedded-hal drivers) usually only implements Debug
    pub fn read(error: impl Debug) -> Self {
        Self::Read(format!("{error:?}"))
    }

    pub fn unavailable(error: impl Debug) -> Self {
        Self::Unavailable(format!("{error:?}"))
    }
}

/// Failure to write a reading somewhere. never fatal
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("i/o error writing reading: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode reading: {0}")]
    Encode(#[from] serde_json::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum DaemonError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("sensor failed {attempts} time(s) in a row, giving up (last error: {last})")]
    SensorFatal { attempts: u32, last: SensorError },
    #[error("sensor self-test failed: {0}")]
    SelfTest(SensorError),
    #[error("runtime failure: {0}")]
    Runtime(String),
}

impl DaemonError {
    pub fn exit_code(&self) -> u8 {
        match self {
            Self::Config(..) => EX_CONFIG,
            Self::SensorFatal { .. } | Self::SelfTest(..) => EX_UNAVAILABLE,
            Self::Runtime(..) => 1,
        }
    }
}

/// exit code for an error that made it all the way out of `main`
pub fn exit_code_for(error: &anyhow::Error) -> u8 {
    if let Some(daemon) = error.downcast_ref::<DaemonError>() {
        daemon.exit_code()
    } else if error.downcast_ref::<ConfigError>().is_some() {
        EX_CONFIG
    } else {
        1
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn exit_codes() {
        let cfg: anyhow::Error = ConfigError::invalid("sensor.read_interval", "must be >= 1").into();
        assert_eq!(exit_code_for(&cfg), EX_CONFIG);

        let fatal: anyhow::Error = DaemonError::SensorFatal {
            attempts: 3,
            last: SensorError::Read("nack".into()),
        }
        .into();
        assert_eq!(exit_code_for(&fatal), EX_UNAVAILABLE);

        let other = anyhow::anyhow!("something else");
        assert_eq!(exit_code_for(&other), 1);
    }
}
