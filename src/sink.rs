//! Log sinks: where readings end up

use crate::{
    daemon::config::{Output, OutputKind},
    error::SinkError,
    misc::{paths::ensure_parent_exists, Flag},
    reading::Reading,
};

pub mod file;

pub use file::FileSink;

/// Somewhere to put readings.
///
/// errors are reported to the caller, which logs them and moves on. a lost reading is not worth a restart
pub trait ReadingSink: Send {
    fn emit(&mut self, reading: &Reading) -> Result<(), SinkError>;
}

impl<T: ReadingSink + ?Sized> ReadingSink for Box<T> {
    fn emit(&mut self, reading: &Reading) -> Result<(), SinkError> {
        (**self).emit(reading)
    }
}

/// Readings as structured log events (target `reading`)
#[derive(Debug, Default)]
pub struct TracingSink;

impl ReadingSink for TracingSink {
    fn emit(&mut self, r: &Reading) -> Result<(), SinkError> {
        info!(
            target: "reading",
            timestamp = %r.timestamp.to_rfc3339(),
            temperature = r.temperature,
            humidity = r.humidity,
            pressure = r.pressure,
            altitude = r.altitude,
            valid = r.valid,
            "{r}"
        );
        Ok(())
    }
}

/// Builds the configured sink.
///
/// If the readings file can not be opened, readings go to the log instead of failing startup
pub fn from_config(output: &Output, rotate: &Flag) -> Box<dyn ReadingSink> {
    match (output.kind, &output.path) {
        (OutputKind::File, Some(path)) => {
            let opened = ensure_parent_exists(path)
                .and_then(|()| Ok(FileSink::open(path, rotate.watch())?));
            match opened {
                Ok(sink) => {
                    info!("Writing readings to {path:?}");
                    Box::new(sink)
                }
                Err(e) => {
                    error!("Failed to open readings file {path:?}: {e:#}, logging readings instead");
                    Box::new(TracingSink)
                }
            }
        }
        _ => Box::new(TracingSink),
    }
}

#[cfg(test)]
mod test {
    use std::path::PathBuf;

    use chrono::Utc;
    use tracing_test::traced_test;

    use super::*;

    fn reading() -> Reading {
        Reading {
            timestamp: Utc::now(),
            temperature: 21.5,
            humidity: 45.0,
            pressure: None,
            altitude: None,
            valid: true,
        }
    }

    #[test]
    #[traced_test]
    fn unopenable_file_falls_back_to_log() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();
        let output = Output {
            kind: OutputKind::File,
            path: Some(blocker.join("readings.jsonl")),
        };
        let mut sink = from_config(&output, &Flag::new());
        sink.emit(&reading()).unwrap();
        assert!(logs_contain("logging readings instead"));
    }

    #[test]
    fn file_output() {
        let dir = tempfile::tempdir().unwrap();
        let path: PathBuf = dir.path().join("out/readings.jsonl");
        let output = Output {
            kind: OutputKind::File,
            path: Some(path.clone()),
        };
        let mut sink = from_config(&output, &Flag::new());
        sink.emit(&reading()).unwrap();
        assert_eq!(std::fs::read_to_string(path).unwrap().lines().count(), 1);
    }

    #[test]
    fn tracing_sink_never_fails() {
        TracingSink.emit(&reading()).unwrap();
    }
}
