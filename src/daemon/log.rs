use std::io::IsTerminal;

use anyhow::Result;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_log::LogTracer;
use tracing_subscriber::{fmt::Layer, prelude::*, registry, EnvFilter};

use crate::{
    daemon::config::Logging,
    misc::{paths::ensure_parent_exists, Flag, ReopenableFile},
};

/// Keeps the background log writers alive, logs written just before this is dropped are flushed
pub struct Guard {
    _stdio: WorkerGuard,
    _file: Option<WorkerGuard>,
}

/// where human facing log output goes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Console {
    /// service mode, picked up by the journal
    Stdout,
    /// self-test mode, so stdout only carries the test report
    Stderr,
}

/// Sets up the global subscriber.
///
/// The default level comes from the config, `RUST_LOG` overrides it. If a log file is configured it
/// is written in addition to the console, and reopened after each `rotate` signal (SIGHUP).
pub fn init_logging(cfg: &Logging, rotate: &Flag, console: Console) -> Result<Guard> {
    let global_filter = EnvFilter::builder()
        .with_default_directive(cfg.level_filter()?.into())
        .from_env()?;

    let (stdio, stdio_guard, ansi) = match console {
        Console::Stdout => {
            let ansi = std::io::stdout().is_terminal();
            let (w, g) = tracing_appender::non_blocking(std::io::stdout());
            (w, g, ansi)
        }
        Console::Stderr => {
            let ansi = std::io::stderr().is_terminal();
            let (w, g) = tracing_appender::non_blocking(std::io::stderr());
            (w, g, ansi)
        }
    };
    let stdio_layer = Layer::new().with_writer(stdio).with_ansi(ansi).compact();

    let (logfile_layer, file_guard) = match &cfg.file {
        Some(path) => {
            ensure_parent_exists(path)?;
            let file = ReopenableFile::open(path, rotate.watch())?;
            let (logfile, guard) = tracing_appender::non_blocking(file);
            let layer = Layer::new().with_writer(logfile).with_ansi(false).compact();
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    tracing::subscriber::set_global_default(
        registry()
            .with(global_filter)
            .with(logfile_layer)
            .with(stdio_layer),
    )?;
    LogTracer::init()?;
    Ok(Guard {
        _stdio: stdio_guard,
        _file: file_guard,
    })
}
