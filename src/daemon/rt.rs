use std::panic::AssertUnwindSafe;

use anyhow::Result;
use clap::Parser;
use tokio::runtime;

use crate::{
    daemon::{
        self,
        args::Args,
        config::Config,
        shutdown::{self, Shutdown},
        Console,
    },
    error::DaemonError,
    misc::Flag,
    monitor::Monitor,
    sensor, sink,
};

pub fn stage0_delegate() -> Result<()> {
    let args = Args::parse();
    stage1_service(args)
}

/// Loads the configuration and sets up logging. nothing is logged (only printed) before this
pub fn stage1_service(args: Args) -> Result<()> {
    eprintln!("Reading configuration from {:?}", args.config);
    let cfg = daemon::config::load(&args.config).map_err(DaemonError::from)?;

    // raised on SIGHUP, reopens every log file
    let rotate = Flag::new();
    let console = if args.test_sensor {
        Console::Stderr
    } else {
        Console::Stdout
    };
    let guard = daemon::init_logging(&cfg.logging, &rotate, console)?;
    info!(
        "{} v{} starting",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION")
    );

    let result = std::panic::catch_unwind(AssertUnwindSafe(move || {
        stage2_async(cfg, args, rotate)
    }));
    match result {
        Ok(inner) => {
            if let Err(e) = &inner {
                error!("Exiting with error: {e:#}");
            } else {
                info!("Exited cleanly");
            }
            drop(guard);
            inner
        }
        Err(err) => {
            error!("Main thread panic! - stuff is likely messed up: {err:?}");
            drop(guard);
            bail!("Main thread panic!");
        }
    }
}

pub fn stage2_async(cfg: Config, args: Args, rotate: Flag) -> Result<()> {
    debug!("Launching async runtime");
    let runtime = runtime::Builder::new_multi_thread().enable_all().build()?;
    runtime.block_on(async_main(cfg, args, rotate))
}

async fn async_main(cfg: Config, args: Args, rotate: Flag) -> Result<()> {
    let mut shutdown = Shutdown::new();
    shutdown::util::trap_signals(shutdown.handle(), rotate.clone())?;

    let sensor = sensor::from_config(&cfg.sensor);
    let sink = sink::from_config(&cfg.output, &rotate);
    let monitor = Monitor::new(&cfg, sensor, sink, shutdown.handle());

    let result = if args.test_sensor {
        self_test_report(monitor).await
    } else {
        monitor.run().await
    };

    shutdown.trigger_shutdown();
    debug!("Waiting for tasks to stop");
    shutdown.wait_for_completion().await;
    Ok(result?)
}

/// runs the self-test and reports on the console (stdout)
async fn self_test_report<S, K>(monitor: Monitor<S, K>) -> Result<(), DaemonError>
where
    S: sensor::Sensor,
    K: sink::ReadingSink,
{
    println!("Testing sensor...");
    match monitor.self_test().await {
        Ok(reading) => {
            println!("Reading: {reading}");
            println!("Sensor connected: yes");
            if !reading.valid {
                println!("WARNING: the reading is outside of the sensor's physical range");
            }
            Ok(())
        }
        Err(e) => {
            println!("Sensor read failed: {e}");
            println!("Sensor connected: no");
            Err(e)
        }
    }
}
