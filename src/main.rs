#[macro_use]
extern crate async_trait;
#[macro_use]
extern crate tracing;
#[macro_use]
extern crate anyhow;

use std::process::ExitCode;

mod daemon;
mod error;
mod misc;
mod monitor;
mod reading;
mod sensor;
mod sink;

fn main() -> ExitCode {
    match daemon::rt::stage0_delegate() {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("ERROR: {e:#}");
            ExitCode::from(error::exit_code_for(&e))
        }
    }
}
