use std::path::PathBuf;

use clap::Parser;

#[derive(Parser, Debug)]
#[command(version, about = "BME280 temperature / humidity monitoring daemon")]
pub struct Args {
    #[arg(long, short, default_value = "config.yaml", help = "config filepath")]
    pub config: PathBuf,
    #[arg(
        long,
        help = "Read the sensor once, print the result and exit (non-zero if the sensor could not be read)"
    )]
    pub test_sensor: bool,
}
