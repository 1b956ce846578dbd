//! Process plumbing *core* to running the monitor as a service (unlike that in src/misc)

pub mod args;
pub mod config;
pub mod log;
pub mod rt;
pub mod shutdown;

pub use log::{init_logging, Console};
