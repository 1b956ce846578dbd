//! Miscilaneous *non core related* utilities

pub mod flag;
pub mod paths;
pub mod reopen;

pub use flag::{Flag, FlagWatch};
pub use reopen::ReopenableFile;
