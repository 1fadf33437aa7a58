//! Configuration for redock
//!
//! Handles the global configuration file at `~/.config/redock/config.toml`.

mod error;
mod global;

pub use error::*;
pub use global::*;
