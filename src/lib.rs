//! Netwatch - connectivity watchdog that keeps a client heartbeat alive

pub mod channels;
pub mod config;
pub mod connectivity;
pub mod error;
pub mod heartbeat;
pub mod watchdog;

pub use config::Config;
pub use error::{Result, WatchdogError};
pub use watchdog::{Watchdog, WatchdogStatus};
