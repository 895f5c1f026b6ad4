//! Connectivity watchdog - keeps the server heartbeat alive while online.

mod indicator;
mod service;
mod status;

pub use indicator::{LogIndicator, OnlineIndicator};
pub use service::Watchdog;
pub use status::{LinkState, WatchdogStatus};
