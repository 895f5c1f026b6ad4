//! Heartbeat building blocks - timers, the background clock and directives.

mod directive;
mod timer;
mod worker;

pub use directive::{interval_ms_from_payload, ServerDirective};
pub use timer::PeriodicTimer;
pub use worker::{
    run_clock, spawn_background_clock, WorkerCommand, WorkerEndpoint, WorkerLink, WorkerTick,
};
