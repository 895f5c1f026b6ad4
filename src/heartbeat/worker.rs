//! Background clock running in an isolated worker context.
//!
//! The worker owns its own timer and talks to the watchdog only through two
//! one-way queues: [`WorkerCommand`]s in, [`WorkerTick`]s out. Nothing else is
//! shared, so the interval it runs at is always the last one it was told.

use std::time::Duration;

use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tracing::{debug, info};

use super::timer::PeriodicTimer;
use crate::config::BackgroundClockMode;
use crate::error::{Result, WatchdogError};

/// Command sent to the background clock.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerCommand {
    /// Start (or restart) ticking every `interval_ms`.
    Start { interval_ms: u64 },
    /// Stop ticking. Idempotent.
    Stop,
}

/// Tick notification from the background clock. Carries no payload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerTick;

/// Watchdog side of the worker boundary.
#[derive(Debug)]
pub struct WorkerLink {
    commands: mpsc::UnboundedSender<WorkerCommand>,
    ticks: mpsc::UnboundedReceiver<WorkerTick>,
}

/// Worker side of the boundary.
#[derive(Debug)]
pub struct WorkerEndpoint {
    pub commands: mpsc::UnboundedReceiver<WorkerCommand>,
    pub ticks: mpsc::UnboundedSender<WorkerTick>,
}

impl WorkerLink {
    /// Create a connected link/endpoint pair.
    ///
    /// Hand the endpoint to [`run_clock`] or drive it manually in tests.
    pub fn pair() -> (WorkerLink, WorkerEndpoint) {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (tick_tx, tick_rx) = mpsc::unbounded_channel();
        (
            WorkerLink {
                commands: command_tx,
                ticks: tick_rx,
            },
            WorkerEndpoint {
                commands: command_rx,
                ticks: tick_tx,
            },
        )
    }

    /// Post a command to the worker.
    pub fn send(&self, command: WorkerCommand) -> Result<()> {
        self.commands
            .send(command)
            .map_err(|_| WatchdogError::Worker("background clock has exited".to_string()))
    }

    /// Receive the next tick. `None` once the worker has exited.
    pub async fn recv_tick(&mut self) -> Option<WorkerTick> {
        self.ticks.recv().await
    }
}

/// Spawn a background clock according to `mode`.
///
/// Returns `Ok(None)` when the clock is disabled and an error when the
/// requested execution context cannot be created.
pub fn spawn_background_clock(mode: BackgroundClockMode) -> Result<Option<WorkerLink>> {
    match mode {
        BackgroundClockMode::Disabled => Ok(None),
        BackgroundClockMode::Thread => {
            let (link, endpoint) = WorkerLink::pair();
            spawn_thread(endpoint)?;
            Ok(Some(link))
        }
        BackgroundClockMode::Task => {
            let (link, endpoint) = WorkerLink::pair();
            spawn_task(endpoint)?;
            Ok(Some(link))
        }
    }
}

/// Run the clock on a dedicated thread with its own single-threaded runtime.
fn spawn_thread(endpoint: WorkerEndpoint) -> Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .map_err(|e| WatchdogError::Worker(format!("failed to build clock runtime: {}", e)))?;

    std::thread::Builder::new()
        .name("heartbeat-clock".to_string())
        .spawn(move || runtime.block_on(run_clock(endpoint)))
        .map_err(|e| WatchdogError::Worker(format!("failed to spawn clock thread: {}", e)))?;
    Ok(())
}

/// Run the clock as a task on the current runtime.
fn spawn_task(endpoint: WorkerEndpoint) -> Result<()> {
    let handle = Handle::try_current()
        .map_err(|e| WatchdogError::Worker(format!("no tokio runtime for clock task: {}", e)))?;
    handle.spawn(run_clock(endpoint));
    Ok(())
}

/// Background clock loop.
///
/// Exits when the command queue closes (the watchdog went away) or when the
/// tick queue has no receiver left.
pub async fn run_clock(mut endpoint: WorkerEndpoint) {
    let mut timer = PeriodicTimer::new(Duration::from_millis(1));
    debug!("Background clock ready");

    loop {
        tokio::select! {
            command = endpoint.commands.recv() => match command {
                Some(WorkerCommand::Start { interval_ms }) => {
                    timer.set_period(Duration::from_millis(interval_ms));
                    timer.restart();
                    debug!(interval_ms, "Background clock started");
                }
                Some(WorkerCommand::Stop) => {
                    timer.stop();
                    debug!("Background clock stopped");
                }
                None => break,
            },
            _ = timer.tick() => {
                if endpoint.ticks.send(WorkerTick).is_err() {
                    break;
                }
            }
        }
    }

    info!("Background clock exited");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_clock_ticks_after_start() {
        let (mut link, endpoint) = WorkerLink::pair();
        tokio::spawn(run_clock(endpoint));

        link.send(WorkerCommand::Start { interval_ms: 1000 }).unwrap();
        let start = tokio::time::Instant::now();
        assert_eq!(link.recv_tick().await, Some(WorkerTick));
        assert!(start.elapsed() >= Duration::from_millis(1000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_silent_until_started() {
        let (mut link, endpoint) = WorkerLink::pair();
        tokio::spawn(run_clock(endpoint));

        let tick = tokio::time::timeout(Duration::from_secs(30), link.recv_tick()).await;
        assert!(tick.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_clock_stops() {
        let (mut link, endpoint) = WorkerLink::pair();
        tokio::spawn(run_clock(endpoint));

        link.send(WorkerCommand::Start { interval_ms: 100 }).unwrap();
        assert!(link.recv_tick().await.is_some());

        link.send(WorkerCommand::Stop).unwrap();
        link.send(WorkerCommand::Stop).unwrap();
        // Drain a tick that may have been queued before the stop landed.
        tokio::time::sleep(Duration::from_millis(1)).await;
        while link.ticks.try_recv().is_ok() {}

        let tick = tokio::time::timeout(Duration::from_secs(10), link.recv_tick()).await;
        assert!(tick.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_restart_uses_new_interval() {
        let (mut link, endpoint) = WorkerLink::pair();
        tokio::spawn(run_clock(endpoint));

        link.send(WorkerCommand::Start { interval_ms: 100 }).unwrap();
        assert!(link.recv_tick().await.is_some());

        link.send(WorkerCommand::Start { interval_ms: 5000 }).unwrap();
        tokio::time::sleep(Duration::from_millis(1)).await;
        while link.ticks.try_recv().is_ok() {}

        let before = tokio::time::Instant::now();
        assert!(link.recv_tick().await.is_some());
        assert!(before.elapsed() >= Duration::from_millis(4900));
    }

    #[tokio::test]
    async fn test_clock_exits_when_link_dropped() {
        let (link, endpoint) = WorkerLink::pair();
        let handle = tokio::spawn(run_clock(endpoint));
        drop(link);
        tokio::time::timeout(Duration::from_secs(5), handle)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn test_disabled_mode_spawns_nothing() {
        assert!(spawn_background_clock(BackgroundClockMode::Disabled)
            .unwrap()
            .is_none());
    }

    #[test]
    fn test_task_mode_needs_runtime() {
        let err = spawn_background_clock(BackgroundClockMode::Task).unwrap_err();
        assert!(matches!(err, WatchdogError::Worker(_)));
    }

    #[tokio::test]
    async fn test_thread_mode_ticks_on_its_own_clock() {
        let mut link = spawn_background_clock(BackgroundClockMode::Thread)
            .unwrap()
            .unwrap();
        link.send(WorkerCommand::Start { interval_ms: 20 }).unwrap();

        let tick = tokio::time::timeout(Duration::from_secs(5), link.recv_tick())
            .await
            .unwrap();
        assert_eq!(tick, Some(WorkerTick));
        link.send(WorkerCommand::Stop).unwrap();
    }

    #[test]
    fn test_send_fails_after_worker_exit() {
        let (link, endpoint) = WorkerLink::pair();
        drop(endpoint);
        assert!(link.send(WorkerCommand::Stop).is_err());
    }
}
