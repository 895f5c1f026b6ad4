//! Watchdog service implementation.

use std::sync::{Arc, Mutex as StdMutex, MutexGuard};
use std::time::Duration;

use chrono::Utc;
use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use super::indicator::OnlineIndicator;
use super::status::WatchdogStatus;
use crate::channels::{InboundEvent, SocketChannel, CLIENT_HEARTBEAT};
use crate::config::WatchdogConfig;
use crate::error::{Result, WatchdogError};
use crate::heartbeat::{
    spawn_background_clock, PeriodicTimer, ServerDirective, WorkerCommand, WorkerLink, WorkerTick,
};

/// Bound indicators together with the value they were last told.
///
/// Binding and notifying both happen under this one lock, so an indicator
/// bound during a transition sees either the old value followed by the new
/// one, or only the new one.
#[derive(Default)]
struct IndicatorSet {
    online: bool,
    bound: Vec<Arc<dyn OnlineIndicator>>,
}

type Indicators = Arc<StdMutex<IndicatorSet>>;

fn lock_indicators(indicators: &Indicators) -> MutexGuard<'_, IndicatorSet> {
    indicators
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Requests from the public handle to the event loop.
#[derive(Debug)]
enum Control {
    SetInterval(u64),
    Shutdown,
}

/// Connectivity watchdog.
///
/// While the platform reports the network as online, a foreground timer
/// emits `client_heartbeat` on the messaging channel every heartbeat
/// interval, and an independent background clock ticks at the same interval
/// so the two can be compared for drift. The server may change the interval
/// at any time with `set_heartbeat_emit_interval`.
///
/// All state lives in a single event loop task started by
/// [`start`](Self::start). The background clock lives in its own execution
/// context and only ever sees explicit `Start`/`Stop` commands.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use netwatch::channels::LoopbackChannel;
/// use netwatch::config::{BackgroundClockMode, WatchdogConfig};
/// use netwatch::watchdog::Watchdog;
///
/// # tokio_test::block_on(async {
/// let channel = Arc::new(LoopbackChannel::new());
/// let config = WatchdogConfig {
///     background_clock: BackgroundClockMode::Disabled,
///     ..Default::default()
/// };
/// let watchdog = Watchdog::new(config, channel).unwrap();
///
/// let (online_tx, online_rx) = tokio::sync::mpsc::channel(4);
/// watchdog.start(online_rx).await.unwrap();
/// online_tx.send(true).await.unwrap();
///
/// let mut status = watchdog.subscribe();
/// status.wait_for(|s| s.on_line).await.unwrap();
/// assert!(watchdog.is_online());
/// watchdog.shutdown().await;
/// # })
/// ```
pub struct Watchdog {
    control: mpsc::UnboundedSender<Control>,
    status: watch::Receiver<WatchdogStatus>,
    indicators: Indicators,
    core: Mutex<Option<WatchdogCore>>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl Watchdog {
    /// Create a watchdog, spawning the background clock configured in
    /// `config.background_clock`.
    ///
    /// If the clock cannot be created the watchdog runs foreground-only for
    /// its whole lifetime; this is logged once and never retried.
    ///
    /// Fails with [`WatchdogError::Config`] if `config` does not validate.
    pub fn new(config: WatchdogConfig, channel: Arc<dyn SocketChannel>) -> Result<Self> {
        config.validate()?;
        let worker = match spawn_background_clock(config.background_clock) {
            Ok(Some(link)) => Some(link),
            Ok(None) => {
                info!("Background clock disabled, using foreground heartbeats only");
                None
            }
            Err(e) => {
                warn!("Background clock unavailable ({}), using foreground heartbeats only", e);
                None
            }
        };
        Self::with_worker(config, channel, worker)
    }

    /// Create a watchdog with an explicit background clock link (or none).
    pub fn with_worker(
        config: WatchdogConfig,
        channel: Arc<dyn SocketChannel>,
        worker: Option<WorkerLink>,
    ) -> Result<Self> {
        config.validate()?;
        let initial = WatchdogStatus::new(config.heartbeat_interval_ms, worker.is_some());
        let (status_tx, status_rx) = watch::channel(initial.clone());
        let (control_tx, control_rx) = mpsc::unbounded_channel();
        let indicators: Indicators = Arc::new(StdMutex::new(IndicatorSet::default()));

        let core = WatchdogCore {
            foreground: PeriodicTimer::new(config.heartbeat_interval()),
            config,
            channel,
            worker,
            status: initial,
            status_tx,
            control: control_rx,
            indicators: Arc::clone(&indicators),
            last_foreground_ping: None,
            last_background_ping: None,
        };

        Ok(Self {
            control: control_tx,
            status: status_rx,
            indicators,
            core: Mutex::new(Some(core)),
            task: Mutex::new(None),
        })
    }

    /// Start observing the online/offline signal and server directives.
    ///
    /// Has no effect if the watchdog was already started.
    pub async fn start(&self, connectivity: mpsc::Receiver<bool>) -> Result<()> {
        let core = {
            let mut slot = self.core.lock().await;
            match slot.take() {
                Some(core) => core,
                None => {
                    warn!("Watchdog already started");
                    return Ok(());
                }
            }
        };

        let inbound = core.channel.subscribe();
        info!(
            "Watchdog started (interval={}ms, background_clock={})",
            core.status.heartbeat_interval_ms,
            core.worker.is_some()
        );

        let handle = tokio::spawn(core.run(connectivity, inbound));
        *self.task.lock().await = Some(handle);
        Ok(())
    }

    /// Change the heartbeat interval locally, as if the server had asked.
    ///
    /// Applied by the event loop; requests made before [`start`](Self::start)
    /// are applied once it runs.
    pub fn set_heartbeat_interval(&self, interval: Duration) -> Result<()> {
        let interval_ms = u64::try_from(interval.as_millis()).unwrap_or(u64::MAX);
        if interval_ms == 0 {
            return Err(WatchdogError::InvalidInterval(format!("{:?}", interval)));
        }
        self.control
            .send(Control::SetInterval(interval_ms))
            .map_err(|_| WatchdogError::Stopped)
    }

    /// Bind an indicator. It receives the current value immediately and every
    /// transition afterwards.
    ///
    /// Indicators are called with an internal lock held and must not bind
    /// further indicators from `set_online`.
    pub fn bind_indicator(&self, indicator: Arc<dyn OnlineIndicator>) {
        let mut indicators = lock_indicators(&self.indicators);
        indicator.set_online(indicators.online);
        indicators.bound.push(indicator);
    }

    /// Whether the platform currently reports connectivity.
    pub fn is_online(&self) -> bool {
        self.status.borrow().on_line
    }

    /// Current heartbeat period.
    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.status.borrow().heartbeat_interval_ms)
    }

    /// Latest status snapshot.
    pub fn status(&self) -> WatchdogStatus {
        self.status.borrow().clone()
    }

    /// Receiver notified on every status change.
    pub fn subscribe(&self) -> watch::Receiver<WatchdogStatus> {
        self.status.clone()
    }

    /// Stop both timers and end the event loop.
    pub async fn shutdown(&self) {
        // Dropping an unstarted core releases its background clock.
        self.core.lock().await.take();

        let _ = self.control.send(Control::Shutdown);
        if let Some(handle) = self.task.lock().await.take() {
            if let Err(e) = handle.await {
                warn!("Watchdog task ended abnormally: {}", e);
            }
        }
    }
}

/// Everything the event loop owns.
struct WatchdogCore {
    config: WatchdogConfig,
    channel: Arc<dyn SocketChannel>,
    worker: Option<WorkerLink>,
    foreground: PeriodicTimer,
    status: WatchdogStatus,
    status_tx: watch::Sender<WatchdogStatus>,
    control: mpsc::UnboundedReceiver<Control>,
    indicators: Indicators,
    last_foreground_ping: Option<Instant>,
    last_background_ping: Option<Instant>,
}

impl WatchdogCore {
    async fn run(
        mut self,
        mut connectivity: mpsc::Receiver<bool>,
        mut inbound: broadcast::Receiver<InboundEvent>,
    ) {
        let mut connectivity_open = true;
        let mut inbound_open = true;

        loop {
            tokio::select! {
                signal = connectivity.recv(), if connectivity_open => match signal {
                    Some(online) => self.apply_online(online),
                    None => {
                        debug!("Connectivity signal closed, keeping state {}", self.status.state());
                        connectivity_open = false;
                    }
                },
                event = inbound.recv(), if inbound_open => match event {
                    Ok(event) => self.handle_event(&event),
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        warn!("Watchdog missed {} inbound events", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => {
                        debug!("Inbound event stream closed");
                        inbound_open = false;
                    }
                },
                control = self.control.recv() => match control {
                    Some(Control::SetInterval(interval_ms)) => self.apply_interval(interval_ms),
                    Some(Control::Shutdown) | None => break,
                },
                tick = next_worker_tick(&mut self.worker) => match tick {
                    Some(WorkerTick) => self.on_background_tick(),
                    None => {
                        warn!("Background clock exited, continuing with foreground heartbeats only");
                        self.worker = None;
                    }
                },
                _ = self.foreground.tick() => self.ping_server().await,
            }
            self.publish();
        }

        self.foreground.stop();
        self.send_worker(WorkerCommand::Stop);
        self.publish();
        info!("Watchdog stopped");
    }

    fn apply_online(&mut self, online: bool) {
        if online == self.status.on_line {
            debug!("Connectivity unchanged ({})", self.status.state());
            return;
        }
        self.status.on_line = online;

        if online {
            self.foreground.start();
            self.send_worker(WorkerCommand::Start {
                interval_ms: self.status.heartbeat_interval_ms,
            });
            info!(
                "Online, heartbeat started (interval={}ms)",
                self.status.heartbeat_interval_ms
            );
        } else {
            self.foreground.stop();
            self.send_worker(WorkerCommand::Stop);
            // Offline gaps would otherwise show up as drift.
            self.last_foreground_ping = None;
            self.last_background_ping = None;
            info!("Offline, heartbeat stopped");
        }

        let mut indicators = lock_indicators(&self.indicators);
        indicators.online = online;
        for indicator in indicators.bound.iter() {
            indicator.set_online(online);
        }
    }

    fn handle_event(&mut self, event: &InboundEvent) {
        match ServerDirective::from_event(event) {
            Some(Ok(ServerDirective::SetHeartbeatInterval { interval_ms })) => {
                self.apply_interval(interval_ms)
            }
            Some(Err(e)) => {
                self.status.rejected_directives += 1;
                warn!("Ignoring {} directive: {}", event.name, e);
            }
            None => {}
        }
    }

    fn apply_interval(&mut self, requested_ms: u64) {
        let interval_ms = self.config.clamp_interval_ms(requested_ms);
        if interval_ms != requested_ms {
            warn!(
                "Heartbeat interval {}ms clamped to {}ms",
                requested_ms, interval_ms
            );
        }
        if interval_ms == self.status.heartbeat_interval_ms {
            debug!("Heartbeat interval unchanged ({}ms)", interval_ms);
            return;
        }

        self.status.heartbeat_interval_ms = interval_ms;
        self.foreground.set_period(Duration::from_millis(interval_ms));
        if self.status.on_line {
            self.send_worker(WorkerCommand::Start { interval_ms });
        }
        info!("Heartbeat interval set to {}ms", interval_ms);
    }

    async fn ping_server(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last_foreground_ping {
            let drift = drift_ms(now - last, self.status.heartbeat_interval_ms);
            self.status.foreground_drift_ms = Some(drift);
            if self.config.log_drift {
                debug!("ping window offset {}ms", drift);
            }
        }
        self.last_foreground_ping = Some(now);
        self.status.last_foreground_ping_at = Some(Utc::now());

        match self.channel.emit(CLIENT_HEARTBEAT, None).await {
            Ok(()) => self.status.heartbeats_sent += 1,
            Err(e) => {
                self.status.emit_failures += 1;
                debug!("Heartbeat not delivered: {}", e);
            }
        }
    }

    fn on_background_tick(&mut self) {
        let now = Instant::now();
        if let Some(last) = self.last_background_ping {
            let drift = drift_ms(now - last, self.status.heartbeat_interval_ms);
            self.status.background_drift_ms = Some(drift);
            if self.config.log_drift {
                debug!("ping worker offset {}ms", drift);
            }
        }
        self.last_background_ping = Some(now);
        self.status.last_background_ping_at = Some(Utc::now());
        self.status.background_ticks += 1;
    }

    fn send_worker(&mut self, command: WorkerCommand) {
        if let Some(worker) = &self.worker {
            if let Err(e) = worker.send(command) {
                warn!("{}, continuing with foreground heartbeats only", e);
                self.worker = None;
            }
        }
    }

    fn publish(&mut self) {
        self.status.foreground_running = self.foreground.is_running();
        self.status.worker_available = self.worker.is_some();

        let snapshot = &self.status;
        self.status_tx.send_if_modified(|current| {
            if current == snapshot {
                false
            } else {
                *current = snapshot.clone();
                true
            }
        });
    }
}

async fn next_worker_tick(worker: &mut Option<WorkerLink>) -> Option<WorkerTick> {
    match worker {
        Some(link) => link.recv_tick().await,
        None => std::future::pending().await,
    }
}

fn drift_ms(elapsed: Duration, interval_ms: u64) -> i64 {
    let elapsed_ms = i64::try_from(elapsed.as_millis()).unwrap_or(i64::MAX);
    elapsed_ms.saturating_sub(i64::try_from(interval_ms).unwrap_or(i64::MAX))
}
