//! Restartable periodic timer.

use std::time::Duration;

use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};

/// Shortest period a timer accepts; `tokio::time::interval` panics on zero.
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// A periodic timer that can be stopped, restarted and re-timed.
///
/// The first tick after [`start`](Self::start) fires one full period later,
/// not immediately. [`tick`](Self::tick) never completes while the timer is
/// stopped, which makes it safe to poll unconditionally from `tokio::select!`.
#[derive(Debug)]
pub struct PeriodicTimer {
    period: Duration,
    interval: Option<Interval>,
}

impl PeriodicTimer {
    /// Create a stopped timer.
    pub fn new(period: Duration) -> Self {
        Self {
            period: period.max(MIN_PERIOD),
            interval: None,
        }
    }

    /// Current period.
    pub fn period(&self) -> Duration {
        self.period
    }

    /// Whether the timer is running.
    pub fn is_running(&self) -> bool {
        self.interval.is_some()
    }

    /// Start the timer. No effect if already running.
    pub fn start(&mut self) {
        if self.interval.is_none() {
            self.interval = Some(Self::schedule(self.period));
        }
    }

    /// Start the timer, resetting the phase if it was already running.
    pub fn restart(&mut self) {
        self.interval = Some(Self::schedule(self.period));
    }

    /// Stop the timer. Idempotent.
    pub fn stop(&mut self) {
        self.interval = None;
    }

    /// Change the period, keeping the running/stopped state.
    ///
    /// A running timer is rescheduled so the next tick is one new period away.
    pub fn set_period(&mut self, period: Duration) {
        self.period = period.max(MIN_PERIOD);
        if self.interval.is_some() {
            self.interval = Some(Self::schedule(self.period));
        }
    }

    /// Wait for the next tick. Pending forever while stopped.
    pub async fn tick(&mut self) -> Instant {
        match self.interval.as_mut() {
            Some(interval) => interval.tick().await,
            None => std::future::pending().await,
        }
    }

    fn schedule(period: Duration) -> Interval {
        let mut interval = interval_at(Instant::now() + period, period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        interval
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_timer_is_stopped() {
        let timer = PeriodicTimer::new(Duration::from_secs(2));
        assert!(!timer.is_running());
        assert_eq!(timer.period(), Duration::from_secs(2));
    }

    #[test]
    fn test_zero_period_is_raised() {
        let timer = PeriodicTimer::new(Duration::ZERO);
        assert_eq!(timer.period(), MIN_PERIOD);
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_after_one_period() {
        let mut timer = PeriodicTimer::new(Duration::from_secs(2));
        let started = Instant::now();
        timer.start();
        let fired = timer.tick().await;
        assert_eq!(fired - started, Duration::from_secs(2));
    }

    #[tokio::test(start_paused = true)]
    async fn test_stopped_timer_never_ticks() {
        let mut timer = PeriodicTimer::new(Duration::from_millis(10));
        let result = tokio::time::timeout(Duration::from_secs(5), timer.tick()).await;
        assert!(result.is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let mut timer = PeriodicTimer::new(Duration::from_millis(10));
        timer.start();
        timer.stop();
        timer.stop();
        assert!(!timer.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn test_set_period_while_running() {
        let mut timer = PeriodicTimer::new(Duration::from_secs(2));
        timer.start();
        timer.set_period(Duration::from_secs(5));
        assert!(timer.is_running());

        let before = Instant::now();
        let fired = timer.tick().await;
        assert_eq!(fired - before, Duration::from_secs(5));
    }

    #[test]
    fn test_set_period_while_stopped_stays_stopped() {
        let mut timer = PeriodicTimer::new(Duration::from_secs(2));
        timer.set_period(Duration::from_secs(5));
        assert!(!timer.is_running());
        assert_eq!(timer.period(), Duration::from_secs(5));
    }
}
