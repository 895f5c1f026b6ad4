//! Demo command - scripted run against an in-memory server.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use netwatch::channels::{
    InboundEvent, LoopbackChannel, CLIENT_HEARTBEAT, SET_HEARTBEAT_EMIT_INTERVAL,
};
use netwatch::config::{BackgroundClockMode, WatchdogConfig};
use netwatch::watchdog::{LogIndicator, Watchdog};
use tokio::sync::mpsc;

/// One step of the scripted scenario.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum Step {
    Connectivity(bool),
    Directive(serde_json::Value),
}

/// Scenario for a run of `seconds`: come online, speed the heartbeat up,
/// drop offline for a while, come back.
pub(crate) fn scenario(seconds: u64) -> Vec<(Duration, Step)> {
    let total = Duration::from_secs(seconds.max(4));
    vec![
        (Duration::ZERO, Step::Connectivity(true)),
        (total / 4, Step::Directive(serde_json::json!("1"))),
        (total / 2, Step::Connectivity(false)),
        (total * 3 / 4, Step::Connectivity(true)),
    ]
}

pub(crate) async fn cmd_demo(seconds: u64) -> Result<()> {
    let channel = Arc::new(LoopbackChannel::new());
    let config = WatchdogConfig {
        background_clock: BackgroundClockMode::Task,
        ..Default::default()
    };
    let watchdog = Watchdog::new(config, channel.clone())?;
    watchdog.bind_indicator(Arc::new(LogIndicator));

    let (online_tx, online_rx) = mpsc::channel(8);
    watchdog.start(online_rx).await?;

    let started = tokio::time::Instant::now();
    for (at, step) in scenario(seconds) {
        tokio::time::sleep_until(started + at).await;
        println!("[{:>5.1}s] {:?}", at.as_secs_f64(), step);
        match step {
            Step::Connectivity(online) => online_tx.send(online).await?,
            Step::Directive(payload) => {
                channel.inject(InboundEvent::new(SET_HEARTBEAT_EMIT_INTERVAL, payload));
            }
        }
    }
    tokio::time::sleep_until(started + Duration::from_secs(seconds.max(4))).await;
    watchdog.shutdown().await;

    println!();
    println!("{} heartbeats emitted:", channel.emitted_count(CLIENT_HEARTBEAT));
    for event in channel.emitted() {
        println!("  {} {}", event.at.format("%H:%M:%S%.3f"), event.name);
    }
    println!();
    println!("{}", serde_json::to_string_pretty(&watchdog.status())?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scenario_is_ordered() {
        let steps = scenario(12);
        assert_eq!(steps.len(), 4);
        assert!(steps.windows(2).all(|w| w[0].0 <= w[1].0));
        assert_eq!(steps[0].1, Step::Connectivity(true));
        assert_eq!(steps[2], (Duration::from_secs(6), Step::Connectivity(false)));
    }

    #[test]
    fn test_scenario_minimum_length() {
        let steps = scenario(0);
        assert_eq!(steps[3].0, Duration::from_secs(3));
    }

    #[tokio::test(start_paused = true)]
    async fn test_demo_runs() {
        cmd_demo(8).await.unwrap();
    }
}
