//! Run command - keep a heartbeat flowing to a real server.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use netwatch::channels::WebSocketChannel;
use netwatch::config::Config;
use netwatch::connectivity::ConnectivityProbe;
use netwatch::watchdog::{LogIndicator, Watchdog};

/// How often a status line is printed while running.
const STATUS_EVERY: Duration = Duration::from_secs(30);

pub(crate) struct RunArgs {
    pub url: Option<String>,
    pub probe: Option<String>,
    pub interval_ms: Option<u64>,
    pub clock: Option<String>,
}

/// Fold command-line overrides into the loaded configuration.
pub(crate) fn apply_args(config: &mut Config, args: RunArgs) -> Result<()> {
    if let Some(url) = args.url {
        config.server_url = Some(url);
    }
    if let Some(target) = args.probe {
        config.connectivity.target = Some(target);
    }
    if let Some(interval_ms) = args.interval_ms {
        config.watchdog.heartbeat_interval_ms = interval_ms;
    }
    if let Some(clock) = args.clock {
        config.watchdog.background_clock = clock.parse()?;
    }
    config.watchdog.validate()?;
    Ok(())
}

pub(crate) async fn cmd_run(args: RunArgs) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;
    apply_args(&mut config, args)?;

    let url = config
        .server_url
        .clone()
        .context("No server URL. Pass --url or set NETWATCH_SERVER_URL")?;

    let channel = WebSocketChannel::connect(&url)
        .await
        .with_context(|| format!("Failed to connect to {}", url))?;

    let probe = ConnectivityProbe::new(&config.connectivity);
    println!("Server: {}", url);
    println!(
        "Probe: {}",
        probe.target().unwrap_or("none (assuming online)")
    );
    println!("Interval: {}ms", config.watchdog.heartbeat_interval_ms);
    println!();
    println!("Press Ctrl+C to stop.");
    println!();

    let watchdog = Watchdog::new(config.watchdog.clone(), Arc::new(channel))?;
    watchdog.bind_indicator(Arc::new(LogIndicator));
    watchdog.start(probe.spawn()).await?;

    let mut ticker = tokio::time::interval(STATUS_EVERY);
    ticker.tick().await;
    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            _ = ticker.tick() => {
                let status = watchdog.status();
                println!(
                    "[{}] {} interval={}ms sent={} failed={}",
                    chrono::Local::now().format("%H:%M:%S"),
                    status.state(),
                    status.heartbeat_interval_ms,
                    status.heartbeats_sent,
                    status.emit_failures
                );
            }
        }
    }

    watchdog.shutdown().await;
    println!("{}", serde_json::to_string_pretty(&watchdog.status())?);
    Ok(())
}
