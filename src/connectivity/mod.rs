//! Network reachability probe that produces the online/offline signal.
//!
//! A native host has no browser `online`/`offline` events, so reachability is
//! checked by opening a TCP connection to a known endpoint (normally the
//! platform server) on a fixed period. Only changes are reported.

use std::time::Duration;

use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tracing::{debug, info};

use crate::config::ConnectivityConfig;

/// Periodic TCP reachability check.
#[derive(Debug, Clone)]
pub struct ConnectivityProbe {
    target: Option<String>,
    poll_interval: Duration,
    timeout: Duration,
}

impl ConnectivityProbe {
    /// Build a probe from configuration.
    pub fn new(config: &ConnectivityConfig) -> Self {
        Self {
            target: config.target.clone(),
            poll_interval: Duration::from_millis(config.poll_interval_ms.max(1)),
            timeout: Duration::from_millis(config.timeout_ms.max(1)),
        }
    }

    /// The `host:port` being probed, if any.
    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    /// Run one check. Without a target the host is assumed online.
    pub async fn check(&self) -> bool {
        let Some(target) = self.target.as_deref() else {
            return true;
        };
        match tokio::time::timeout(self.timeout, TcpStream::connect(target)).await {
            Ok(Ok(_)) => true,
            Ok(Err(e)) => {
                debug!("Probe to {} failed: {}", target, e);
                false
            }
            Err(_) => {
                debug!("Probe to {} timed out after {:?}", target, self.timeout);
                false
            }
        }
    }

    /// Start probing in the background.
    ///
    /// The first result is always sent; after that only transitions are.
    /// Probing ends when the receiver is dropped.
    pub fn spawn(self) -> mpsc::Receiver<bool> {
        let (tx, rx) = mpsc::channel(8);

        tokio::spawn(async move {
            let mut last: Option<bool> = None;
            let mut ticker = tokio::time::interval(self.poll_interval);

            loop {
                ticker.tick().await;
                let online = self.check().await;
                if last == Some(online) {
                    continue;
                }
                if last.is_some() {
                    info!(
                        "Network {} ({})",
                        if online { "reachable" } else { "unreachable" },
                        self.target.as_deref().unwrap_or("no probe target")
                    );
                }
                last = Some(online);
                if tx.send(online).await.is_err() {
                    debug!("Connectivity receiver dropped, probe stopped");
                    break;
                }
            }
        });

        rx
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    fn probe(target: Option<String>) -> ConnectivityProbe {
        ConnectivityProbe::new(&ConnectivityConfig {
            target,
            poll_interval_ms: 20,
            timeout_ms: 500,
        })
    }

    #[tokio::test]
    async fn test_no_target_is_online() {
        assert!(probe(None).check().await);
    }

    #[tokio::test]
    async fn test_reachable_target() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        assert!(probe(Some(addr)).check().await);
    }

    #[tokio::test]
    async fn test_unreachable_target() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        drop(listener);
        assert!(!probe(Some(addr)).check().await);
    }

    #[tokio::test]
    async fn test_spawn_reports_transitions_only() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();
        let mut signal = probe(Some(addr)).spawn();

        let first = tokio::time::timeout(Duration::from_secs(5), signal.recv())
            .await
            .unwrap();
        assert_eq!(first, Some(true));

        drop(listener);
        let second = tokio::time::timeout(Duration::from_secs(5), signal.recv())
            .await
            .unwrap();
        assert_eq!(second, Some(false));
    }

    #[tokio::test(start_paused = true)]
    async fn test_spawn_without_target_sends_once() {
        let mut signal = probe(None).spawn();
        assert_eq!(signal.recv().await, Some(true));

        let next = tokio::time::timeout(Duration::from_secs(1), signal.recv()).await;
        assert!(next.is_err());
    }

    #[test]
    fn test_target_accessor() {
        assert_eq!(probe(Some("a:1".into())).target(), Some("a:1"));
        assert_eq!(probe(None).target(), None);
    }
}
