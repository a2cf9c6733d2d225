//! Network Monitoring Implementation

use async_trait::async_trait;
use bridge_traits::{
    error::Result,
    network::{NetworkChangeStream, NetworkMonitor, NetworkStatus},
};
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::debug;

/// Desktop network monitor implementation
///
/// Detects connectivity with a TCP reachability probe and surfaces
/// transitions through a polling task. Platform-specific implementations
/// (Linux netlink, macOS SystemConfiguration, Windows WinAPI) would be
/// more precise but require additional dependencies.
pub struct DesktopNetworkMonitor {
    probe_addr: String,
    probe_timeout: Duration,
    poll_interval: Duration,
}

impl DesktopNetworkMonitor {
    /// Create a monitor probing a public DNS resolver every 15 seconds.
    pub fn new() -> Self {
        Self {
            probe_addr: "8.8.8.8:53".to_string(),
            probe_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_secs(15),
        }
    }

    /// Create a monitor with a custom probe target and poll cadence.
    pub fn with_probe(probe_addr: impl Into<String>, poll_interval: Duration) -> Self {
        Self {
            probe_addr: probe_addr.into(),
            probe_timeout: Duration::from_secs(5),
            poll_interval,
        }
    }

    async fn check_connectivity(probe_addr: &str, probe_timeout: Duration) -> NetworkStatus {
        match tokio::time::timeout(
            probe_timeout,
            tokio::net::TcpStream::connect(probe_addr),
        )
        .await
        {
            Ok(Ok(_)) => NetworkStatus::Connected,
            Ok(Err(_)) | Err(_) => NetworkStatus::Disconnected,
        }
    }
}

impl Default for DesktopNetworkMonitor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl NetworkMonitor for DesktopNetworkMonitor {
    async fn current_status(&self) -> Result<NetworkStatus> {
        let status = Self::check_connectivity(&self.probe_addr, self.probe_timeout).await;
        debug!(status = ?status, "Network probe completed");
        Ok(status)
    }

    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>> {
        let (sender, receiver) = mpsc::channel(8);
        let probe_addr = self.probe_addr.clone();
        let probe_timeout = self.probe_timeout;
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            let mut last: Option<NetworkStatus> = None;

            loop {
                if sender.is_closed() {
                    break;
                }

                let status = Self::check_connectivity(&probe_addr, probe_timeout).await;
                if last != Some(status) {
                    last = Some(status);
                    if sender.send(status).await.is_err() {
                        break;
                    }
                }

                tokio::time::sleep(poll_interval).await;
            }
        });

        Ok(Box::new(PollingChangeStream { receiver }))
    }
}

struct PollingChangeStream {
    receiver: mpsc::Receiver<NetworkStatus>,
}

#[async_trait]
impl NetworkChangeStream for PollingChangeStream {
    async fn next(&mut self) -> Option<NetworkStatus> {
        self.receiver.recv().await
    }
}
