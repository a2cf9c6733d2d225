//! Network Monitoring Abstraction
//!
//! Provides network connectivity transitions to the core. The core reacts
//! to this signal but does not own it.

use async_trait::async_trait;

use crate::error::Result;

/// Network connection status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NetworkStatus {
    /// Connected to network
    Connected,
    /// Not connected to any network
    Disconnected,
    /// Connection status unknown or indeterminate
    Indeterminate,
}

impl NetworkStatus {
    /// Treat only a positively-known connection as online.
    pub fn is_online(&self) -> bool {
        matches!(self, NetworkStatus::Connected)
    }
}

/// Network monitor trait
///
/// Lets the core pick a playback source and defer downloads when offline.
/// Implementations may emit sub-second flaps; consumers debounce as they
/// see fit.
///
/// # Platform Support
///
/// - **Desktop**: System network APIs or reachability probes
/// - **iOS**: Network framework, Reachability
/// - **Android**: ConnectivityManager
/// - **Web**: Navigator.onLine
#[async_trait]
pub trait NetworkMonitor: Send + Sync {
    /// Get the current connection status
    async fn current_status(&self) -> Result<NetworkStatus>;

    /// Check if currently connected to any network
    async fn is_connected(&self) -> bool {
        matches!(self.current_status().await, Ok(NetworkStatus::Connected))
    }

    /// Subscribe to network status changes
    ///
    /// Returns a stream of status transitions. Implementations should emit
    /// an item whenever the status changes.
    async fn subscribe_changes(&self) -> Result<Box<dyn NetworkChangeStream>>;
}

/// Stream of network status changes
#[async_trait]
pub trait NetworkChangeStream: Send {
    /// Get the next status transition
    ///
    /// Returns `None` when the stream is closed.
    async fn next(&mut self) -> Option<NetworkStatus>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_network_status_online() {
        assert!(NetworkStatus::Connected.is_online());
        assert!(!NetworkStatus::Disconnected.is_online());
        assert!(!NetworkStatus::Indeterminate.is_online());
    }
}
