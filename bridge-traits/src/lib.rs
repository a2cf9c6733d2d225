//! # Host Bridge Traits
//!
//! Platform abstraction traits that must be implemented by each host platform.
//!
//! ## Overview
//!
//! This crate defines the contract between the media core and platform-specific
//! implementations. Each trait represents a capability the core requires but
//! that must be implemented differently per platform (desktop, iOS, Android, web).
//!
//! ## Traits
//!
//! ### Networking & I/O
//! - [`HttpClient`](http::HttpClient) - Async HTTP operations with retry, file download
//! - [`FileSystemAccess`](storage::FileSystemAccess) - File I/O for offline payloads
//! - [`KeyValueStore`](storage::KeyValueStore) - Persistent record/index storage
//!
//! ### Media
//! - [`PlayerBackend`](player::PlayerBackend) - Provisioning of player resources
//! - [`PlayerControls`](player::PlayerControls) / [`PlayerEventStream`](player::PlayerEventStream) -
//!   Command surface and status stream of a live player
//!
//! ### Platform Integration
//! - [`NetworkMonitor`](network::NetworkMonitor) - Connectivity transitions
//! - [`Clock`](time::Clock) - Time source for deterministic testing
//!
//! ## Fail-Fast Strategy
//!
//! The core fails fast with descriptive errors when a required capability is
//! missing, rather than degrading silently.
//!
//! ## Error Handling
//!
//! All bridge traits use the [`BridgeError`](error::BridgeError) type. Platform
//! implementations should:
//!
//! - Convert platform-specific errors to `BridgeError`
//! - Provide actionable error messages
//! - Include error context (e.g., file paths, URLs)
//!
//! ## Thread Safety
//!
//! All bridge traits require `Send + Sync` bounds to support safe concurrent
//! usage across async tasks. Implementations must ensure thread safety.

pub mod error;
pub mod http;
pub mod network;
pub mod player;
pub mod storage;
pub mod time;

pub use error::BridgeError;

// Re-export commonly used types
pub use http::{HttpClient, HttpMethod, HttpRequest, HttpResponse, RetryPolicy};
pub use network::{NetworkChangeStream, NetworkMonitor, NetworkStatus};
pub use player::{
    MediaSource, PlayerBackend, PlayerControls, PlayerEventStream, PlayerHandle, PlayerStatus,
};
pub use storage::{FileMetadata, FileSystemAccess, KeyValueStore};
pub use time::{Clock, SystemClock};
