//! # Desktop Bridge Implementations
//!
//! Reference implementations of the host bridge traits for desktop
//! platforms:
//!
//! - [`TokioFileSystem`] - `tokio::fs`-backed file system access
//! - [`ReqwestHttpClient`] - HTTP client with retry and streaming download
//! - [`SqliteKeyValueStore`] - SQLite-backed key-value storage
//! - [`DesktopNetworkMonitor`] - reachability-probe connectivity monitor
//!
//! A desktop player backend is intentionally absent: hosts bring their
//! own audio pipeline and inject it alongside these adapters.

pub mod filesystem;
pub mod http;
pub mod kv_store;
pub mod network;

pub use filesystem::TokioFileSystem;
pub use http::ReqwestHttpClient;
pub use kv_store::SqliteKeyValueStore;
pub use network::DesktopNetworkMonitor;
