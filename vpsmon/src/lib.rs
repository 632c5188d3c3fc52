//! Live telemetry client for the VPS monitor backend.
//!
//! A [`Session`] keeps a WebSocket feed open, reconnecting on a fixed delay,
//! and publishes the connection status, the latest [`Snapshot`] and a rolling
//! 60-point history to any number of readers.

pub mod config;
pub mod error;
pub mod format;
pub mod history;
pub mod machine;
pub mod session;
pub mod types;
pub mod view;
pub mod ws;

pub use config::ClientConfig;
pub use error::{ConfigError, DecodeError, TransportError};
pub use history::{HistoryPoint, HISTORY_CAPACITY};
pub use machine::{ConnectionState, ConnectionStatus, SessionView};
pub use session::Session;
pub use types::Snapshot;
