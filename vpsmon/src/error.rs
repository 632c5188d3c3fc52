//! Error types for the telemetry client.
//!
//! None of these are fatal to a running session: decode errors drop one
//! message, transport errors put the session into `Disconnected` and the
//! reconnect timer takes over.

use std::path::PathBuf;

use thiserror::Error;
use tokio_tungstenite::tungstenite;

/// A message that could not be turned into a [`Snapshot`](crate::types::Snapshot).
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("malformed snapshot payload: {0}")]
    Json(#[from] serde_json::Error),

    #[error("cpu.per_core has {per_core} entries but cpu.cores is {cores}")]
    CoreCountMismatch { cores: usize, per_core: usize },

    #[error("non-text frame ({len} bytes)")]
    NonText { len: usize },
}

/// Low-level connection failure.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("websocket: {0}")]
    WebSocket(#[from] tungstenite::Error),

    #[error("failed to load TLS CA bundle {path}: {source}")]
    Tls {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificates found in {path}")]
    EmptyCaBundle { path: PathBuf },

    #[error("connection attempt timed out after {0:?}")]
    Timeout(std::time::Duration),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid address {input:?}: {source}")]
    InvalidUrl {
        input: String,
        #[source]
        source: url::ParseError,
    },

    #[error("unsupported scheme {0:?} (expected http, https, ws or wss)")]
    UnsupportedScheme(String),

    #[error("address {0:?} has no host")]
    MissingHost(String),

    #[error("config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("config file {path} is not valid JSON: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}
