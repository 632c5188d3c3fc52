//! Connection lifecycle as a pure transition function.
//!
//! [`Machine::handle`] consumes one [`Event`] and returns the side effects the
//! driver must perform. It owns the connection status, the latest snapshot and
//! the history buffer; nothing else mutates them.

use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tracing::{debug, info, warn};

use crate::history::{HistoryBuffer, HistoryPoint};
use crate::types::Snapshot;

/// Shown to the user when the transport reports a failure.
pub const CONNECTION_FAILED: &str = "Connection failed. Make sure the backend is running.";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConnectionState {
    #[default]
    Idle,
    Connecting,
    Connected,
    Disconnected,
}

impl ConnectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }
}

impl std::fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConnectionStatus {
    pub state: ConnectionState,
    /// Human-readable failure text; `None` after a clean close.
    pub error: Option<String>,
}

impl ConnectionStatus {
    pub fn connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }
}

/// Everything a consumer may read. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SessionView {
    pub status: ConnectionStatus,
    pub latest: Option<Arc<Snapshot>>,
    pub history: Arc<[HistoryPoint]>,
}

impl Default for SessionView {
    fn default() -> Self {
        Self {
            status: ConnectionStatus::default(),
            latest: None,
            history: Arc::from(Vec::new()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    ConnectRequested,
    DisconnectRequested,
    Opened,
    Frame(String),
    TransportFailed(String),
    Closed,
    RetryElapsed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    /// Start a new connection attempt.
    Dial,
    /// Drop the live connection and any in-flight attempt.
    Close,
    ArmRetry(Duration),
    CancelRetry,
    /// Push a fresh [`SessionView`] to subscribers.
    Publish,
}

#[derive(Debug)]
pub struct Machine {
    status: ConnectionStatus,
    latest: Option<Arc<Snapshot>>,
    history: HistoryBuffer,
    reconnect_delay: Duration,
    retry_armed: bool,
    stopped: bool,
}

impl Machine {
    pub fn new(reconnect_delay: Duration) -> Self {
        Self {
            status: ConnectionStatus::default(),
            latest: None,
            history: HistoryBuffer::default(),
            reconnect_delay,
            retry_armed: false,
            stopped: false,
        }
    }

    pub fn status(&self) -> &ConnectionStatus {
        &self.status
    }

    pub fn state(&self) -> ConnectionState {
        self.status.state
    }

    pub fn latest(&self) -> Option<&Arc<Snapshot>> {
        self.latest.as_ref()
    }

    pub fn history(&self) -> &HistoryBuffer {
        &self.history
    }

    pub fn retry_armed(&self) -> bool {
        self.retry_armed
    }

    pub fn view(&self) -> SessionView {
        SessionView {
            status: self.status.clone(),
            latest: self.latest.clone(),
            history: self.history.snapshot(),
        }
    }

    pub fn handle(&mut self, event: Event) -> Vec<Action> {
        use ConnectionState::*;

        match event {
            Event::ConnectRequested => match self.status.state {
                Connecting | Connected => Vec::new(),
                Idle | Disconnected => {
                    self.stopped = false;
                    let mut actions = Vec::with_capacity(3);
                    if self.retry_armed {
                        // manual retry preempts the timer
                        self.retry_armed = false;
                        actions.push(Action::CancelRetry);
                    }
                    self.status.state = Connecting;
                    actions.extend([Action::Dial, Action::Publish]);
                    actions
                }
            },

            Event::Opened => {
                if self.status.state != Connecting {
                    debug!(state = %self.status.state, "stale open ignored");
                    return vec![Action::Close];
                }
                info!("feed connected");
                self.status.state = Connected;
                self.status.error = None;
                vec![Action::Publish]
            }

            Event::Frame(text) => {
                if self.status.state != Connected {
                    debug!(state = %self.status.state, "frame outside Connected dropped");
                    return Vec::new();
                }
                match Snapshot::decode(&text) {
                    Ok(snap) => {
                        self.history
                            .append(HistoryPoint::from_snapshot(&snap, Local::now()));
                        self.latest = Some(Arc::new(snap));
                        vec![Action::Publish]
                    }
                    Err(e) => {
                        warn!("dropping snapshot: {e}");
                        Vec::new()
                    }
                }
            }

            Event::TransportFailed(reason) => {
                if self.stopped {
                    return Vec::new();
                }
                warn!("transport error: {reason}");
                self.status.error = Some(CONNECTION_FAILED.to_string());
                vec![Action::Publish]
            }

            Event::Closed => match self.status.state {
                Connecting | Connected => {
                    self.status.state = Disconnected;
                    let mut actions = vec![Action::Close];
                    if !self.stopped && !self.retry_armed {
                        info!(
                            "feed disconnected, reconnecting in {:?}",
                            self.reconnect_delay
                        );
                        self.retry_armed = true;
                        actions.push(Action::ArmRetry(self.reconnect_delay));
                    }
                    actions.push(Action::Publish);
                    actions
                }
                Idle | Disconnected => Vec::new(),
            },

            Event::RetryElapsed => {
                if !self.retry_armed {
                    return Vec::new();
                }
                self.retry_armed = false;
                if self.stopped || self.status.state != Disconnected {
                    return Vec::new();
                }
                info!("reconnecting");
                self.status.state = Connecting;
                vec![Action::Dial, Action::Publish]
            }

            Event::DisconnectRequested => {
                self.stopped = true;
                let mut actions = Vec::with_capacity(3);
                if self.retry_armed {
                    self.retry_armed = false;
                    actions.push(Action::CancelRetry);
                }
                if matches!(self.status.state, Connecting | Connected) {
                    info!("feed closed by consumer");
                    self.status.state = Disconnected;
                    actions.push(Action::Close);
                    actions.push(Action::Publish);
                }
                actions
            }
        }
    }
}
