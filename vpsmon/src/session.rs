//! Session driver: one task that owns the machine, the live socket, the
//! in-flight dial and the reconnect timer, and serialises every input.

use std::future::{pending, Future};
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use futures_util::StreamExt;
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep, timeout, Sleep};
use tokio_tungstenite::tungstenite::{self, Message};
use tracing::{debug, warn};
use url::Url;

use crate::config::ClientConfig;
use crate::error::{ConfigError, DecodeError, TransportError};
use crate::machine::{Action, Event, Machine, SessionView};
use crate::ws::{self, WsStream};

// Upper bound on waiting for the peer to acknowledge our close frame.
const CLOSE_GRACE: Duration = Duration::from_millis(500);

type Dial = Pin<Box<dyn Future<Output = Result<WsStream, TransportError>> + Send>>;

#[derive(Debug, Clone, Copy)]
enum Command {
    Connect,
    Disconnect,
    Shutdown,
}

/// Handle to a running telemetry session.
///
/// Dropping the handle stops the driver task, which closes the connection
/// and drops any pending reconnect timer.
pub struct Session {
    commands: mpsc::UnboundedSender<Command>,
    view: watch::Receiver<SessionView>,
    url: Url,
    task: JoinHandle<()>,
}

impl Session {
    /// Spawn the driver in `Idle`. Requires a Tokio runtime.
    pub fn spawn(cfg: &ClientConfig) -> Result<Self, ConfigError> {
        let url = cfg.feed_url()?;
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (view_tx, view_rx) = watch::channel(SessionView::default());

        let driver = Driver {
            machine: Machine::new(cfg.reconnect_delay()),
            url: url.clone(),
            tls_ca: cfg.tls_ca.clone(),
            dial_timeout: cfg.dial_timeout(),
            commands: cmd_rx,
            view: view_tx,
            dialing: None,
            conn: None,
            retry: None,
        };
        let task = tokio::spawn(driver.run());

        Ok(Self {
            commands: cmd_tx,
            view: view_rx,
            url,
            task,
        })
    }

    /// Spawn and immediately start connecting.
    pub fn start(cfg: &ClientConfig) -> Result<Self, ConfigError> {
        let session = Self::spawn(cfg)?;
        session.connect();
        Ok(session)
    }

    /// Begin connecting. No-op while connecting or connected; from
    /// `Disconnected` it retries immediately instead of waiting for the timer.
    pub fn connect(&self) {
        let _ = self.commands.send(Command::Connect);
    }

    /// Close the feed and cancel any pending reconnect. The session stays
    /// usable; a later [`connect`](Self::connect) reopens it.
    pub fn disconnect(&self) {
        let _ = self.commands.send(Command::Disconnect);
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionView> {
        self.view.clone()
    }

    /// Current state, latest snapshot and history.
    pub fn view(&self) -> SessionView {
        self.view.borrow().clone()
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Tear down and wait for the driver task to finish.
    pub async fn shutdown(self) {
        let _ = self.commands.send(Command::Shutdown);
        if let Err(e) = self.task.await {
            warn!("session task ended abnormally: {e}");
        }
    }
}

enum Wake {
    Command(Option<Command>),
    Dialed(Result<WsStream, TransportError>),
    Frame(Option<Result<Message, tungstenite::Error>>),
    RetryElapsed,
}

struct Driver {
    machine: Machine,
    url: Url,
    tls_ca: Option<PathBuf>,
    dial_timeout: Duration,
    commands: mpsc::UnboundedReceiver<Command>,
    view: watch::Sender<SessionView>,
    dialing: Option<Dial>,
    conn: Option<WsStream>,
    retry: Option<Pin<Box<Sleep>>>,
}

impl Driver {
    async fn run(mut self) {
        loop {
            let wake = tokio::select! {
                cmd = self.commands.recv() => Wake::Command(cmd),
                res = dial_finished(&mut self.dialing) => Wake::Dialed(res),
                frame = next_frame(&mut self.conn) => Wake::Frame(frame),
                () = retry_elapsed(&mut self.retry) => Wake::RetryElapsed,
            };

            match wake {
                Wake::Command(Some(Command::Connect)) => {
                    self.dispatch(Event::ConnectRequested).await
                }
                Wake::Command(Some(Command::Disconnect)) => {
                    self.dispatch(Event::DisconnectRequested).await
                }
                Wake::Command(Some(Command::Shutdown)) | Wake::Command(None) => {
                    self.dispatch(Event::DisconnectRequested).await;
                    break;
                }
                Wake::Dialed(res) => {
                    self.dialing = None;
                    match res {
                        Ok(ws) => {
                            self.conn = Some(ws);
                            self.dispatch(Event::Opened).await;
                        }
                        Err(e) => self.fail(e.to_string()).await,
                    }
                }
                Wake::Frame(frame) => self.on_frame(frame).await,
                Wake::RetryElapsed => {
                    self.retry = None;
                    self.dispatch(Event::RetryElapsed).await;
                }
            }
        }
        debug!("session driver stopped");
    }

    async fn on_frame(&mut self, frame: Option<Result<Message, tungstenite::Error>>) {
        match frame {
            Some(Ok(Message::Text(text))) => self.dispatch(Event::Frame(text)).await,
            Some(Ok(Message::Binary(bytes))) => {
                warn!("dropping snapshot: {}", DecodeError::NonText { len: bytes.len() });
            }
            Some(Ok(Message::Close(frame))) => {
                // the stream ends on the next poll, after our reply is flushed
                debug!(?frame, "peer sent close");
            }
            Some(Ok(_)) => {}
            Some(Err(e)) => {
                self.conn = None;
                self.fail(e.to_string()).await;
            }
            None => {
                self.conn = None;
                self.dispatch(Event::Closed).await;
            }
        }
    }

    // Transport failures always surface as error-then-close.
    async fn fail(&mut self, reason: String) {
        self.dispatch(Event::TransportFailed(reason)).await;
        self.dispatch(Event::Closed).await;
    }

    async fn dispatch(&mut self, event: Event) {
        for action in self.machine.handle(event) {
            match action {
                Action::Dial => {
                    let url = self.url.clone();
                    let tls_ca = self.tls_ca.clone();
                    let limit = self.dial_timeout;
                    debug!(%url, "dialing");
                    self.dialing = Some(Box::pin(async move {
                        ws::connect(&url, tls_ca.as_deref(), limit).await
                    }));
                }
                Action::Close => self.close().await,
                Action::ArmRetry(delay) => self.retry = Some(Box::pin(sleep(delay))),
                Action::CancelRetry => self.retry = None,
                Action::Publish => {
                    self.view.send_replace(self.machine.view());
                }
            }
        }
    }

    async fn close(&mut self) {
        self.dialing = None;
        if let Some(mut ws) = self.conn.take() {
            match timeout(CLOSE_GRACE, ws.close(None)).await {
                Ok(Ok(())) => {}
                Ok(Err(e)) => debug!("close handshake failed: {e}"),
                Err(_) => debug!("close handshake timed out"),
            }
        }
    }
}

async fn dial_finished(dial: &mut Option<Dial>) -> Result<WsStream, TransportError> {
    match dial {
        Some(fut) => fut.await,
        None => pending().await,
    }
}

async fn next_frame(conn: &mut Option<WsStream>) -> Option<Result<Message, tungstenite::Error>> {
    match conn {
        Some(ws) => ws.next().await,
        None => pending().await,
    }
}

async fn retry_elapsed(timer: &mut Option<Pin<Box<Sleep>>>) {
    match timer {
        Some(t) => t.as_mut().await,
        None => pending().await,
    }
}
