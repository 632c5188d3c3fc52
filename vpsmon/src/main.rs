//! Entry point for the headless vpsmon client. Resolves config and runs a Session.

use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use vpsmon::config::{config_path, load_config, save_config};
use vpsmon::{view, ClientConfig, ConnectionState, Session, SessionView, Snapshot};

/// Follow a VPS monitor feed and log what a dashboard would show.
#[derive(Debug, Parser)]
#[command(name = "vpsmon", version, about)]
struct Cli {
    /// Feed address (ws://HOST:PORT[/ws] or wss://...); bypasses origin derivation
    url: Option<String>,

    /// Dashboard origin the feed address is derived from (http[s]://HOST)
    #[arg(short, long)]
    origin: Option<String>,

    /// PEM bundle of CA certificates trusted for wss:// feeds
    #[arg(short = 't', long = "tls-ca")]
    tls_ca: Option<PathBuf>,

    /// Delay before reconnecting after the feed drops, in milliseconds
    #[arg(long)]
    retry_ms: Option<u64>,

    /// Persist the resolved settings to the config file
    #[arg(long)]
    save: bool,

    /// Print the resolved feed address and exit without connecting
    #[arg(long)]
    dry_run: bool,

    /// Enable debug logging
    #[arg(short, long)]
    verbose: bool,
}

impl Cli {
    // flags > env > config file > defaults
    fn resolve(&self, mut cfg: ClientConfig) -> ClientConfig {
        cfg.apply_env();
        if let Some(u) = &self.url {
            cfg.feed_url = Some(u.clone());
        }
        if let Some(o) = &self.origin {
            cfg.origin = o.clone();
        }
        if let Some(ca) = &self.tls_ca {
            cfg.tls_ca = Some(ca.clone());
        }
        if let Some(ms) = self.retry_ms {
            cfg.reconnect_delay_ms = ms;
        }
        cfg
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose { "vpsmon=debug" } else { "vpsmon=info" };
    tracing_subscriber::fmt()
        .with_target(false)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| default.into()))
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    let cfg = cli.resolve(load_config());
    let url = cfg.feed_url()?;

    if cli.save {
        save_config(&cfg)?;
        info!("saved settings to {}", config_path().display());
    }
    if cli.dry_run {
        println!("{url}");
        return Ok(());
    }

    let session = Session::start(&cfg)?;
    info!("following {}", session.url());

    let mut rx = session.subscribe();
    let mut reporter = Reporter::default();
    loop {
        tokio::select! {
            changed = rx.changed() => {
                if changed.is_err() {
                    break;
                }
                let view = rx.borrow_and_update().clone();
                reporter.report(&view);
            }
            _ = tokio::signal::ctrl_c() => {
                info!("interrupted, closing feed");
                break;
            }
        }
    }

    session.shutdown().await;
    Ok(())
}

// Logs state changes and each new snapshot, skipping repeats.
#[derive(Default)]
struct Reporter {
    state: Option<ConnectionState>,
    latest: Option<Arc<Snapshot>>,
}

impl Reporter {
    fn report(&mut self, v: &SessionView) {
        if self.state != Some(v.status.state) {
            self.state = Some(v.status.state);
            match &v.status.error {
                Some(err) if v.status.state == ConnectionState::Disconnected => {
                    warn!("feed {}: {err}", v.status.state)
                }
                _ => info!("feed {}", v.status.state),
            }
        }
        if let Some(snap) = &v.latest {
            let fresh = self
                .latest
                .as_ref()
                .map_or(true, |prev| !Arc::ptr_eq(prev, snap));
            if fresh {
                info!("{} | history {}", view::summary(snap), v.history.len());
                self.latest = Some(Arc::clone(snap));
            }
        }
    }
}
