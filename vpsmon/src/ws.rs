//! WebSocket dialing for the telemetry feed (plain or TLS with an optional pinned CA).

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::TcpStream;
use tokio_tungstenite::{
    connect_async, connect_async_tls_with_config, Connector, MaybeTlsStream, WebSocketStream,
};
use url::Url;

use crate::error::TransportError;

pub type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;

// Open the feed. wss:// trusts the public web PKI unless a CA bundle is given.
pub async fn connect(
    url: &Url,
    tls_ca: Option<&Path>,
    timeout: Duration,
) -> Result<WsStream, TransportError> {
    let attempt = async {
        let (ws, _) = if url.scheme() == "wss" {
            let cfg = match tls_ca {
                Some(path) => load_ca(path)?,
                None => default_tls_config(),
            };
            connect_async_tls_with_config(
                url.as_str(),
                None,
                false,
                Some(Connector::Rustls(Arc::new(cfg))),
            )
            .await?
        } else {
            connect_async(url.as_str()).await?
        };
        Ok::<_, TransportError>(ws)
    };
    tokio::time::timeout(timeout, attempt)
        .await
        .map_err(|_| TransportError::Timeout(timeout))?
}

/// Public web PKI roots, used for wss:// when no CA bundle is configured.
pub fn default_roots() -> rustls::RootCertStore {
    let mut roots = rustls::RootCertStore::empty();
    roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    roots
}

pub fn default_tls_config() -> rustls::ClientConfig {
    rustls::ClientConfig::builder()
        .with_root_certificates(default_roots())
        .with_no_client_auth()
}

fn load_ca(path: &Path) -> Result<rustls::ClientConfig, TransportError> {
    let tls_err = |source| TransportError::Tls {
        path: PathBuf::from(path),
        source,
    };
    let mut reader = BufReader::new(File::open(path).map_err(tls_err)?);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(tls_err)?;

    let mut roots = rustls::RootCertStore::empty();
    let (added, _ignored) = roots.add_parsable_certificates(certs);
    if added == 0 {
        return Err(TransportError::EmptyCaBundle {
            path: PathBuf::from(path),
        });
    }
    Ok(rustls::ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth())
}
