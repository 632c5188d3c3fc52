//! Client configuration: feed address derivation plus a small JSON settings file.
//! Stored under XDG config dir: $XDG_CONFIG_HOME/vpsmon/config.json (fallback ~/.config/vpsmon/config.json)

use serde::{Deserialize, Serialize};
use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use tracing::warn;
use url::Url;

use crate::error::ConfigError;

/// Port the backend serves its feed on when the address is derived from the origin.
pub const FEED_PORT: u16 = 3001;
pub const FEED_PATH: &str = "/ws";

/// Explicit feed address, bypasses origin derivation.
pub const ENV_WS_URL: &str = "VPSMON_WS_URL";
pub const ENV_ORIGIN: &str = "VPSMON_ORIGIN";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Address of the dashboard host, e.g. `https://vps.example.com`.
    pub origin: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub feed_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tls_ca: Option<PathBuf>,
    pub reconnect_delay_ms: u64,
    pub dial_timeout_ms: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            origin: "http://localhost".into(),
            feed_url: None,
            tls_ca: None,
            reconnect_delay_ms: 3_000,
            dial_timeout_ms: 10_000,
        }
    }
}

impl ClientConfig {
    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn dial_timeout(&self) -> Duration {
        Duration::from_millis(self.dial_timeout_ms.max(1))
    }

    /// Resolve the WebSocket address.
    ///
    /// Without an override the origin's scheme is mapped (`http`→`ws`,
    /// `https`→`wss`), its host kept, and `:3001/ws` appended. An override is
    /// taken verbatim except that `/ws` is appended when missing.
    pub fn feed_url(&self) -> Result<Url, ConfigError> {
        let mut url = match self.feed_url.as_deref() {
            Some(explicit) => {
                let url = parse(explicit)?;
                if !matches!(url.scheme(), "ws" | "wss") {
                    return Err(ConfigError::UnsupportedScheme(url.scheme().to_string()));
                }
                url
            }
            None => {
                let origin = parse(&self.origin)?;
                let scheme = match origin.scheme() {
                    "http" | "ws" => "ws",
                    "https" | "wss" => "wss",
                    other => return Err(ConfigError::UnsupportedScheme(other.to_string())),
                };
                let host = origin
                    .host_str()
                    .ok_or_else(|| ConfigError::MissingHost(self.origin.clone()))?;
                parse(&format!("{scheme}://{host}:{FEED_PORT}"))?
            }
        };
        if !url.path().ends_with(FEED_PATH) {
            let path = format!("{}{FEED_PATH}", url.path().trim_end_matches('/'));
            url.set_path(&path);
        }
        Ok(url)
    }

    /// Overlay `VPSMON_WS_URL` / `VPSMON_ORIGIN` from the process environment.
    pub fn apply_env(&mut self) {
        self.apply_env_from(|k| std::env::var(k).ok());
    }

    pub fn apply_env_from<F>(&mut self, get: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = get(ENV_WS_URL).filter(|v| !v.trim().is_empty()) {
            self.feed_url = Some(v.trim().to_string());
        }
        if let Some(v) = get(ENV_ORIGIN).filter(|v| !v.trim().is_empty()) {
            self.origin = v.trim().to_string();
        }
    }
}

fn parse(input: &str) -> Result<Url, ConfigError> {
    Url::parse(input).map_err(|source| ConfigError::InvalidUrl {
        input: input.to_string(),
        source,
    })
}

pub fn config_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        PathBuf::from(xdg).join("vpsmon")
    } else {
        dirs_next::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vpsmon")
    }
}

pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Read a config file. A missing file is `Ok(None)`.
pub fn load_config_from(path: &Path) -> Result<Option<ClientConfig>, ConfigError> {
    let s = match fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    serde_json::from_str(&s)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
}

/// Defaults overlaid with the user's config file; unreadable files fall back to defaults.
pub fn load_config() -> ClientConfig {
    let path = config_path();
    match load_config_from(&path) {
        Ok(cfg) => cfg.unwrap_or_default(),
        Err(e) => {
            warn!("ignoring config: {e}");
            ClientConfig::default()
        }
    }
}

pub fn save_config_to(path: &Path, cfg: &ClientConfig) -> Result<(), ConfigError> {
    let io_err = |source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_err)?;
    }
    let data = serde_json::to_vec_pretty(cfg).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    fs::write(path, data).map_err(io_err)
}

pub fn save_config(cfg: &ClientConfig) -> Result<(), ConfigError> {
    save_config_to(&config_path(), cfg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn with_origin(origin: &str) -> ClientConfig {
        ClientConfig {
            origin: origin.into(),
            ..ClientConfig::default()
        }
    }

    #[test]
    fn defaults() {
        let c = ClientConfig::default();
        assert_eq!(c.reconnect_delay(), Duration::from_secs(3));
        assert_eq!(c.feed_url().unwrap().as_str(), "ws://localhost:3001/ws");
    }

    #[test]
    fn origin_scheme_is_mapped() {
        let u = with_origin("http://10.1.2.3:8080/dashboard").feed_url().unwrap();
        assert_eq!(u.as_str(), "ws://10.1.2.3:3001/ws");
        let u = with_origin("https://vps.example.com").feed_url().unwrap();
        assert_eq!(u.as_str(), "wss://vps.example.com:3001/ws");
    }

    #[test]
    fn ipv6_origin_keeps_brackets() {
        let u = with_origin("http://[::1]:3000").feed_url().unwrap();
        assert_eq!(u.as_str(), "ws://[::1]:3001/ws");
    }

    #[test]
    fn bad_origins_are_rejected() {
        assert!(matches!(
            with_origin("ftp://example.com").feed_url(),
            Err(ConfigError::UnsupportedScheme(s)) if s == "ftp"
        ));
        assert!(matches!(
            with_origin("not a url").feed_url(),
            Err(ConfigError::InvalidUrl { .. })
        ));
    }

    #[test]
    fn override_bypasses_origin() {
        let c = ClientConfig {
            origin: "https://ignored.example".into(),
            feed_url: Some("ws://127.0.0.1:9000".into()),
            ..ClientConfig::default()
        };
        assert_eq!(c.feed_url().unwrap().as_str(), "ws://127.0.0.1:9000/ws");
    }

    #[test]
    fn override_path_suffix_not_doubled() {
        let mut c = ClientConfig::default();
        c.feed_url = Some("wss://mon.example.com/ws".into());
        assert_eq!(c.feed_url().unwrap().as_str(), "wss://mon.example.com/ws");
        c.feed_url = Some("wss://mon.example.com/feed/".into());
        assert_eq!(c.feed_url().unwrap().path(), "/feed/ws");
    }

    #[test]
    fn override_must_be_websocket() {
        let mut c = ClientConfig::default();
        c.feed_url = Some("http://127.0.0.1:9000".into());
        assert!(matches!(
            c.feed_url(),
            Err(ConfigError::UnsupportedScheme(_))
        ));
    }

    #[test]
    fn env_overlay() {
        let env: HashMap<&str, &str> = [
            (ENV_WS_URL, " ws://feed:1 "),
            (ENV_ORIGIN, "https://box.lan"),
        ]
        .into_iter()
        .collect();
        let mut c = ClientConfig::default();
        c.apply_env_from(|k| env.get(k).map(|v| v.to_string()));
        assert_eq!(c.feed_url.as_deref(), Some("ws://feed:1"));
        assert_eq!(c.origin, "https://box.lan");

        let mut untouched = ClientConfig::default();
        untouched.apply_env_from(|_| Some(String::new()));
        assert_eq!(untouched, ClientConfig::default());
    }

    #[test]
    fn file_round_trip_and_missing_file() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("nested").join("config.json");
        assert!(load_config_from(&path).unwrap().is_none());

        let cfg = ClientConfig {
            feed_url: Some("wss://x/ws".into()),
            tls_ca: Some(PathBuf::from("/etc/ca.pem")),
            reconnect_delay_ms: 1500,
            ..ClientConfig::default()
        };
        save_config_to(&path, &cfg).unwrap();
        assert_eq!(load_config_from(&path).unwrap(), Some(cfg));
    }

    #[test]
    fn partial_file_fills_defaults() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("config.json");
        fs::write(&path, r#"{ "origin": "https://a.b" }"#).unwrap();
        let cfg = load_config_from(&path).unwrap().unwrap();
        assert_eq!(cfg.origin, "https://a.b");
        assert_eq!(cfg.reconnect_delay_ms, 3_000);
    }

    #[test]
    fn corrupt_file_is_a_parse_error() {
        let td = tempfile::tempdir().unwrap();
        let path = td.path().join("config.json");
        fs::write(&path, "{ nope").unwrap();
        assert!(matches!(
            load_config_from(&path),
            Err(ConfigError::Parse { .. })
        ));
    }
}
