//! Connection configuration for the `Client`.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

pub const DEFAULT_PORT: u16 = 9200;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Where the engine lives: a full base URL, or a host/port pair.
///
/// A `Url` is used verbatim as the prefix of every request URL, so it
/// should end with `/`. Nothing is validated.
///
/// Deserializes from a `{"host", "port"}` mapping or from a string, which
/// goes through `Host::parse` like every other string source.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged, from = "HostRepr")]
pub enum Host {
    Url(String),
    Address { host: String, port: u16 },
}

#[derive(Deserialize)]
#[serde(untagged)]
enum HostRepr {
    Text(String),
    Address { host: String, port: u16 },
}

impl From<HostRepr> for Host {
    fn from(repr: HostRepr) -> Self {
        match repr {
            HostRepr::Text(s) => Host::parse(&s),
            HostRepr::Address { host, port } => Host::Address { host, port },
        }
    }
}

impl Host {
    /// `scheme://...` becomes `Url`; `name:port` or a bare `name` becomes
    /// `Address` (port defaults to 9200).
    pub fn parse(s: &str) -> Self {
        if s.contains("://") {
            return Host::Url(s.to_string());
        }
        match s.rsplit_once(':') {
            Some((host, port)) => match port.parse() {
                Ok(port) => Host::Address {
                    host: host.to_string(),
                    port,
                },
                Err(_) => Host::Address {
                    host: s.to_string(),
                    port: DEFAULT_PORT,
                },
            },
            None => Host::Address {
                host: s.to_string(),
                port: DEFAULT_PORT,
            },
        }
    }

    pub fn base_url(&self) -> String {
        match self {
            Host::Url(url) => url.clone(),
            Host::Address { host, port } => format!("http://{host}:{port}/"),
        }
    }
}

impl From<&str> for Host {
    fn from(s: &str) -> Self {
        Host::parse(s)
    }
}

impl From<String> for Host {
    fn from(s: String) -> Self {
        Host::parse(&s)
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.base_url())
    }
}

/// Client settings.
///
/// `timeout` bounds each call made through the default transport.
/// `max_retries` and `retry_on_timeout` are carried for callers that read
/// them back but the client never retries.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub host: Host,
    pub timeout: Duration,
    pub max_retries: u32,
    pub retry_on_timeout: bool,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            host: Host::Address {
                host: "localhost".to_string(),
                port: DEFAULT_PORT,
            },
            timeout: DEFAULT_TIMEOUT,
            max_retries: 1,
            retry_on_timeout: false,
        }
    }
}

impl ClientConfig {
    pub fn new(host: impl Into<Host>) -> Self {
        Self {
            host: host.into(),
            ..Self::default()
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_retry_on_timeout(mut self, retry_on_timeout: bool) -> Self {
        self.retry_on_timeout = retry_on_timeout;
        self
    }

    /// Read `ELASTIC_HOST`, `ELASTIC_TIMEOUT` (positive seconds, fractional allowed),
    /// `ELASTIC_MAX_RETRIES` and `ELASTIC_RETRY_ON_TIMEOUT`. Unset or
    /// unparsable values keep their defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        if let Some(host) = lookup("ELASTIC_HOST") {
            config.host = Host::parse(&host);
        }
        if let Some(secs) = parse_var::<f64>(&lookup, "ELASTIC_TIMEOUT") {
            match Duration::try_from_secs_f64(secs) {
                Ok(timeout) if !timeout.is_zero() => config.timeout = timeout,
                _ => warn!(value = secs, "ignoring ELASTIC_TIMEOUT"),
            }
        }
        if let Some(retries) = parse_var(&lookup, "ELASTIC_MAX_RETRIES") {
            config.max_retries = retries;
        }
        if let Some(retry) = parse_var(&lookup, "ELASTIC_RETRY_ON_TIMEOUT") {
            config.retry_on_timeout = retry;
        }
        config
    }
}

fn parse_var<T: FromStr>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T> {
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(key, value = %raw, "ignoring unparsable environment value");
            None
        }
    }
}
