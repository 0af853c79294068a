use serde::{Deserialize, Serialize};
use thiserror_no_std::Error;

/// Path batches are posted to.
pub const UPLOAD_PATH: &str = "/water/data";

/// Path the authoritative unix time is fetched from.
pub const TIME_SYNC_PATH: &str = "/currentTime?format=UNIX_S";

/// Status the server answers a successful upload with (No Content).
pub const EXPECTED_UPLOAD_STATUS: i16 = 204;

const DEFAULT_HTTP_PORT: u16 = 80;
const HTTP_SCHEME: &str = "http://";

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Config is not valid JSON for the expected schema")]
    Parse,
    #[error("Server address is empty")]
    MissingServer,
    #[error("Only plain http:// server addresses are supported")]
    UnsupportedScheme,
    #[error("Server port is not a number")]
    InvalidPort,
}

#[derive(Serialize, Deserialize, Debug, Default)]
#[serde(bound(deserialize = "'de: 'a"))]
pub struct Config<'a> {
    pub internet: InternetConfig<'a>,
    pub server: ServerConfig<'a>,
    #[serde(default)]
    pub schedule: Schedule,
}

impl<'a> Config<'a> {
    /// Parse a JSON config document, borrowing strings from `json`.
    pub fn from_json(json: &'a str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json).map_err(|_| ConfigError::Parse)?;
        config.server.endpoint()?;
        Ok(config)
    }
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct InternetConfig<'a> {
    pub ssid: &'a str,
    pub password: &'a str,
}

#[derive(Serialize, Deserialize, Debug, Default)]
pub struct ServerConfig<'a> {
    /// e.g. `http://192.168.1.77:3000`
    pub base_address: &'a str,
}

/// Host and port split out of a base address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Endpoint<'a> {
    pub host: &'a str,
    pub port: u16,
}

impl<'a> ServerConfig<'a> {
    pub fn endpoint(&self) -> Result<Endpoint<'a>, ConfigError> {
        parse_base_address(self.base_address)
    }
}

/// Split `http://host[:port][/]` into host and port.
pub fn parse_base_address(address: &str) -> Result<Endpoint<'_>, ConfigError> {
    if address.is_empty() {
        return Err(ConfigError::MissingServer);
    }
    let rest = address
        .strip_prefix(HTTP_SCHEME)
        .ok_or(ConfigError::UnsupportedScheme)?;
    let authority = rest.split('/').next().unwrap_or(rest);
    if authority.is_empty() {
        return Err(ConfigError::MissingServer);
    }

    match authority.split_once(':') {
        Some((host, port)) => {
            let port = port.parse::<u16>().map_err(|_| ConfigError::InvalidPort)?;
            Ok(Endpoint { host, port })
        }
        None => Ok(Endpoint {
            host: authority,
            port: DEFAULT_HTTP_PORT,
        }),
    }
}

/// Timing of the agent loop.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(default)]
pub struct Schedule {
    pub sample_interval_secs: u32,
    /// Upload the buffered samples at least this often
    pub upload_interval_secs: u32,
    pub time_sync_interval_secs: u32,
    /// Wait between association status polls
    pub connect_poll_interval_ms: u32,
}

impl Default for Schedule {
    fn default() -> Self {
        Self {
            sample_interval_secs: 10,
            upload_interval_secs: 300,
            time_sync_interval_secs: 3600,
            connect_poll_interval_ms: 500,
        }
    }
}
