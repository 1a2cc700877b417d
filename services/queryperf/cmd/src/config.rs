//! Configuration handling for queryperf.
//!
//! Values are layered: built-in defaults, then the YAML config file, then
//! `QUERYPERF_*` environment variables. Command-line flags are applied last
//! by `main`.

use anyhow::Result;
use qperf_session::{DEFAULT_DURATION, DEFAULT_PORT, DEFAULT_QUERY_TIMEOUT, DEFAULT_SERVER, DEFAULT_WINDOW};
use qperf_wire::QueryOptions;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerfConfig {
    /// Server address (literal or host name)
    pub server_address: String,
    /// Server port
    pub server_port: u16,
    /// Queries kept in flight
    pub window: usize,
    /// Session length in seconds
    pub duration: u64,
    /// Per-query timeout
    #[serde(with = "humantime_serde_compat")]
    pub query_timeout: Duration,
    /// Query input file
    pub data_file: Option<PathBuf>,
    /// Load the input file before the session starts
    pub preload: bool,
    /// How queries are encoded
    pub query: QueryConfig,
}

/// Query encoding configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Set the RD bit
    pub recursion_desired: bool,
    /// Attach an EDNS0 OPT record
    pub edns: bool,
    /// Set the DO bit (implies EDNS0)
    pub dnssec: bool,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            recursion_desired: true,
            edns: false,
            dnssec: false,
        }
    }
}

impl QueryConfig {
    /// Wire encoding options for these settings
    pub fn to_options(&self) -> QueryOptions {
        QueryOptions {
            recursion_desired: self.recursion_desired,
            edns: self.edns || self.dnssec,
            dnssec_ok: self.dnssec,
            ..QueryOptions::default()
        }
    }
}

impl Default for PerfConfig {
    fn default() -> Self {
        Self {
            server_address: DEFAULT_SERVER.to_string(),
            server_port: DEFAULT_PORT,
            window: DEFAULT_WINDOW,
            duration: DEFAULT_DURATION,
            query_timeout: DEFAULT_QUERY_TIMEOUT,
            data_file: None,
            preload: false,
            query: QueryConfig::default(),
        }
    }
}

/// Root configuration structure (matches the YAML structure)
#[derive(Debug, Deserialize)]
struct RootConfig {
    server: Option<ServerSection>,
    session: Option<SessionSection>,
    queries: Option<QueriesSection>,
}

#[derive(Debug, Deserialize)]
struct ServerSection {
    address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Deserialize)]
struct SessionSection {
    window: Option<usize>,
    duration: Option<u64>,
    timeout: Option<String>,
}

#[derive(Debug, Deserialize)]
struct QueriesSection {
    data_file: Option<PathBuf>,
    preload: Option<bool>,
    recursion_desired: Option<bool>,
    edns: Option<bool>,
    dnssec: Option<bool>,
}

impl PerfConfig {
    /// Load configuration from file and environment variables
    pub fn load_from_file<P: AsRef<Path>>(config_path: P) -> Result<Self> {
        let mut config = Self::default();

        match std::fs::read_to_string(&config_path) {
            Ok(content) => match serde_yaml::from_str::<RootConfig>(&content) {
                Ok(root_config) => {
                    config.apply_root_config(root_config);
                    info!("Loaded configuration from {:?}", config_path.as_ref());
                }
                Err(e) => warn!(
                    "Failed to parse config file {:?}, using defaults: {}",
                    config_path.as_ref(),
                    e
                ),
            },
            Err(_) => warn!("Config file {:?} not found, using defaults", config_path.as_ref()),
        }

        config.apply_environment_overrides();
        Ok(config)
    }

    /// Defaults plus environment variables
    pub fn from_environment() -> Self {
        let mut config = Self::default();
        config.apply_environment_overrides();
        config
    }

    fn apply_root_config(&mut self, root_config: RootConfig) {
        if let Some(server) = root_config.server {
            if let Some(address) = server.address {
                self.server_address = address;
            }
            if let Some(port) = server.port {
                self.server_port = port;
            }
        }

        if let Some(session) = root_config.session {
            if let Some(window) = session.window {
                self.window = window;
            }
            if let Some(duration) = session.duration {
                self.duration = duration;
            }
            if let Some(timeout) = session.timeout {
                match humantime::parse_duration(&timeout) {
                    Ok(timeout) => self.query_timeout = timeout,
                    Err(e) => warn!("Ignoring invalid session.timeout {:?}: {}", timeout, e),
                }
            }
        }

        if let Some(queries) = root_config.queries {
            if queries.data_file.is_some() {
                self.data_file = queries.data_file;
            }
            if let Some(preload) = queries.preload {
                self.preload = preload;
            }
            if let Some(rd) = queries.recursion_desired {
                self.query.recursion_desired = rd;
            }
            if let Some(edns) = queries.edns {
                self.query.edns = edns;
            }
            if let Some(dnssec) = queries.dnssec {
                self.query.dnssec = dnssec;
            }
        }
    }

    fn apply_environment_overrides(&mut self) {
        self.apply_overrides_from(|key| std::env::var(key).ok());
    }

    fn apply_overrides_from<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(server) = lookup("QUERYPERF_SERVER") {
            self.server_address = server;
            info!("Server address overridden by environment: {}", self.server_address);
        }

        if let Some(port) = lookup("QUERYPERF_PORT") {
            match port.parse::<u16>() {
                Ok(port) => {
                    self.server_port = port;
                    info!("Server port overridden by environment: {}", port);
                }
                Err(_) => warn!("Ignoring invalid QUERYPERF_PORT {:?}", port),
            }
        }

        if let Some(window) = lookup("QUERYPERF_WINDOW") {
            match window.parse::<usize>() {
                Ok(window) => {
                    self.window = window;
                    info!("Window overridden by environment: {}", window);
                }
                Err(_) => warn!("Ignoring invalid QUERYPERF_WINDOW {:?}", window),
            }
        }

        if let Some(duration) = lookup("QUERYPERF_DURATION") {
            match duration.parse::<u64>() {
                Ok(duration) => {
                    self.duration = duration;
                    info!("Duration overridden by environment: {}s", duration);
                }
                Err(_) => warn!("Ignoring invalid QUERYPERF_DURATION {:?}", duration),
            }
        }

        if let Some(data_file) = lookup("QUERYPERF_DATA_FILE") {
            info!("Data file overridden by environment: {}", data_file);
            self.data_file = Some(PathBuf::from(data_file));
        }
    }
}

/// Serialize durations in humantime notation ("5s", "250ms")
mod humantime_serde_compat {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&humantime::format_duration(*value).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        let text = String::deserialize(deserializer)?;
        humantime::parse_duration(&text).map_err(serde::de::Error::custom)
    }
}
