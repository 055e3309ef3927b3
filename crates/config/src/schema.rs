//! Configuration schema.

use std::net::{IpAddr, SocketAddr};

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, Result};

/// Routes served by the gateway regardless of configuration.
pub mod routes {
    pub const SNAPSHOT: &str = "/api/metrics";
    pub const QUERY: &str = "/api/metrics/query";
    pub const HEALTH: &str = "/health";

    pub const RESERVED: &[&str] = &[SNAPSHOT, QUERY, HEALTH];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PulseConfig {
    pub server: ServerConfig,
    pub metrics: MetricsConfig,
    pub query: QueryConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub bind: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: "127.0.0.1".into(),
            port: 9464,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct MetricsConfig {
    /// Serve the scrape endpoint.
    pub enabled: bool,
    /// Path of the scrape endpoint.
    pub path: String,
    /// Emit `_created` samples for counters and histograms.
    pub emit_created: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "/metrics".into(),
            emit_created: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct QueryConfig {
    /// Matchers listed by the `matchers` command.
    pub matcher_limit: usize,
    /// Matchers aggregated into the overview.
    pub overview_matcher_limit: usize,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            matcher_limit: 10,
            overview_matcher_limit: 5,
        }
    }
}

impl PulseConfig {
    pub fn validate(&self) -> Result<()> {
        let path = &self.metrics.path;
        if !path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "metrics.path must start with '/', got '{path}'"
            )));
        }
        if routes::RESERVED.contains(&path.as_str()) {
            return Err(ConfigError::Invalid(format!(
                "metrics.path '{path}' collides with a built-in route"
            )));
        }
        self.socket_addr()?;
        if self.query.matcher_limit == 0 {
            return Err(ConfigError::Invalid(
                "query.matcher_limit must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Listener address. `bind` must be an IP address; IPv6 may be bracketed.
    pub fn socket_addr(&self) -> Result<SocketAddr> {
        let bind = self.server.bind.trim();
        let host = bind
            .strip_prefix('[')
            .and_then(|b| b.strip_suffix(']'))
            .unwrap_or(bind);
        let ip: IpAddr = host.parse().map_err(|_| {
            ConfigError::Invalid(format!(
                "server.bind must be an IP address, got '{}'",
                self.server.bind
            ))
        })?;
        Ok(SocketAddr::new(ip, self.server.port))
    }

    /// `host:port` for the gateway listener, IPv6 hosts in brackets.
    #[must_use]
    pub fn listen_addr(&self) -> String {
        match self.socket_addr() {
            Ok(addr) => addr.to_string(),
            Err(_) => format!("{}:{}", self.server.bind, self.server.port),
        }
    }
}
