//! Server configuration types

use crate::helper::SocketOpts;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Default bind host
fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

/// Default bind port
fn default_bind_port() -> u16 {
    1080
}

/// Default handshake (negotiation/auth/request) timeout in seconds
fn default_handshake_timeout() -> u64 {
    10
}

/// Default outbound connect timeout in seconds
fn default_connect_timeout() -> u64 {
    15
}

/// Default upstream probe timeout in seconds
fn default_probe_timeout() -> u64 {
    5
}

/// Domains expected through this relay; anything else is logged at WARN
/// but still connected.
fn default_watch_domains() -> Vec<String> {
    vec![
        "play.geforcenow.com".to_string(),
        "gfn-web.nvidia.com".to_string(),
        "api.geforcenow.com".to_string(),
        "auth.geforcenow.com".to_string(),
    ]
}

/// Seed list of public endpoints for the diagnostic connectivity probe.
/// Informational only; the relay path never consults these.
fn default_upstreams() -> Vec<UpstreamEndpoint> {
    vec![
        UpstreamEndpoint::new("165.232.105.25", 8000, "US"),
        UpstreamEndpoint::new("72.210.252.134", 46164, "US"),
        UpstreamEndpoint::new("184.178.172.25", 15291, "US"),
        UpstreamEndpoint::new("107.152.98.5", 4145, "US"),
        UpstreamEndpoint::new("142.54.228.193", 4145, "US"),
    ]
}

/// Root configuration structure
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    /// Relay server configuration
    #[serde(default)]
    pub server: ServerConfig,
}

/// SOCKS5 relay server configuration. Immutable after server start.
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct ServerConfig {
    /// Host to bind the listener to
    #[serde(default = "default_bind_host")]
    pub bind_host: String,

    /// Port to bind the listener to
    #[serde(default = "default_bind_port")]
    pub bind_port: u16,

    /// Require username/password authentication
    #[serde(default)]
    pub auth_required: bool,

    /// Username for SOCKS5 auth
    #[serde(default)]
    pub username: Option<String>,

    /// Password for SOCKS5 auth
    #[serde(default)]
    pub password: Option<String>,

    /// Timeout for handshake-phase reads in seconds
    #[serde(default = "default_handshake_timeout")]
    pub handshake_timeout: u64,

    /// Timeout for outbound target dials in seconds
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout: u64,

    /// Timeout for upstream connectivity probes in seconds
    #[serde(default = "default_probe_timeout")]
    pub probe_timeout: u64,

    /// TCP socket options for client and target connections
    #[serde(default)]
    pub tcp: TcpConfig,

    /// Domains expected through this relay (warn-only, never enforced)
    #[serde(default = "default_watch_domains")]
    pub watch_domains: Vec<String>,

    /// Known public endpoints for the diagnostic connectivity probe
    #[serde(default = "default_upstreams")]
    pub upstreams: Vec<UpstreamEndpoint>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        ServerConfig {
            bind_host: default_bind_host(),
            bind_port: default_bind_port(),
            auth_required: false,
            username: None,
            password: None,
            handshake_timeout: default_handshake_timeout(),
            connect_timeout: default_connect_timeout(),
            probe_timeout: default_probe_timeout(),
            tcp: TcpConfig::default(),
            watch_domains: default_watch_domains(),
            upstreams: default_upstreams(),
        }
    }
}

impl ServerConfig {
    /// Check if authentication credentials are configured
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.auth_required && !self.has_credentials() {
            return Err("Authentication required but no credentials configured".to_string());
        }
        Ok(())
    }

    /// Address string for the listener
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.bind_host, self.bind_port)
    }

    /// Socket options for client and target streams
    pub fn socket_opts(&self) -> SocketOpts {
        SocketOpts {
            nodelay: self.tcp.nodelay,
            keepalive_secs: Some(self.tcp.keepalive_secs),
            keepalive_interval: Some(self.tcp.keepalive_interval),
        }
    }

    /// Whether a domain target matches the watch list. Substring match in
    /// either direction, like the dashboard expects. An empty list matches
    /// everything.
    pub fn matches_watch_domain(&self, host: &str) -> bool {
        if self.watch_domains.is_empty() {
            return true;
        }
        self.watch_domains
            .iter()
            .any(|d| host.contains(d.as_str()) || d.contains(host))
    }
}

/// Default keepalive seconds
fn default_keepalive_secs() -> u64 {
    20
}

/// Default keepalive interval
fn default_keepalive_interval() -> u64 {
    8
}

/// TCP socket option configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct TcpConfig {
    /// Enable TCP_NODELAY
    #[serde(default)]
    pub nodelay: bool,

    /// TCP keepalive timeout in seconds
    #[serde(default = "default_keepalive_secs")]
    pub keepalive_secs: u64,

    /// TCP keepalive interval in seconds
    #[serde(default = "default_keepalive_interval")]
    pub keepalive_interval: u64,
}

impl Default for TcpConfig {
    fn default() -> Self {
        TcpConfig {
            nodelay: true,
            keepalive_secs: default_keepalive_secs(),
            keepalive_interval: default_keepalive_interval(),
        }
    }
}

/// A known public proxy endpoint, used only by the connectivity probe
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct UpstreamEndpoint {
    /// Endpoint host
    pub host: String,
    /// Endpoint port
    pub port: u16,
    /// Country tag, informational
    #[serde(default)]
    pub country: Option<String>,
}

impl UpstreamEndpoint {
    /// Create an endpoint with a country tag
    pub fn new(host: &str, port: u16, country: &str) -> Self {
        UpstreamEndpoint {
            host: host.to_string(),
            port,
            country: Some(country.to_string()),
        }
    }
}

impl fmt::Display for UpstreamEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
