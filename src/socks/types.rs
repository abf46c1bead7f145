//! Core types for SOCKS5 request handling

use crate::error::RelayError;
use std::fmt;
use std::net::SocketAddr;

/// Target address parsed from a CONNECT request.
///
/// The host is kept exactly as it appeared on the wire: a dotted-quad for
/// IPv4, the domain name for domain requests, or eight colon-separated hex
/// groups for IPv6. Resolution to a socket address happens at dial time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetAddr {
    /// Hostname, dotted-quad, or colon-hex IPv6 literal
    pub host: String,
    /// Target port
    pub port: u16,
    /// Whether the wire address type was a domain name
    pub is_domain: bool,
}

impl TargetAddr {
    /// Target from an IP literal rendered to a string
    pub fn ip(host: String, port: u16) -> Self {
        TargetAddr {
            host,
            port,
            is_domain: false,
        }
    }

    /// Target from a domain name
    pub fn domain(host: String, port: u16) -> Self {
        TargetAddr {
            host,
            port,
            is_domain: true,
        }
    }

    /// Resolve to a socket address.
    ///
    /// IP literals parse directly; domain names go through DNS. Only the
    /// first resolved address is used.
    pub async fn resolve(&self) -> Result<SocketAddr, RelayError> {
        if let Ok(ip) = self.host.parse::<std::net::IpAddr>() {
            return Ok(SocketAddr::new(ip, self.port));
        }

        tokio::net::lookup_host((self.host.as_str(), self.port))
            .await
            .map_err(|e| RelayError::Dial {
                target: self.to_string(),
                source: e,
            })?
            .next()
            .ok_or_else(|| RelayError::Dial {
                target: self.to_string(),
                source: std::io::Error::new(
                    std::io::ErrorKind::AddrNotAvailable,
                    "no addresses resolved",
                ),
            })
    }
}

impl fmt::Display for TargetAddr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}

/// A parsed SOCKS5 CONNECT request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectRequest {
    /// Requested target
    pub target: TargetAddr,
}

/// Methods offered by the client during negotiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodNegotiation {
    /// Raw method bytes, in client order
    pub methods: Vec<u8>,
}

impl MethodNegotiation {
    /// Whether the client offered the given method
    pub fn offers(&self, method: u8) -> bool {
        self.methods.contains(&method)
    }
}

/// Username/password pair from the RFC 1929 sub-negotiation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    /// Supplied username
    pub username: String,
    /// Supplied password
    pub password: String,
}
