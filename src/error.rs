//! Error types for Socksgate
//!
//! Per-session errors are terminal for that session only; `Bind` and
//! `Config` are fatal to server startup and propagate to the caller.

use std::io;
use thiserror::Error;

/// Main error type for relay operations
#[derive(Error, Debug)]
pub enum RelayError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// Listener could not bind
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        /// The address that could not be bound
        addr: String,
        /// Underlying bind failure
        source: io::Error,
    },

    /// Outbound dial to the requested target failed
    #[error("Failed to connect to {target}: {source}")]
    Dial {
        /// The target that was being dialed
        target: String,
        /// Underlying connect failure
        source: io::Error,
    },

    /// A handshake read or dial exceeded its wall-clock bound
    #[error("Timeout during {0}")]
    Timeout(&'static str),

    /// SOCKS5 protocol error
    #[error("SOCKS5 error: {0}")]
    Socks(#[from] SocksError),
}

/// SOCKS5 protocol-level errors
#[derive(Error, Debug)]
pub enum SocksError {
    /// Malformed handshake or request bytes
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// Unsupported SOCKS version byte
    #[error("Unsupported SOCKS version: {0}")]
    UnsupportedVersion(u8),

    /// No acceptable authentication method
    #[error("No acceptable authentication method")]
    NoAcceptableMethod,

    /// Credential check failed
    #[error("Authentication failed")]
    AuthFailed,

    /// Command other than CONNECT
    #[error("Command not supported: {0}")]
    UnsupportedCommand(u8),

    /// Address type outside IPv4/domain/IPv6
    #[error("Address type not supported: {0}")]
    UnsupportedAddressType(u8),
}

/// Reply codes for SOCKS5 protocol
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ReplyCode {
    /// Command succeeded
    Succeeded = 0x00,
    /// General SOCKS server failure
    GeneralFailure = 0x01,
    /// Connection not allowed by ruleset
    ConnectionNotAllowed = 0x02,
    /// Network unreachable
    NetworkUnreachable = 0x03,
    /// Host unreachable
    HostUnreachable = 0x04,
    /// Connection refused
    ConnectionRefused = 0x05,
    /// TTL expired
    TtlExpired = 0x06,
    /// Command not supported
    CommandNotSupported = 0x07,
    /// Address type not supported
    AddressTypeNotSupported = 0x08,
}

impl From<ReplyCode> for u8 {
    fn from(code: ReplyCode) -> Self {
        code as u8
    }
}
