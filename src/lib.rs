//! # Socksgate - Standalone SOCKS5 Relay Server
//!
//! Socksgate accepts client TCP connections, performs the SOCKS5
//! handshake (RFC 1928 method negotiation, optional RFC 1929
//! username/password authentication, CONNECT request), opens a TCP
//! connection to the requested target, and relays bytes transparently in
//! both directions until either side closes.
//!
//! ## Features
//!
//! - **CONNECT relay**: IPv4, domain name, and IPv6 targets
//! - **Username/Password Authentication**: exact-match credentials from
//!   configuration
//! - **Per-connection isolation**: one task per client, no shared session
//!   state
//! - **Bounded handshakes**: negotiation, auth, and request reads all
//!   carry wall-clock timeouts, as does the outbound dial
//! - **Upstream probe**: diagnostic connectivity check of configured
//!   public endpoints
//!
//! ## Usage
//!
//! ```rust,no_run
//! use socksgate::config::ServerConfig;
//! use socksgate::server::Socks5Server;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let mut server = Socks5Server::new(ServerConfig::default());
//!     server.start().await?;
//!     server.wait().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod config;
pub mod error;
pub mod helper;
pub mod server;
pub mod socks;

// Re-export commonly used items
pub use config::{load_config, Config, ServerConfig};
pub use error::{RelayError, ReplyCode, SocksError};
pub use server::{ServerStatus, Socks5Server};

/// Version of the Socksgate library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Name of the application
pub const NAME: &str = env!("CARGO_PKG_NAME");
