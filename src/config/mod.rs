//! Configuration for Socksgate
//!
//! Configuration is read from a TOML file, then overridden by the
//! `SOCKS5_*` environment variables the dashboard sets.

mod server;

pub use server::{Config, ServerConfig, TcpConfig, UpstreamEndpoint};

use anyhow::{bail, Context, Result};
use std::path::Path;

/// Load configuration from a TOML file and apply environment overrides
pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config> {
    let content = std::fs::read_to_string(path.as_ref())
        .with_context(|| format!("Failed to read config file: {:?}", path.as_ref()))?;

    let mut config = parse_config(&content)?;
    apply_env_overrides(&mut config)?;
    Ok(config)
}

/// Parse configuration from a TOML string
pub fn parse_config(content: &str) -> Result<Config> {
    toml::from_str(content).with_context(|| "Failed to parse configuration")
}

/// Environment overrides: `SOCKS5_HOST`, `SOCKS5_PORT`, `SOCKS5_AUTH`
/// (`"true"` enables), `SOCKS5_USERNAME`, `SOCKS5_PASSWORD`.
pub fn apply_env_overrides(config: &mut Config) -> Result<()> {
    if let Ok(host) = std::env::var("SOCKS5_HOST") {
        config.server.bind_host = host;
    }
    if let Ok(port) = std::env::var("SOCKS5_PORT") {
        match port.parse::<u16>() {
            Ok(port) => config.server.bind_port = port,
            Err(_) => bail!("Invalid SOCKS5_PORT value: {}", port),
        }
    }
    if let Ok(auth) = std::env::var("SOCKS5_AUTH") {
        config.server.auth_required = auth == "true";
    }
    if let Ok(username) = std::env::var("SOCKS5_USERNAME") {
        config.server.username = Some(username);
    }
    if let Ok(password) = std::env::var("SOCKS5_PASSWORD") {
        config.server.password = Some(password);
    }
    Ok(())
}
