//! Socksgate - Standalone SOCKS5 Relay Server
//!
//! This is the main entry point for the Socksgate daemon.

use anyhow::Result;
use clap::Parser;
use socksgate::config::{apply_env_overrides, load_config, Config};
use socksgate::server::Socks5Server;
use std::path::PathBuf;
use tracing::{info, Level};
use tracing_subscriber::FmtSubscriber;

/// Socksgate - standalone SOCKS5 relay server
#[derive(Parser, Debug)]
#[command(name = "socksgate")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info")]
    log_level: String,

    /// Enable JSON logging format
    #[arg(long)]
    json_log: bool,

    /// Probe configured upstream endpoints after startup
    #[arg(long)]
    check_upstreams: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    setup_logging(&args.log_level, args.json_log)?;

    let config = match &args.config {
        Some(path) => {
            let config = load_config(path)?;
            info!("Configuration loaded from: {:?}", path);
            config
        }
        None => {
            let mut config = Config::default();
            apply_env_overrides(&mut config)?;
            config
        }
    };

    info!("Socksgate v{}", socksgate::VERSION);

    let mut server = Socks5Server::new(config.server);
    let addr = server.start().await?;
    info!("Configuration:");
    info!("  Host: {}", addr.ip());
    info!("  Port: {}", addr.port());
    info!(
        "  Authentication: {}",
        if server.config().auth_required {
            "Enabled"
        } else {
            "Disabled"
        }
    );

    if args.check_upstreams {
        let reachable = server.probe_upstreams().await;
        info!(
            "{}/{} upstream endpoints reachable",
            reachable.len(),
            server.config().upstreams.len()
        );
    }

    // Handle Ctrl+C and termination signals (cross-platform)
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate())?;

        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down...");
            }
            _ = sigterm.recv() => {
                info!("Received SIGTERM, shutting down...");
            }
        }
    }

    #[cfg(not(unix))]
    {
        // On Windows, only handle Ctrl+C
        let _ = tokio::signal::ctrl_c().await;
        info!("Received Ctrl+C, shutting down...");
    }

    server.stop();
    server.wait().await;

    Ok(())
}

/// Setup logging based on configuration
fn setup_logging(level: &str, json: bool) -> Result<()> {
    let level = match level.to_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "info" => Level::INFO,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    };

    if json {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .json()
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = FmtSubscriber::builder()
            .with_max_level(level)
            .with_target(true)
            .finish();
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(())
}
