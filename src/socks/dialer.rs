//! Outbound target dialer
//!
//! Opens the TCP connection to the requested target under a hard
//! wall-clock bound. A dial that exceeds the bound is abandoned and the
//! in-flight socket discarded.

use crate::error::RelayError;
use crate::helper::SocketOpts;
use crate::socks::types::TargetAddr;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::debug;

/// Dial the target with the given timeout.
pub async fn dial(
    target: &TargetAddr,
    timeout: Duration,
    socket_opts: SocketOpts,
) -> Result<TcpStream, RelayError> {
    let addr = target.resolve().await?;

    debug!("dialing target {} ({})", target, addr);

    let stream = tokio::time::timeout(timeout, TcpStream::connect(addr))
        .await
        .map_err(|_| RelayError::Timeout("dial"))?
        .map_err(|e| RelayError::Dial {
            target: target.to_string(),
            source: e,
        })?;

    if let Err(e) = socket_opts.apply(&stream) {
        debug!("failed to apply socket options to target stream: {}", e);
    }

    Ok(stream)
}
