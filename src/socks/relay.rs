//! Bidirectional relay pump
//!
//! Copies bytes client→target and target→client concurrently. When either
//! direction finishes (EOF or error), both streams are torn down so the
//! other direction cannot block indefinitely. Errors here are diagnostics
//! only; the session is considered complete either way.

use tokio::io::{AsyncRead, AsyncWrite};
use tracing::debug;

/// Pump bytes between the client and target streams until either side
/// closes. Both streams are dropped (and thus closed) on return.
pub async fn relay<A, B>(client: A, target: B)
where
    A: AsyncRead + AsyncWrite + Unpin,
    B: AsyncRead + AsyncWrite + Unpin,
{
    let (mut client_read, mut client_write) = tokio::io::split(client);
    let (mut target_read, mut target_write) = tokio::io::split(target);

    let client_to_target = tokio::io::copy(&mut client_read, &mut target_write);
    let target_to_client = tokio::io::copy(&mut target_read, &mut client_write);

    // Whichever direction ends first wins the select; returning drops all
    // four halves, closing both sockets exactly once.
    tokio::select! {
        result = client_to_target => {
            match result {
                Ok(bytes) => debug!("client->target finished: {} bytes", bytes),
                Err(e) => debug!("client->target error: {}", e),
            }
        }
        result = target_to_client => {
            match result {
                Ok(bytes) => debug!("target->client finished: {} bytes", bytes),
                Err(e) => debug!("target->client error: {}", e),
            }
        }
    }
}
