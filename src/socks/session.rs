//! Per-connection session handling
//!
//! Drives one accepted client through the SOCKS5 handshake and into the
//! relay: negotiation, optional username/password authentication, connect
//! request, outbound dial, then the bidirectional pump. Any error closes
//! the session; nothing is retried and no other session is affected.
//!
//! Each handshake message is taken with a single bounded read and handed
//! to the pure codec, mirroring the one-message-per-segment behavior
//! clients exhibit in practice.

use crate::config::ServerConfig;
use crate::error::{RelayError, ReplyCode, SocksError};
use crate::socks::auth::{self, AuthMethod};
use crate::socks::codec;
use crate::socks::consts::*;
use crate::socks::dialer;
use crate::socks::relay;
use bytes::BytesMut;
use std::time::Duration;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{debug, info, warn};

/// Handle one client connection through handshake and relay.
///
/// The stream is consumed; both it and the target connection are closed
/// by the time this returns.
pub async fn handle_session<S>(mut stream: S, config: &ServerConfig) -> Result<(), RelayError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handshake_timeout = Duration::from_secs(config.handshake_timeout);

    // Step 1: method negotiation
    let buf = read_handshake(&mut stream, handshake_timeout, "negotiation").await?;
    let negotiation = codec::decode_method_negotiation(&buf)?;

    let method = match auth::select_auth_method(&negotiation, config) {
        Some(method) => method,
        None => {
            stream
                .write_all(&codec::encode_method_selection(
                    SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE,
                ))
                .await?;
            stream.flush().await?;
            return Err(SocksError::NoAcceptableMethod.into());
        }
    };

    stream
        .write_all(&codec::encode_method_selection(method.to_byte()))
        .await?;
    stream.flush().await?;

    // Step 2: username/password sub-negotiation
    if method == AuthMethod::Password {
        let buf = read_handshake(&mut stream, handshake_timeout, "authentication").await?;
        match codec::decode_userpass_auth(&buf) {
            Ok(creds) => {
                if auth::verify_credentials(&creds, config) {
                    stream.write_all(&codec::encode_auth_result(true)).await?;
                    stream.flush().await?;
                    debug!("authentication succeeded for user {}", creds.username);
                } else {
                    stream.write_all(&codec::encode_auth_result(false)).await?;
                    stream.flush().await?;
                    return Err(SocksError::AuthFailed.into());
                }
            }
            Err(e) => {
                // Malformed auth message still gets the failure status
                stream.write_all(&codec::encode_auth_result(false)).await?;
                stream.flush().await?;
                return Err(e.into());
            }
        }
    }

    // Step 3: connect request
    let buf = match read_handshake(&mut stream, handshake_timeout, "request").await {
        Ok(buf) => buf,
        Err(e @ RelayError::Timeout(_)) => {
            let _ = stream
                .write_all(&codec::encode_reply(ReplyCode::GeneralFailure, None))
                .await;
            let _ = stream.flush().await;
            return Err(e);
        }
        Err(e) => return Err(e),
    };

    let request = match codec::decode_connect_request(&buf) {
        Ok(request) => request,
        Err(e) => {
            if let Some(code) = reply_code_for(&e) {
                stream.write_all(&codec::encode_reply(code, None)).await?;
                stream.flush().await?;
            }
            return Err(e.into());
        }
    };

    if request.target.is_domain && !config.matches_watch_domain(&request.target.host) {
        warn!("domain outside watch list: {}", request.target.host);
    }

    info!("CONNECT request for {}", request.target);

    // Step 4: dial the target
    let target_stream = match dialer::dial(
        &request.target,
        Duration::from_secs(config.connect_timeout),
        config.socket_opts(),
    )
    .await
    {
        Ok(stream) => stream,
        Err(e) => {
            debug!("dial failed for {}: {}", request.target, e);
            stream
                .write_all(&codec::encode_reply(ReplyCode::GeneralFailure, None))
                .await?;
            stream.flush().await?;
            return Err(e);
        }
    };

    let bound_addr = target_stream.local_addr().ok();
    stream
        .write_all(&codec::encode_reply(ReplyCode::Succeeded, bound_addr))
        .await?;
    stream.flush().await?;

    info!("relay established to {}", request.target);

    // Step 5: pump bytes until either side closes
    relay::relay(stream, target_stream).await;

    Ok(())
}

/// One bounded read of a handshake message.
async fn read_handshake<S>(
    stream: &mut S,
    timeout: Duration,
    phase: &'static str,
) -> Result<BytesMut, RelayError>
where
    S: AsyncRead + Unpin,
{
    let mut buf = BytesMut::with_capacity(MAX_HANDSHAKE_LEN);
    let n = tokio::time::timeout(timeout, stream.read_buf(&mut buf))
        .await
        .map_err(|_| RelayError::Timeout(phase))??;

    if n == 0 {
        return Err(SocksError::Protocol(format!("connection closed during {}", phase)).into());
    }

    Ok(buf)
}

/// Reply code owed to the client for a request decode failure, if any.
/// Malformed bytes get no reply; unsupported command/address type get
/// their specific codes.
fn reply_code_for(err: &SocksError) -> Option<ReplyCode> {
    match err {
        SocksError::UnsupportedCommand(_) => Some(ReplyCode::CommandNotSupported),
        SocksError::UnsupportedAddressType(_) => Some(ReplyCode::AddressTypeNotSupported),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;
    use tokio::net::{TcpListener, TcpStream};

    fn test_config() -> ServerConfig {
        ServerConfig {
            handshake_timeout: 5,
            connect_timeout: 5,
            ..Default::default()
        }
    }

    fn auth_config() -> ServerConfig {
        ServerConfig {
            auth_required: true,
            username: Some("user".to_string()),
            password: Some("pass".to_string()),
            handshake_timeout: 5,
            connect_timeout: 5,
            ..Default::default()
        }
    }

    /// Echo server bound to an ephemeral port, serving one connection.
    async fn spawn_echo_target() -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            if let Ok((mut socket, _)) = listener.accept().await {
                let mut buf = [0u8; 1024];
                while let Ok(n) = socket.read(&mut buf).await {
                    if n == 0 {
                        break;
                    }
                    if socket.write_all(&buf[..n]).await.is_err() {
                        break;
                    }
                }
            }
        });
        addr
    }

    fn connect_request_to(addr: std::net::SocketAddr) -> Vec<u8> {
        let mut req = vec![0x05, 0x01, 0x00, SOCKS5_ADDR_TYPE_IPV4];
        match addr.ip() {
            std::net::IpAddr::V4(ip) => req.extend_from_slice(&ip.octets()),
            std::net::IpAddr::V6(_) => unreachable!("test targets are IPv4"),
        }
        req.extend_from_slice(&addr.port().to_be_bytes());
        req
    }

    #[tokio::test]
    async fn test_session_no_auth_connect_and_relay() {
        let target_addr = spawn_echo_target().await;
        let (mut client, server) = duplex(4096);
        let config = test_config();

        let session = tokio::spawn(async move { handle_session(server, &config).await });

        // Negotiation: offer "no auth" only
        client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
        let mut sel = [0u8; 2];
        client.read_exact(&mut sel).await.unwrap();
        assert_eq!(sel, [0x05, 0x00]);

        // Connect request
        client
            .write_all(&connect_request_to(target_addr))
            .await
            .unwrap();
        let mut reply = [0u8; 10];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply[0], 0x05);
        assert_eq!(reply[1], 0x00);
        assert_eq!(reply[3], SOCKS5_ADDR_TYPE_IPV4);

        // Bytes relay unmodified in both directions
        client.write_all(b"ping through relay").await.unwrap();
        let mut echoed = [0u8; 18];
        client.read_exact(&mut echoed).await.unwrap();
        assert_eq!(&echoed, b"ping through relay");

        drop(client);
        let result = tokio::time::timeout(Duration::from_secs(2), session)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_session_auth_success() {
        let target_addr = spawn_echo_target().await;
        let (mut client, server) = duplex(4096);
        let config = auth_config();

        let session = tokio::spawn(async move { handle_session(server, &config).await });

        client.write_all(&[0x05, 0x01, 0x02]).await.unwrap();
        let mut sel = [0u8; 2];
        client.read_exact(&mut sel).await.unwrap();
        assert_eq!(sel, [0x05, 0x02]);

        // RFC 1929 sub-negotiation
        let mut auth = vec![0x01, 4];
        auth.extend_from_slice(b"user");
        auth.push(4);
        auth.extend_from_slice(b"pass");
        client.write_all(&auth).await.unwrap();

        let mut status = [0u8; 2];
        client.read_exact(&mut status).await.unwrap();
        assert_eq!(status, [0x01, 0x00]);

        client
            .write_all(&connect_request_to(target_addr))
            .await
            .unwrap();
        let mut reply = [0u8; 10];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply[1], 0x00);

        drop(client);
        let _ = tokio::time::timeout(Duration::from_secs(2), session).await;
    }

    #[tokio::test]
    async fn test_session_auth_wrong_password_closes_without_reply() {
        let (mut client, server) = duplex(4096);
        let config = auth_config();

        let session = tokio::spawn(async move { handle_session(server, &config).await });

        client.write_all(&[0x05, 0x01, 0x02]).await.unwrap();
        let mut sel = [0u8; 2];
        client.read_exact(&mut sel).await.unwrap();
        assert_eq!(sel, [0x05, 0x02]);

        let mut auth = vec![0x01, 4];
        auth.extend_from_slice(b"user");
        auth.push(5);
        auth.extend_from_slice(b"wrong");
        client.write_all(&auth).await.unwrap();

        let mut status = [0u8; 2];
        client.read_exact(&mut status).await.unwrap();
        assert_eq!(status, [0x01, 0xFF]);

        // Session is closed: no connect reply, just EOF
        let mut rest = [0u8; 1];
        let n = client.read(&mut rest).await.unwrap();
        assert_eq!(n, 0);

        let result = tokio::time::timeout(Duration::from_secs(2), session)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            result,
            Err(RelayError::Socks(SocksError::AuthFailed))
        ));
    }

    #[tokio::test]
    async fn test_session_no_acceptable_method() {
        let (mut client, server) = duplex(4096);
        let config = auth_config();

        let session = tokio::spawn(async move { handle_session(server, &config).await });

        // GSSAPI only
        client.write_all(&[0x05, 0x01, 0x01]).await.unwrap();
        let mut sel = [0u8; 2];
        client.read_exact(&mut sel).await.unwrap();
        assert_eq!(sel, [0x05, 0xFF]);

        let mut rest = [0u8; 1];
        let n = client.read(&mut rest).await.unwrap();
        assert_eq!(n, 0);

        let result = tokio::time::timeout(Duration::from_secs(2), session)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            result,
            Err(RelayError::Socks(SocksError::NoAcceptableMethod))
        ));
    }

    #[tokio::test]
    async fn test_session_permissive_no_auth_fallback() {
        // auth_required set but client only offers "no auth": admitted
        let target_addr = spawn_echo_target().await;
        let (mut client, server) = duplex(4096);
        let config = auth_config();

        let session = tokio::spawn(async move { handle_session(server, &config).await });

        client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
        let mut sel = [0u8; 2];
        client.read_exact(&mut sel).await.unwrap();
        assert_eq!(sel, [0x05, 0x00]);

        client
            .write_all(&connect_request_to(target_addr))
            .await
            .unwrap();
        let mut reply = [0u8; 10];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply[1], 0x00);

        drop(client);
        let _ = tokio::time::timeout(Duration::from_secs(2), session).await;
    }

    #[tokio::test]
    async fn test_session_unsupported_command() {
        let (mut client, server) = duplex(4096);
        let config = test_config();

        let session = tokio::spawn(async move { handle_session(server, &config).await });

        client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
        let mut sel = [0u8; 2];
        client.read_exact(&mut sel).await.unwrap();

        // BIND request
        client
            .write_all(&[0x05, 0x02, 0x00, 0x01, 127, 0, 0, 1, 0x00, 80])
            .await
            .unwrap();
        let mut reply = [0u8; 10];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply[1], 0x07);

        let result = tokio::time::timeout(Duration::from_secs(2), session)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            result,
            Err(RelayError::Socks(SocksError::UnsupportedCommand(0x02)))
        ));
    }

    #[tokio::test]
    async fn test_session_unsupported_address_type() {
        let (mut client, server) = duplex(4096);
        let config = test_config();

        let session = tokio::spawn(async move { handle_session(server, &config).await });

        client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
        let mut sel = [0u8; 2];
        client.read_exact(&mut sel).await.unwrap();

        client
            .write_all(&[0x05, 0x01, 0x00, 0x05, 127, 0, 0, 1, 0x00, 80])
            .await
            .unwrap();
        let mut reply = [0u8; 10];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply[1], 0x08);

        let result = tokio::time::timeout(Duration::from_secs(2), session)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            result,
            Err(RelayError::Socks(SocksError::UnsupportedAddressType(0x05)))
        ));
    }

    #[tokio::test]
    async fn test_session_dial_refused_replies_general_failure() {
        // Bind then drop to get a dead port
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let dead_addr = listener.local_addr().unwrap();
        drop(listener);

        let (mut client, server) = duplex(4096);
        let config = test_config();

        let session = tokio::spawn(async move { handle_session(server, &config).await });

        client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
        let mut sel = [0u8; 2];
        client.read_exact(&mut sel).await.unwrap();

        client
            .write_all(&connect_request_to(dead_addr))
            .await
            .unwrap();
        let mut reply = [0u8; 10];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply[1], 0x01);

        let result = tokio::time::timeout(Duration::from_secs(2), session)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(RelayError::Dial { .. })));
    }

    #[tokio::test]
    async fn test_session_bad_version_closes_without_reply() {
        let (mut client, server) = duplex(4096);
        let config = test_config();

        let session = tokio::spawn(async move { handle_session(server, &config).await });

        // SOCKS4 greeting
        client.write_all(&[0x04, 0x01, 0x00]).await.unwrap();

        let mut buf = [0u8; 1];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(n, 0);

        let result = tokio::time::timeout(Duration::from_secs(2), session)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(
            result,
            Err(RelayError::Socks(SocksError::UnsupportedVersion(4)))
        ));
    }

    #[tokio::test]
    async fn test_session_negotiation_timeout_no_reply() {
        let (mut client, server) = duplex(4096);
        let config = ServerConfig {
            handshake_timeout: 0,
            ..test_config()
        };

        // Write nothing: the bounded read elapses immediately
        let result = handle_session(server, &config).await;
        assert!(matches!(result, Err(RelayError::Timeout("negotiation"))));

        // No reply was sent before the close
        let mut buf = [0u8; 1];
        let n = client.read(&mut buf).await.unwrap();
        assert_eq!(n, 0);
    }

    #[tokio::test]
    async fn test_session_request_timeout_replies_general_failure() {
        let (mut client, server) = duplex(4096);
        let config = ServerConfig {
            handshake_timeout: 0,
            ..test_config()
        };

        // Pre-buffer the negotiation so its zero-timeout read still finds
        // data, then leave the request phase empty.
        client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();

        let session = tokio::spawn(async move { handle_session(server, &config).await });

        let mut sel = [0u8; 2];
        client.read_exact(&mut sel).await.unwrap();
        assert_eq!(sel, [0x05, 0x00]);

        let mut reply = [0u8; 10];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply[1], 0x01);

        let result = tokio::time::timeout(Duration::from_secs(2), session)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(RelayError::Timeout("request"))));
    }

    #[tokio::test]
    async fn test_session_scripted_negotiation_reject() {
        // Mock stream asserts the exact bytes written back: a client
        // offering only GSSAPI must get 0x05 0xFF and nothing else.
        let stream = tokio_test::io::Builder::new()
            .read(&[0x05, 0x01, 0x01])
            .write(&[0x05, 0xFF])
            .build();

        let result = handle_session(stream, &auth_config()).await;
        assert!(matches!(
            result,
            Err(RelayError::Socks(SocksError::NoAcceptableMethod))
        ));
    }

    #[tokio::test]
    async fn test_session_over_real_tcp() {
        // Full handshake over a real socket pair instead of duplex
        let target_addr = spawn_echo_target().await;
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server_addr = listener.local_addr().unwrap();
        let config = test_config();

        tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            let _ = handle_session(socket, &config).await;
        });

        let mut client = TcpStream::connect(server_addr).await.unwrap();
        client.write_all(&[0x05, 0x01, 0x00]).await.unwrap();
        let mut sel = [0u8; 2];
        client.read_exact(&mut sel).await.unwrap();
        assert_eq!(sel, [0x05, 0x00]);

        client
            .write_all(&connect_request_to(target_addr))
            .await
            .unwrap();
        let mut reply = [0u8; 10];
        client.read_exact(&mut reply).await.unwrap();
        assert_eq!(reply[1], 0x00);
        // Bound port in the reply is the dialed socket's local port
        let bound_port = u16::from_be_bytes([reply[8], reply[9]]);
        assert_ne!(bound_port, 0);

        client.write_all(b"echo me").await.unwrap();
        let mut echoed = [0u8; 7];
        client.read_exact(&mut echoed).await.unwrap();
        assert_eq!(&echoed, b"echo me");
    }
}
