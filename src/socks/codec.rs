//! SOCKS5 wire codec
//!
//! Pure encode/decode over byte slices; the session layer owns all reads
//! and writes. Each decoder expects one complete handshake message, which
//! matches how clients deliver them in practice.
//!
//! Message formats (RFC 1928 / RFC 1929):
//!
//! ```text
//! negotiation:  | VER | NMETHODS | METHODS (1..255) |
//! auth:         | VER | ULEN | UNAME | PLEN | PASSWD |
//! request:      | VER | CMD | RSV | ATYP | DST.ADDR | DST.PORT |
//! reply:        | VER | REP | RSV | ATYP | BND.ADDR | BND.PORT |
//! ```

use crate::error::{ReplyCode, SocksError};
use crate::socks::consts::*;
use crate::socks::types::{ConnectRequest, Credentials, MethodNegotiation, TargetAddr};
use bytes::{BufMut, Bytes, BytesMut};
use std::net::SocketAddr;

/// Decode the client's method negotiation message.
pub fn decode_method_negotiation(buf: &[u8]) -> Result<MethodNegotiation, SocksError> {
    if buf.len() < 3 {
        return Err(SocksError::Protocol(format!(
            "method negotiation too short: {} bytes",
            buf.len()
        )));
    }
    if buf[0] != SOCKS5_VERSION {
        return Err(SocksError::UnsupportedVersion(buf[0]));
    }

    let count = buf[1] as usize;
    if buf.len() < 2 + count {
        return Err(SocksError::Protocol(format!(
            "method list truncated: expected {} methods, got {} bytes",
            count,
            buf.len().saturating_sub(2)
        )));
    }

    Ok(MethodNegotiation {
        methods: buf[2..2 + count].to_vec(),
    })
}

/// Encode the server's method selection.
pub fn encode_method_selection(method: u8) -> [u8; 2] {
    [SOCKS5_VERSION, method]
}

/// Decode the RFC 1929 username/password sub-negotiation.
pub fn decode_userpass_auth(buf: &[u8]) -> Result<Credentials, SocksError> {
    if buf.len() < 3 {
        return Err(SocksError::Protocol(format!(
            "auth message too short: {} bytes",
            buf.len()
        )));
    }
    if buf[0] != SOCKS5_AUTH_VERSION {
        return Err(SocksError::Protocol(format!(
            "bad auth sub-version: {:#04x}",
            buf[0]
        )));
    }

    let ulen = buf[1] as usize;
    if buf.len() < 2 + ulen + 1 {
        return Err(SocksError::Protocol("username truncated".to_string()));
    }
    let username = String::from_utf8(buf[2..2 + ulen].to_vec())
        .map_err(|_| SocksError::Protocol("username is not valid UTF-8".to_string()))?;

    let plen = buf[2 + ulen] as usize;
    if buf.len() < 3 + ulen + plen {
        return Err(SocksError::Protocol("password truncated".to_string()));
    }
    let password = String::from_utf8(buf[3 + ulen..3 + ulen + plen].to_vec())
        .map_err(|_| SocksError::Protocol("password is not valid UTF-8".to_string()))?;

    Ok(Credentials { username, password })
}

/// Encode the auth sub-negotiation result. Failure is 0xFF.
pub fn encode_auth_result(ok: bool) -> [u8; 2] {
    let status = if ok {
        SOCKS5_AUTH_SUCCESS
    } else {
        SOCKS5_AUTH_FAILURE
    };
    [SOCKS5_AUTH_VERSION, status]
}

/// Decode a SOCKS5 CONNECT request.
///
/// Only CONNECT is relayed; other commands and unknown address types get
/// their own error variants so the session can answer with the matching
/// reply code.
pub fn decode_connect_request(buf: &[u8]) -> Result<ConnectRequest, SocksError> {
    if buf.len() < 7 {
        return Err(SocksError::Protocol(format!(
            "connect request too short: {} bytes",
            buf.len()
        )));
    }
    if buf[0] != SOCKS5_VERSION {
        return Err(SocksError::UnsupportedVersion(buf[0]));
    }
    if buf[1] != SOCKS5_CMD_TCP_CONNECT {
        return Err(SocksError::UnsupportedCommand(buf[1]));
    }

    let atyp = buf[3];
    let (mut target, port_off) = match atyp {
        SOCKS5_ADDR_TYPE_IPV4 => {
            if buf.len() < 4 + 4 + 2 {
                return Err(SocksError::Protocol("IPv4 address truncated".to_string()));
            }
            let host = format!("{}.{}.{}.{}", buf[4], buf[5], buf[6], buf[7]);
            (TargetAddr::ip(host, 0), 8)
        }
        SOCKS5_ADDR_TYPE_DOMAIN => {
            let dlen = buf[4] as usize;
            if dlen == 0 {
                return Err(SocksError::Protocol("empty domain name".to_string()));
            }
            if buf.len() < 5 + dlen + 2 {
                return Err(SocksError::Protocol("domain name truncated".to_string()));
            }
            let host = String::from_utf8(buf[5..5 + dlen].to_vec())
                .map_err(|_| SocksError::Protocol("domain is not valid UTF-8".to_string()))?;
            (TargetAddr::domain(host, 0), 5 + dlen)
        }
        SOCKS5_ADDR_TYPE_IPV6 => {
            if buf.len() < 4 + 16 + 2 {
                return Err(SocksError::Protocol("IPv6 address truncated".to_string()));
            }
            // Eight colon-separated hex groups, no zero compression
            let groups: Vec<String> = (0..8)
                .map(|i| {
                    let g = u16::from_be_bytes([buf[4 + i * 2], buf[5 + i * 2]]);
                    format!("{:x}", g)
                })
                .collect();
            (TargetAddr::ip(groups.join(":"), 0), 20)
        }
        other => return Err(SocksError::UnsupportedAddressType(other)),
    };

    target.port = u16::from_be_bytes([buf[port_off], buf[port_off + 1]]);

    Ok(ConnectRequest { target })
}

/// Encode a reply in the fixed 10-byte IPv4 form.
///
/// The reply is always IPv4-shaped regardless of the requested address
/// type; an IPv6 bound address degrades to 0.0.0.0 with the real port.
pub fn encode_reply(code: ReplyCode, bound: Option<SocketAddr>) -> Bytes {
    let mut reply = BytesMut::with_capacity(SOCKS5_REPLY_LEN);
    reply.put_u8(SOCKS5_VERSION);
    reply.put_u8(code.into());
    reply.put_u8(SOCKS5_RESERVED);
    reply.put_u8(SOCKS5_ADDR_TYPE_IPV4);

    match bound {
        Some(SocketAddr::V4(addr)) => {
            reply.put_slice(&addr.ip().octets());
            reply.put_u16(addr.port());
        }
        Some(SocketAddr::V6(addr)) => {
            reply.put_slice(&[0, 0, 0, 0]);
            reply.put_u16(addr.port());
        }
        None => {
            reply.put_slice(&[0, 0, 0, 0]);
            reply.put_u16(0);
        }
    }

    reply.freeze()
}
