//! SOCKS5 protocol constants

/// SOCKS5 protocol version
pub const SOCKS5_VERSION: u8 = 0x05;

/// SOCKS5 username/password sub-negotiation version
pub const SOCKS5_AUTH_VERSION: u8 = 0x01;

// Authentication methods
/// No authentication required
pub const SOCKS5_AUTH_METHOD_NONE: u8 = 0x00;
/// Username/password authentication
pub const SOCKS5_AUTH_METHOD_PASSWORD: u8 = 0x02;
/// No acceptable methods
pub const SOCKS5_AUTH_METHOD_NOT_ACCEPTABLE: u8 = 0xFF;

// Authentication results
/// Credentials accepted
pub const SOCKS5_AUTH_SUCCESS: u8 = 0x00;
/// Credentials rejected
pub const SOCKS5_AUTH_FAILURE: u8 = 0xFF;

// Commands
/// TCP CONNECT command (the only one this server relays)
pub const SOCKS5_CMD_TCP_CONNECT: u8 = 0x01;

// Address types
/// IPv4 address
pub const SOCKS5_ADDR_TYPE_IPV4: u8 = 0x01;
/// Domain name
pub const SOCKS5_ADDR_TYPE_DOMAIN: u8 = 0x03;
/// IPv6 address
pub const SOCKS5_ADDR_TYPE_IPV6: u8 = 0x04;

// Reserved byte
/// Reserved byte value (always 0x00)
pub const SOCKS5_RESERVED: u8 = 0x00;

/// Fixed size of the IPv4-form reply this server always sends
pub const SOCKS5_REPLY_LEN: usize = 10;

/// Largest handshake message a client can send: the auth sub-negotiation
/// with a 255-byte username and password (1 + 1 + 255 + 1 + 255)
pub const MAX_HANDSHAKE_LEN: usize = 513;
