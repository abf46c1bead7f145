//! SOCKS5 authentication
//!
//! Method selection and username/password verification. Selection follows
//! the rule set this server has always shipped: when authentication is
//! required and the client offers user/pass, that wins; otherwise a client
//! offering "no auth" is let through even with `auth_required` set. Clients
//! offering neither get 0xFF and are disconnected.

use crate::config::ServerConfig;
use crate::socks::consts::*;
use crate::socks::types::{Credentials, MethodNegotiation};

/// Authentication method selected for a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    /// No authentication required
    None,
    /// Username/password authentication
    Password,
}

impl AuthMethod {
    /// Convert to the SOCKS5 method byte
    pub fn to_byte(self) -> u8 {
        match self {
            AuthMethod::None => SOCKS5_AUTH_METHOD_NONE,
            AuthMethod::Password => SOCKS5_AUTH_METHOD_PASSWORD,
        }
    }
}

/// Select the authentication method for a client's offered set.
///
/// `None` result means no acceptable method (answer 0xFF and close).
pub fn select_auth_method(
    negotiation: &MethodNegotiation,
    config: &ServerConfig,
) -> Option<AuthMethod> {
    if config.auth_required && negotiation.offers(SOCKS5_AUTH_METHOD_PASSWORD) {
        return Some(AuthMethod::Password);
    }
    if negotiation.offers(SOCKS5_AUTH_METHOD_NONE) {
        return Some(AuthMethod::None);
    }
    None
}

/// Exact-match credential check against the configured username/password.
///
/// A single failure terminates the session; there is no lockout or
/// rate limiting.
pub fn verify_credentials(creds: &Credentials, config: &ServerConfig) -> bool {
    match (&config.username, &config.password) {
        (Some(user), Some(pass)) => creds.username == *user && creds.password == *pass,
        _ => false,
    }
}
