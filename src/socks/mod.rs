//! SOCKS5 protocol implementation
//!
//! The handshake is parsed from raw bytes by the pure [`codec`]; the
//! [`session`] module owns all socket IO and drives one connection from
//! negotiation through the bidirectional [`relay`].

pub mod auth;
pub mod codec;
pub mod consts;
pub mod dialer;
pub mod relay;
pub mod session;
pub mod types;

pub use auth::{select_auth_method, verify_credentials, AuthMethod};
pub use dialer::dial;
pub use relay::relay;
pub use session::handle_session;
pub use types::{ConnectRequest, Credentials, MethodNegotiation, TargetAddr};
