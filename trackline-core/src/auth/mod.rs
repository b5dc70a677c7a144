//! Credential verification shared by the HTTP gate and the WebSocket
//! handshake.

pub mod authenticator;
pub mod token;

pub use authenticator::{ConnectionAuthenticator, credential_changed_after};
pub use token::{Claims, TokenVerifier};
