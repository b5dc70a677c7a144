pub mod middleware;

pub use middleware::{auth_middleware, ws_handshake_middleware};
