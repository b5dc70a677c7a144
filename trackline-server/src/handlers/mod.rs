pub mod health;
pub mod tracking;
pub mod websocket;
