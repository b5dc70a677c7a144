//! # Trackline Server
//!
//! Live package tracking over WebSockets.
//!
//! Couriers stream their position for a package; observers subscribe to the
//! package and receive every position the server accepts. Movement of 30
//! metres or more (configurable) is also written to PostgreSQL together
//! with the ETA from the distance service.
//!
//! The tracking engine itself lives in `trackline-core`. This crate adds
//! configuration, the Postgres adapters, the axum HTTP/WebSocket surface
//! and startup wiring.

pub mod auth;
pub mod errors;
pub mod handlers;
pub mod infra;
pub mod routes;

pub use errors::{AppError, AppResult};
pub use infra::app_state::AppState;
pub use routes::create_app;
