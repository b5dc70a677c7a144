//! Core library for Trackline.
//!
//! This crate holds the real-time half of package tracking: the in-memory
//! position cache that decides whether a package is live, the distance/ETA
//! estimator port, the connection authenticator used at WebSocket handshake,
//! the per-package topic router, and the coordinator that turns raw courier
//! reports into cache refreshes, durable writes and observer broadcasts.
//!
//! Transport (axum) and storage (Postgres) live in `trackline-server`; this
//! crate only talks to them through the traits in [`ports`] and
//! [`estimator`].

#![cfg_attr(docsrs, feature(doc_cfg))]
#![allow(missing_docs)]

pub mod auth;
pub mod cache;
pub mod coordinator;
pub mod error;
pub mod estimator;
pub mod events;
pub mod ports;
pub mod realtime;
pub mod types;

pub use auth::{Claims, ConnectionAuthenticator, TokenVerifier};
pub use cache::{CacheEntry, PositionCache};
pub use coordinator::{LocationCoordinator, TrackingSettings, UpdateOutcome};
pub use error::{
    AuthError, CredentialRejection, EstimationError, PersistenceError,
    StoreError, TrackingError, TrackingGateError,
};
pub use estimator::{
    DistanceEstimator, RouteEstimate, RouteStatus,
    distance_matrix::DistanceMatrixClient,
};
pub use events::{ClientEvent, ServerEvent};
pub use ports::{IdentityRecord, IdentityStore, PackageStore};
pub use realtime::{Connection, DeliveryError, TopicRouter};
pub use types::{
    ConnectionId, ConnectionIdentity, ConnectionRole, Coordinate,
    LocationUpdate, PackageId, PackageStatus,
};

#[cfg(any(test, feature = "testing"))]
pub use estimator::MockDistanceEstimator;
#[cfg(any(test, feature = "testing"))]
pub use ports::{MockIdentityStore, MockPackageStore};
