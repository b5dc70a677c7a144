//! Error taxonomy for the tracking subsystem.
//!
//! Only [`AuthError`] is fatal, and only to the handshake it belongs to.
//! Everything else is scoped to the single report or subscription that
//! produced it and is delivered back to the originating connection.

use thiserror::Error;

use crate::types::PackageId;

/// Why a credential that was presented got refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialRejection {
    /// Signature, expiry or claim shape did not verify.
    Undecodable,
    /// Token verified but the user no longer exists.
    UnknownIdentity,
    /// Token was issued before the user's last credential change.
    CredentialChanged,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthError {
    #[error("Authentication error, please provide a token")]
    MissingCredential,

    #[error("{}", rejection_message(.0))]
    InvalidOrExpiredCredential(CredentialRejection),

    #[error("identity lookup failed: {0}")]
    IdentityLookup(String),
}

const UNSAVED_REPORT_MESSAGE: &str = "Location received but could not be \
    saved, it will be retried on your next report.";

fn rejection_message(reason: &CredentialRejection) -> &'static str {
    match reason {
        CredentialRejection::Undecodable
        | CredentialRejection::UnknownIdentity => {
            "Sorry, your token is no longer valid, please sign in again."
        }
        CredentialRejection::CredentialChanged => {
            "You recently changed password! Please log in again."
        }
    }
}

/// The package has no live cache entry.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Package not found to communicate location.")]
pub struct TrackingGateError {
    pub package_id: PackageId,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EstimationError {
    /// Provider errored or timed out. The courier may retry immediately.
    #[error("distance service unavailable: {0}")]
    Unavailable(String),

    /// No route between the two points; the device needs correcting.
    #[error("Location does not exist, please recalibrate your device.")]
    ZeroResults,
}

/// Failure reported by a storage collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(String),

    #[error("record not found: {0}")]
    NotFound(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PersistenceError {
    #[error("failed to persist position for {package_id}: {source}")]
    Store {
        package_id: PackageId,
        #[source]
        source: StoreError,
    },

    #[error("persisting position for {package_id} timed out")]
    TimedOut { package_id: PackageId },
}

/// Any scoped failure of a single position report.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TrackingError {
    #[error(transparent)]
    Gate(#[from] TrackingGateError),

    #[error(transparent)]
    Estimation(#[from] EstimationError),

    #[error(transparent)]
    Persistence(#[from] PersistenceError),
}

impl TrackingError {
    /// Text delivered to the reporting connection in an `error` event.
    /// Provider and database details stay in the server log.
    pub fn client_message(&self) -> String {
        match self {
            Self::Gate(err) => err.to_string(),
            Self::Estimation(EstimationError::ZeroResults) => {
                EstimationError::ZeroResults.to_string()
            }
            Self::Estimation(EstimationError::Unavailable(_)) => {
                "Unable to estimate distance right now, please retry."
                    .to_string()
            }
            Self::Persistence(_) => UNSAVED_REPORT_MESSAGE.to_string(),
        }
    }

    /// Whether the courier can simply resend the same report.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Estimation(EstimationError::Unavailable(_))
                | Self::Persistence(_)
        )
    }
}
