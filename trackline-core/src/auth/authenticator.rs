use chrono::{DateTime, Utc};
use std::{fmt, sync::Arc};
use tracing::debug;

use super::token::TokenVerifier;
use crate::{
    error::{AuthError, CredentialRejection},
    ports::IdentityStore,
    types::ConnectionIdentity,
};

/// Turns a presented bearer credential into a [`ConnectionIdentity`].
///
/// The same instance gates HTTP requests (per request) and WebSocket
/// connections (once, at handshake).
#[derive(Clone)]
pub struct ConnectionAuthenticator {
    verifier: TokenVerifier,
    identities: Arc<dyn IdentityStore>,
}

impl fmt::Debug for ConnectionAuthenticator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionAuthenticator")
            .field("verifier", &self.verifier)
            .finish_non_exhaustive()
    }
}

impl ConnectionAuthenticator {
    pub fn new(
        verifier: TokenVerifier,
        identities: Arc<dyn IdentityStore>,
    ) -> Self {
        Self {
            verifier,
            identities,
        }
    }

    pub fn verifier(&self) -> &TokenVerifier {
        &self.verifier
    }

    /// `credential` may carry a `Bearer ` prefix.
    pub async fn authenticate(
        &self,
        credential: Option<&str>,
    ) -> Result<ConnectionIdentity, AuthError> {
        let token = credential
            .map(strip_bearer)
            .filter(|token| !token.is_empty())
            .ok_or(AuthError::MissingCredential)?;

        let claims = self.verifier.verify(token).map_err(|err| {
            debug!(error = %err, "credential failed verification");
            AuthError::InvalidOrExpiredCredential(
                CredentialRejection::Undecodable,
            )
        })?;

        let record = self
            .identities
            .fetch_identity(&claims.id)
            .await
            .map_err(|err| AuthError::IdentityLookup(err.to_string()))?
            .ok_or(AuthError::InvalidOrExpiredCredential(
                CredentialRejection::UnknownIdentity,
            ))?;

        if credential_changed_after(claims.iat, record.credential_changed_at) {
            debug!(
                user_id = %record.user_id,
                "credential predates last password change"
            );
            return Err(AuthError::InvalidOrExpiredCredential(
                CredentialRejection::CredentialChanged,
            ));
        }

        Ok(ConnectionIdentity {
            user_id: record.user_id,
            role: record.role,
        })
    }
}

/// True when a token issued at `issued_at` (whole seconds) predates the
/// credential change. Compared at millisecond precision, so a token minted in
/// the same second but before the change is still void.
pub fn credential_changed_after(
    issued_at: i64,
    changed_at: Option<DateTime<Utc>>,
) -> bool {
    match changed_at {
        Some(changed_at) => {
            (issued_at as f64) < changed_at.timestamp_millis() as f64 / 1000.0
        }
        None => false,
    }
}

fn strip_bearer(raw: &str) -> &str {
    let trimmed = raw.trim();
    trimmed
        .strip_prefix("Bearer ")
        .or_else(|| trimmed.strip_prefix("bearer "))
        .unwrap_or(trimmed)
        .trim()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        error::StoreError,
        ports::{IdentityRecord, MockIdentityStore},
        types::ConnectionRole,
    };
    use chrono::{Duration, TimeZone};

    const HOUR: std::time::Duration = std::time::Duration::from_secs(3600);

    fn authenticator_with(store: MockIdentityStore) -> ConnectionAuthenticator {
        let verifier = TokenVerifier::new("secret", HOUR);
        ConnectionAuthenticator::new(verifier, Arc::new(store))
    }

    fn courier(changed_at: Option<DateTime<Utc>>) -> IdentityRecord {
        IdentityRecord {
            user_id: "rider-7".into(),
            role: ConnectionRole::Courier,
            credential_changed_at: changed_at,
        }
    }

    #[test]
    fn change_timestamp_comparison() {
        let changed = Utc.timestamp_millis_opt(1_700_000_000_500).unwrap();
        assert!(credential_changed_after(1_699_999_999, Some(changed)));
        // Same second, but the change happened half a second later.
        assert!(credential_changed_after(1_700_000_000, Some(changed)));
        assert!(!credential_changed_after(1_700_000_001, Some(changed)));
        assert!(!credential_changed_after(0, None));
    }

    #[tokio::test]
    async fn missing_credential_is_rejected_before_lookup() {
        let mut store = MockIdentityStore::new();
        store.expect_fetch_identity().never();
        let auth = authenticator_with(store);

        assert_eq!(
            auth.authenticate(None).await,
            Err(AuthError::MissingCredential)
        );
        assert_eq!(
            auth.authenticate(Some("Bearer ")).await,
            Err(AuthError::MissingCredential)
        );
    }

    #[tokio::test]
    async fn garbage_credential_is_rejected() {
        let mut store = MockIdentityStore::new();
        store.expect_fetch_identity().never();
        let auth = authenticator_with(store);

        assert_eq!(
            auth.authenticate(Some("nope")).await,
            Err(AuthError::InvalidOrExpiredCredential(
                CredentialRejection::Undecodable
            ))
        );
    }

    #[tokio::test]
    async fn unknown_identity_is_rejected() {
        let mut store = MockIdentityStore::new();
        store.expect_fetch_identity().returning(|_| Ok(None));
        let auth = authenticator_with(store);
        let token = auth.verifier().issue("ghost").unwrap();

        assert_eq!(
            auth.authenticate(Some(&token)).await,
            Err(AuthError::InvalidOrExpiredCredential(
                CredentialRejection::UnknownIdentity
            ))
        );
    }

    #[tokio::test]
    async fn token_issued_before_password_change_is_rejected() {
        let changed_at = Utc::now() - Duration::minutes(5);
        let mut store = MockIdentityStore::new();
        store
            .expect_fetch_identity()
            .returning(move |_| Ok(Some(courier(Some(changed_at)))));
        let auth = authenticator_with(store);
        let stale = auth
            .verifier()
            .issue_at("rider-7", changed_at - Duration::minutes(10))
            .unwrap();

        assert_eq!(
            auth.authenticate(Some(&stale)).await,
            Err(AuthError::InvalidOrExpiredCredential(
                CredentialRejection::CredentialChanged
            ))
        );
    }

    #[tokio::test]
    async fn valid_bearer_credential_yields_identity() {
        let mut store = MockIdentityStore::new();
        store
            .expect_fetch_identity()
            .withf(|user_id| user_id == "rider-7")
            .returning(|_| {
                let changed_at = Utc::now() - Duration::days(30);
                Ok(Some(courier(Some(changed_at))))
            });
        let auth = authenticator_with(store);
        let token = auth.verifier().issue("rider-7").unwrap();

        let identity = auth
            .authenticate(Some(&format!("Bearer {token}")))
            .await
            .expect("identity");
        assert_eq!(identity.user_id, "rider-7");
        assert_eq!(identity.role, ConnectionRole::Courier);
    }

    #[tokio::test]
    async fn lookup_failure_is_not_reported_as_bad_token() {
        let mut store = MockIdentityStore::new();
        store
            .expect_fetch_identity()
            .returning(|_| Err(StoreError::Database("pool timed out".into())));
        let auth = authenticator_with(store);
        let token = auth.verifier().issue("rider-7").unwrap();

        assert!(matches!(
            auth.authenticate(Some(&token)).await,
            Err(AuthError::IdentityLookup(_))
        ));
    }
}
