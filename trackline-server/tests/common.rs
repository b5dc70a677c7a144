#![allow(dead_code)]

use std::{sync::Arc, time::Duration};

use anyhow::{Result, anyhow};
use axum::http::{HeaderName, HeaderValue};
use axum_test::TestServer;
use chrono::Utc;
use trackline_core::{
    ConnectionAuthenticator, ConnectionRole, IdentityRecord,
    MockDistanceEstimator, MockIdentityStore, MockPackageStore, TokenVerifier,
};
use trackline_server::{
    AppState, create_app,
    infra::config::{
        AuthConfig, Config, ConfigMetadata, CorsConfig, DatabaseConfig,
        GeolocationConfig, ServerConfig, TrackingConfig,
    },
};
use url::Url;

pub const SECRET: &str = "integration-secret-0123456789abcdef0123";
pub const COURIER: &str = "rider-1";
pub const OBSERVER: &str = "sender-1";
/// Back-office account; any role outside courier/user maps to `Other`.
pub const OPERATOR: &str = "ops-1";
/// Changed their password after the fixture tokens were minted.
pub const STALE_USER: &str = "rider-stale";

pub fn test_config() -> Config {
    Config {
        server: ServerConfig {
            host: "127.0.0.1".into(),
            port: 0,
        },
        database: DatabaseConfig { url: None },
        auth: AuthConfig {
            jwt_secret: SECRET.into(),
            previous_secrets: Vec::new(),
            token_ttl: Duration::from_secs(3600),
        },
        tracking: TrackingConfig {
            outbound_buffer: 16,
            ..TrackingConfig::default()
        },
        geolocation: GeolocationConfig {
            api_url: Url::parse(
                "http://127.0.0.1:9/maps/api/distancematrix/json",
            )
            .expect("static url"),
            api_key: None,
        },
        cors: CorsConfig {
            allowed_origins: vec!["http://localhost:5173".into()],
        },
        metadata: ConfigMetadata::default(),
    }
}

pub fn verifier() -> TokenVerifier {
    TokenVerifier::new(SECRET, Duration::from_secs(3600))
}

pub fn token_for(user_id: &str) -> String {
    verifier().issue(user_id).expect("sign token")
}

/// Identity store that knows a courier, an observer, an operator and one
/// user whose password changed a minute ago.
pub fn identities() -> MockIdentityStore {
    let mut store = MockIdentityStore::new();
    store.expect_fetch_identity().returning(|user_id| {
        let record = match user_id {
            COURIER => Some(IdentityRecord {
                user_id: COURIER.into(),
                role: ConnectionRole::Courier,
                credential_changed_at: None,
            }),
            OBSERVER => Some(IdentityRecord {
                user_id: OBSERVER.into(),
                role: ConnectionRole::Observer,
                credential_changed_at: None,
            }),
            OPERATOR => Some(IdentityRecord {
                user_id: OPERATOR.into(),
                role: ConnectionRole::Other,
                credential_changed_at: None,
            }),
            STALE_USER => Some(IdentityRecord {
                user_id: STALE_USER.into(),
                role: ConnectionRole::Courier,
                credential_changed_at: Some(
                    Utc::now() + chrono::Duration::minutes(1),
                ),
            }),
            _ => None,
        };
        Ok(record)
    });
    store
}

pub struct TestApp {
    pub server: TestServer,
    pub state: AppState,
}

pub fn build_test_app(
    estimator: MockDistanceEstimator,
    packages: MockPackageStore,
) -> Result<TestApp> {
    let authenticator =
        ConnectionAuthenticator::new(verifier(), Arc::new(identities()));
    let state = AppState::new(
        Arc::new(test_config()),
        authenticator,
        Arc::new(estimator),
        Arc::new(packages),
    );

    let server = TestServer::builder()
        .http_transport()
        .build(create_app(state.clone()))
        .map_err(|err| anyhow!(err.to_string()))?;

    Ok(TestApp { server, state })
}

/// App whose estimator and store must never be reached.
pub fn build_idle_app() -> Result<TestApp> {
    let mut estimator = MockDistanceEstimator::new();
    estimator.expect_estimate().never();
    let mut packages = MockPackageStore::new();
    packages.expect_update_package_position().never();
    build_test_app(estimator, packages)
}

pub fn handshake_header() -> HeaderName {
    HeaderName::from_static("auth")
}

pub fn header_value(token: &str) -> HeaderValue {
    HeaderValue::from_str(token).expect("token is a valid header value")
}
