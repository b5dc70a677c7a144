mod common;

use axum::http::StatusCode;
use serde_json::{Value, json};
use trackline_core::Coordinate;
use trackline_server::handlers::tracking::{InvalidateResponse, TrackedPosition};

use common::{
    COURIER, OBSERVER, OPERATOR, STALE_USER, build_idle_app, token_for,
};

#[tokio::test]
async fn health_is_public_and_reports_counts() -> anyhow::Result<()> {
    let app = build_idle_app()?;
    app.state
        .cache
        .set("PKG1".into(), Coordinate::new(6.5244, 3.3792));

    let response = app.server.get("/health").await;
    response.assert_status_ok();

    let body: Value = response.json();
    assert_eq!(body["status"], "healthy");
    assert_eq!(body["checks"]["cache"]["tracked_packages"], 1);
    assert_eq!(body["checks"]["realtime"]["connections"], 0);
    Ok(())
}

#[tokio::test]
async fn tracking_routes_reject_missing_credentials() -> anyhow::Result<()> {
    let app = build_idle_app()?;

    let response = app.server.get("/api/v1/tracking/PKG1").await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let body: Value = response.json();
    assert_eq!(
        body["error"]["message"],
        "Authentication error, please provide a token"
    );
    assert_eq!(body["error"]["status"], 401);
    Ok(())
}

#[tokio::test]
async fn garbage_bearer_token_is_rejected() -> anyhow::Result<()> {
    let app = build_idle_app()?;

    let response = app
        .server
        .get("/api/v1/tracking/PKG1")
        .authorization_bearer("not-a-jwt")
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn token_minted_before_password_change_is_rejected()
-> anyhow::Result<()> {
    let app = build_idle_app()?;

    let response = app
        .server
        .get("/api/v1/tracking/PKG1")
        .authorization_bearer(token_for(STALE_USER))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);

    let body: Value = response.json();
    assert_eq!(
        body["error"]["message"],
        "You recently changed password! Please log in again."
    );
    Ok(())
}

#[tokio::test]
async fn start_read_and_stop_tracking() -> anyhow::Result<()> {
    let app = build_idle_app()?;
    let token = token_for(OBSERVER);

    app.server
        .put("/api/v1/tracking/PKG1")
        .authorization_bearer(&token)
        .json(&json!({ "latitude": 6.5244, "longitude": 3.3792 }))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    let response = app
        .server
        .get("/api/v1/tracking/PKG1")
        .authorization_bearer(&token)
        .await;
    response.assert_status_ok();
    let tracked: TrackedPosition = response.json();
    assert_eq!(tracked.package_id.as_str(), "PKG1");
    assert_eq!(tracked.position, Coordinate::new(6.5244, 3.3792));
    assert!(tracked.expires_in_secs > 0);

    app.server
        .delete("/api/v1/tracking/PKG1")
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::NO_CONTENT);

    app.server
        .get("/api/v1/tracking/PKG1")
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::NOT_FOUND);

    // Stopping an untracked package is not an error.
    app.server
        .delete("/api/v1/tracking/PKG1")
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::NO_CONTENT);
    Ok(())
}

#[tokio::test]
async fn start_tracking_accepts_short_coordinate_keys() -> anyhow::Result<()> {
    let app = build_idle_app()?;

    app.server
        .put("/api/v1/tracking/PKG9")
        .authorization_bearer(token_for(OBSERVER))
        .json(&json!({ "lat": -33.86, "lng": 151.2 }))
        .await
        .assert_status(StatusCode::NO_CONTENT);

    assert_eq!(
        app.state.cache.get("PKG9"),
        Some(Coordinate::new(-33.86, 151.2))
    );
    Ok(())
}

#[tokio::test]
async fn out_of_range_start_position_is_a_bad_request() -> anyhow::Result<()> {
    let app = build_idle_app()?;

    let response = app
        .server
        .put("/api/v1/tracking/PKG1")
        .authorization_bearer(token_for(OBSERVER))
        .json(&json!({ "latitude": 91.0, "longitude": 3.0 }))
        .await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert!(!app.state.cache.has("PKG1"));
    Ok(())
}

#[tokio::test]
async fn couriers_cannot_start_or_stop_tracking() -> anyhow::Result<()> {
    let app = build_idle_app()?;
    let token = token_for(COURIER);
    app.state.cache.set("PKG1".into(), Coordinate::new(6.5, 3.3));

    let response = app
        .server
        .put("/api/v1/tracking/PKG2")
        .authorization_bearer(&token)
        .json(&json!({ "latitude": 6.5, "longitude": 3.3 }))
        .await;
    response.assert_status(StatusCode::FORBIDDEN);
    let body: Value = response.json();
    assert_eq!(body["error"]["status"], 403);
    assert!(!app.state.cache.has("PKG2"));

    app.server
        .delete("/api/v1/tracking/PKG1")
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::FORBIDDEN);
    assert!(app.state.cache.has("PKG1"));

    // Reading is open to every authenticated role.
    app.server
        .get("/api/v1/tracking/PKG1")
        .authorization_bearer(&token)
        .await
        .assert_status_ok();
    Ok(())
}

#[tokio::test]
async fn bulk_invalidation_is_reserved_for_operators() -> anyhow::Result<()> {
    let app = build_idle_app()?;
    app.state.cache.set("LAG-1".into(), Coordinate::new(6.5, 3.3));

    for user in [COURIER, OBSERVER] {
        app.server
            .delete("/api/v1/tracking")
            .add_query_param("prefix", "LAG-")
            .authorization_bearer(token_for(user))
            .await
            .assert_status(StatusCode::FORBIDDEN);
    }
    assert!(app.state.cache.has("LAG-1"));
    Ok(())
}

#[tokio::test]
async fn prefix_invalidation_removes_matching_packages() -> anyhow::Result<()> {
    let app = build_idle_app()?;
    let token = token_for(OPERATOR);
    for id in ["LAG-1", "LAG-2", "ABJ-1"] {
        app.state.cache.set(id.into(), Coordinate::new(6.5, 3.3));
    }

    let response = app
        .server
        .delete("/api/v1/tracking")
        .add_query_param("prefix", "LAG-")
        .authorization_bearer(&token)
        .await;
    response.assert_status_ok();
    let removed: InvalidateResponse = response.json();
    assert_eq!(removed.removed, 2);
    assert!(app.state.cache.has("ABJ-1"));
    assert!(!app.state.cache.has("LAG-1"));

    app.server
        .delete("/api/v1/tracking")
        .authorization_bearer(&token)
        .await
        .assert_status(StatusCode::BAD_REQUEST);
    Ok(())
}

#[tokio::test]
async fn websocket_handshake_requires_credentials() -> anyhow::Result<()> {
    let app = build_idle_app()?;

    let response = app.server.get("/ws").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    Ok(())
}

#[tokio::test]
async fn unknown_routes_are_not_found_rather_than_unauthorized()
-> anyhow::Result<()> {
    let app = build_idle_app()?;

    app.server
        .get("/api/v2/nothing")
        .await
        .assert_status(StatusCode::NOT_FOUND);
    Ok(())
}
