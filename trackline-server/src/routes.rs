use axum::{
    Router,
    http::{HeaderName, HeaderValue, Method, header},
    middleware,
    routing::{get, put},
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::{
    auth::{
        auth_middleware, middleware::HANDSHAKE_AUTH_HEADER,
        ws_handshake_middleware,
    },
    handlers::{health, tracking, websocket},
    infra::app_state::AppState,
};

pub mod v1 {
    pub const TRACKING: &str = "/api/v1/tracking";
    pub const TRACKING_PACKAGE: &str = "/api/v1/tracking/{package_id}";
}

pub const HEALTH: &str = "/health";
pub const WEBSOCKET: &str = "/ws";

pub fn create_api_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route(
            v1::TRACKING_PACKAGE,
            put(tracking::start_tracking)
                .get(tracking::get_tracking)
                .delete(tracking::stop_tracking),
        )
        .route(
            v1::TRACKING,
            axum::routing::delete(tracking::stop_tracking_by_prefix),
        )
        .route_layer(middleware::from_fn_with_state(state, auth_middleware))
}

pub fn create_websocket_router(state: AppState) -> Router<AppState> {
    Router::new()
        .route(WEBSOCKET, get(websocket::websocket_handler))
        .route_layer(middleware::from_fn_with_state(
            state,
            ws_handshake_middleware,
        ))
}

pub fn create_app(state: AppState) -> Router {
    let cors_layer = cors_layer(&state.config().cors.allowed_origins);

    Router::new()
        .route(HEALTH, get(health::health_handler))
        .merge(create_api_router(state.clone()))
        .merge(create_websocket_router(state.clone()))
        .layer(cors_layer)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer(allowed_origins: &[String]) -> CorsLayer {
    let allow_origin = if allowed_origins.iter().any(|origin| origin == "*") {
        AllowOrigin::any()
    } else {
        let origins: Vec<HeaderValue> = allowed_origins
            .iter()
            .filter_map(|origin| HeaderValue::from_str(origin).ok())
            .collect();
        AllowOrigin::list(origins)
    };

    CorsLayer::new()
        .allow_origin(allow_origin)
        .allow_methods([
            Method::GET,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers([
            header::AUTHORIZATION,
            header::CONTENT_TYPE,
            HeaderName::from_static(HANDSHAKE_AUTH_HEADER),
        ])
}
