use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::{errors::AppError, infra::app_state::AppState};

/// Header the WebSocket handshake may carry the token in.
pub const HANDSHAKE_AUTH_HEADER: &str = "auth";

/// Gate for the HTTP API. Inserts the caller's `ConnectionIdentity` into
/// request extensions.
pub async fn auth_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let credential =
        header_value(request.headers(), header::AUTHORIZATION.as_str());
    authenticate_and_run(&state, credential, request, next).await
}

/// Gate for `/ws`. Runs before the upgrade, so a rejected handshake is a
/// plain 401 and no socket is ever opened.
pub async fn ws_handshake_middleware(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let credential = handshake_credential(request.headers());
    authenticate_and_run(&state, credential, request, next).await
}

async fn authenticate_and_run(
    state: &AppState,
    credential: Option<String>,
    mut request: Request,
    next: Next,
) -> Result<Response, AppError> {
    let identity = state
        .authenticator
        .authenticate(credential.as_deref())
        .await
        .inspect_err(|err| {
            debug!(
                path = %request.uri().path(),
                error = %err,
                "request rejected"
            )
        })?;

    request.extensions_mut().insert(identity);
    Ok(next.run(request).await)
}

fn handshake_credential(headers: &HeaderMap) -> Option<String> {
    header_value(headers, HANDSHAKE_AUTH_HEADER)
        .or_else(|| header_value(headers, header::AUTHORIZATION.as_str()))
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(str::to_owned)
}
