//! HTTP surface the package service uses to start and stop live tracking.

use axum::{
    Extension, Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tracing::info;
use trackline_core::{ConnectionIdentity, ConnectionRole, Coordinate, PackageId};

use crate::{
    errors::{AppError, AppResult},
    infra::app_state::AppState,
};

/// Roles that may start or stop tracking a single package. Couriers only
/// report positions.
const PACKAGE_MANAGERS: [ConnectionRole; 2] =
    [ConnectionRole::Observer, ConnectionRole::Other];

/// Roles that may stop tracking in bulk.
const OPERATORS: [ConnectionRole; 1] = [ConnectionRole::Other];

#[derive(Debug, Serialize, Deserialize, PartialEq)]
pub struct TrackedPosition {
    pub package_id: PackageId,
    pub position: Coordinate,
    /// Seconds until the entry lapses unless refreshed.
    pub expires_in_secs: u64,
}

#[derive(Debug, Deserialize)]
pub struct InvalidateQuery {
    pub prefix: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct InvalidateResponse {
    pub removed: usize,
}

pub async fn start_tracking(
    State(state): State<AppState>,
    Extension(caller): Extension<ConnectionIdentity>,
    Path(package_id): Path<String>,
    Json(position): Json<Coordinate>,
) -> AppResult<StatusCode> {
    require_role(&caller, &PACKAGE_MANAGERS, "start tracking")?;
    if !position.is_within_bounds() {
        return Err(AppError::bad_request("Coordinates are out of range"));
    }

    info!(user_id = %caller.user_id, %package_id, "tracking requested");
    state
        .coordinator
        .start_tracking(PackageId::from(package_id), position);
    Ok(StatusCode::NO_CONTENT)
}

pub async fn get_tracking(
    State(state): State<AppState>,
    Path(package_id): Path<String>,
) -> AppResult<Json<TrackedPosition>> {
    let entry = state.cache.entry(&package_id).ok_or_else(|| {
        let message = format!("Package {package_id} is not being tracked");
        AppError::not_found(message)
    })?;

    Ok(Json(TrackedPosition {
        expires_in_secs: entry
            .expires_at
            .saturating_duration_since(Instant::now())
            .as_secs(),
        package_id: entry.package_id,
        position: entry.position,
    }))
}

pub async fn stop_tracking(
    State(state): State<AppState>,
    Extension(caller): Extension<ConnectionIdentity>,
    Path(package_id): Path<String>,
) -> AppResult<StatusCode> {
    require_role(&caller, &PACKAGE_MANAGERS, "stop tracking")?;
    let removed = state.cache.invalidate(&package_id);
    info!(user_id = %caller.user_id, %package_id, removed, "tracking stopped");
    Ok(StatusCode::NO_CONTENT)
}

pub async fn stop_tracking_by_prefix(
    State(state): State<AppState>,
    Extension(caller): Extension<ConnectionIdentity>,
    Query(query): Query<InvalidateQuery>,
) -> AppResult<Json<InvalidateResponse>> {
    require_role(&caller, &OPERATORS, "stop tracking in bulk")?;
    let prefix = query
        .prefix
        .filter(|prefix| !prefix.is_empty())
        .ok_or_else(|| {
            AppError::bad_request("A non-empty prefix is required")
        })?;

    let removed = state.cache.invalidate_prefix(&prefix);
    info!(
        user_id = %caller.user_id,
        %prefix,
        removed,
        "tracking stopped by prefix"
    );
    Ok(Json(InvalidateResponse { removed }))
}

fn require_role(
    caller: &ConnectionIdentity,
    allowed: &[ConnectionRole],
    action: &str,
) -> AppResult<()> {
    if allowed.contains(&caller.role) {
        Ok(())
    } else {
        Err(AppError::forbidden(format!("Your role may not {action}")))
    }
}
