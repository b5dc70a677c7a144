//! Distance/ETA estimation between two coordinates.

pub mod distance_matrix;

use async_trait::async_trait;

use crate::{error::EstimationError, types::Coordinate};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteStatus {
    Ok,
    /// No route could be computed between the two points.
    ZeroResults,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteEstimate {
    pub distance_meters: u64,
    /// Human readable travel time, e.g. `"5 mins"`. Stored verbatim as ETA.
    pub duration_text: String,
    pub status: RouteStatus,
}

impl RouteEstimate {
    pub fn ok(distance_meters: u64, duration_text: impl Into<String>) -> Self {
        Self {
            distance_meters,
            duration_text: duration_text.into(),
            status: RouteStatus::Ok,
        }
    }

    pub fn zero_results() -> Self {
        Self {
            distance_meters: 0,
            duration_text: String::new(),
            status: RouteStatus::ZeroResults,
        }
    }
}

/// Performs one outbound lookup per call. Outages surface as
/// [`EstimationError::Unavailable`]; an uncomputable route is a successful
/// lookup with [`RouteStatus::ZeroResults`].
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DistanceEstimator: Send + Sync {
    async fn estimate(
        &self,
        origin: Coordinate,
        destination: Coordinate,
    ) -> Result<RouteEstimate, EstimationError>;
}
