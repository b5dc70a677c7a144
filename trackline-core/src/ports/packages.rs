use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    error::StoreError,
    types::{Coordinate, PackageId, PackageStatus},
};

// Package persistence used by the tracking path
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait PackageStore: Send + Sync {
    /// Durable position write. Fails with [`StoreError::NotFound`] when the
    /// package row does not exist.
    async fn update_package_position(
        &self,
        package_id: &PackageId,
        position: Coordinate,
        eta: &str,
        status: PackageStatus,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError>;

    /// Last persisted position of every package currently in transit.
    async fn active_positions(
        &self,
    ) -> Result<Vec<(PackageId, Coordinate)>, StoreError>;
}
