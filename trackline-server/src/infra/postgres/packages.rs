use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{PgPool, Row, types::Json};
use tracing::warn;
use trackline_core::{
    Coordinate, PackageId, PackageStatus, PackageStore, StoreError,
};

use super::{column_error, db_error};

/// `{lat, lng}` shape of `packages.exact_location_coordinates`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
struct StoredCoordinate {
    #[serde(alias = "latitude")]
    lat: f64,
    #[serde(alias = "longitude")]
    lng: f64,
}

impl From<Coordinate> for StoredCoordinate {
    fn from(value: Coordinate) -> Self {
        Self {
            lat: value.latitude,
            lng: value.longitude,
        }
    }
}

impl From<StoredCoordinate> for Coordinate {
    fn from(value: StoredCoordinate) -> Self {
        Coordinate::new(value.lat, value.lng)
    }
}

#[derive(Debug, Clone)]
pub struct PostgresPackageStore {
    pool: PgPool,
}

impl PostgresPackageStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl PackageStore for PostgresPackageStore {
    async fn update_package_position(
        &self,
        package_id: &PackageId,
        position: Coordinate,
        eta: &str,
        status: PackageStatus,
        timestamp: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        let result = sqlx::query(
            r#"
            UPDATE packages
            SET exact_location_coordinates = $1,
                status_time_stamp = $2,
                estimated_time_of_arrival = $3,
                status = $4
            WHERE package_id = $5
            "#,
        )
        .bind(Json(StoredCoordinate::from(position)))
        .bind(timestamp.timestamp_millis())
        .bind(eta)
        .bind(status.as_str())
        .bind(package_id.as_str())
        .execute(&self.pool)
        .await
        .map_err(db_error)?;

        if result.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("package {package_id}")));
        }
        Ok(())
    }

    async fn active_positions(
        &self,
    ) -> Result<Vec<(PackageId, Coordinate)>, StoreError> {
        let rows = sqlx::query(
            r#"
            SELECT package_id, exact_location_coordinates
            FROM packages
            WHERE status = $1 AND exact_location_coordinates IS NOT NULL
            "#,
        )
        .bind(PackageStatus::InTransit.as_str())
        .fetch_all(&self.pool)
        .await
        .map_err(db_error)?;

        let mut positions = Vec::with_capacity(rows.len());
        for row in rows {
            let package_id: String = row
                .try_get("package_id")
                .map_err(|e| column_error("package_id", e))?;
            let stored = row.try_get::<Json<StoredCoordinate>, _>(
                "exact_location_coordinates",
            );
            match stored {
                Ok(Json(stored)) => {
                    let package_id = PackageId::from(package_id);
                    positions.push((package_id, stored.into()));
                }
                Err(err) => {
                    warn!(
                        %package_id,
                        error = %err,
                        "skipping package with unreadable coordinates"
                    );
                }
            }
        }
        Ok(positions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stored_shape_uses_short_keys() {
        let stored = StoredCoordinate::from(Coordinate::new(6.5244, 3.3792));
        assert_eq!(
            serde_json::to_value(stored).unwrap(),
            serde_json::json!({ "lat": 6.5244, "lng": 3.3792 })
        );
    }

    #[test]
    fn long_keys_are_accepted_on_read() {
        let raw = r#"{"latitude": 1.5, "longitude": 2.5}"#;
        let stored: StoredCoordinate = serde_json::from_str(raw).unwrap();
        assert_eq!(Coordinate::from(stored), Coordinate::new(1.5, 2.5));
    }
}
