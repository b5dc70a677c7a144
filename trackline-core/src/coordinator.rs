//! Location Update Coordinator.
//!
//! Drives one courier report through gate, estimate, threshold decision,
//! cache refresh and broadcast. The cache follows the courier at reporting
//! resolution; the database only follows "significant" movement. Observers
//! always get the raw position, whether or not anything was persisted.

use chrono::Utc;
use std::{fmt, sync::Arc, time::Duration};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::{
    cache::PositionCache,
    error::{
        EstimationError, PersistenceError, TrackingError, TrackingGateError,
    },
    estimator::{DistanceEstimator, RouteStatus},
    events::ServerEvent,
    ports::PackageStore,
    realtime::{Connection, TopicRouter},
    types::{ConnectionId, Coordinate, LocationUpdate, PackageId, PackageStatus},
};

/// Movement at or beyond this distance is persisted.
pub const DEFAULT_DISTANCE_THRESHOLD_METERS: u64 = 30;

/// Tunables for [`LocationCoordinator`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingSettings {
    /// Minimum estimated movement, in meters, before a report is persisted.
    pub distance_threshold_meters: u64,
    /// Upper bound on one estimator lookup.
    pub estimator_timeout: Duration,
    /// Upper bound on one durable write.
    pub persistence_timeout: Duration,
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            distance_threshold_meters: DEFAULT_DISTANCE_THRESHOLD_METERS,
            estimator_timeout: Duration::from_secs(10),
            persistence_timeout: Duration::from_secs(5),
        }
    }
}

/// What happened to an accepted report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateOutcome {
    pub distance_meters: u64,
    pub eta: String,
    /// Whether a durable write was attempted and succeeded.
    pub persisted: bool,
    /// Observers the broadcast was enqueued for.
    pub observers_notified: usize,
}

pub struct LocationCoordinator {
    cache: Arc<PositionCache>,
    estimator: Arc<dyn DistanceEstimator>,
    packages: Arc<dyn PackageStore>,
    router: Arc<TopicRouter>,
    settings: TrackingSettings,
}

impl fmt::Debug for LocationCoordinator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("LocationCoordinator")
            .field("cache", &self.cache)
            .field("router", &self.router)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl LocationCoordinator {
    pub fn new(
        cache: Arc<PositionCache>,
        estimator: Arc<dyn DistanceEstimator>,
        packages: Arc<dyn PackageStore>,
        router: Arc<TopicRouter>,
        settings: TrackingSettings,
    ) -> Self {
        Self {
            cache,
            estimator,
            packages,
            router,
            settings,
        }
    }

    pub fn settings(&self) -> &TrackingSettings {
        &self.settings
    }

    /// Handle a courier report and route any failure back to that courier
    /// alone. Never fails.
    pub async fn handle_report(
        &self,
        reporter: &Connection,
        update: LocationUpdate,
    ) {
        match self.process_report(&update).await {
            Ok(outcome) => {
                debug!(
                    conn_id = %reporter.id(),
                    package_id = %update.package_id,
                    distance_m = outcome.distance_meters,
                    persisted = outcome.persisted,
                    observers = outcome.observers_notified,
                    "position report processed"
                );
            }
            Err(err) => {
                warn!(
                    conn_id = %reporter.id(),
                    user_id = %reporter.identity().user_id,
                    package_id = %update.package_id,
                    retryable = err.is_retryable(),
                    error = %err,
                    "position report rejected"
                );
                let event = ServerEvent::error(err.client_message());
                if let Err(delivery) = reporter.deliver(event) {
                    debug!(
                        conn_id = %reporter.id(),
                        error = %delivery,
                        "error event not delivered"
                    );
                }
            }
        }
    }

    /// The update algorithm proper.
    ///
    /// A persistence failure still refreshes the cache and broadcasts before
    /// the error is returned; every other failure leaves all state untouched.
    /// A package whose entry disappears mid-report is treated as untracked
    /// and its entry is not recreated.
    pub async fn process_report(
        &self,
        update: &LocationUpdate,
    ) -> Result<UpdateOutcome, TrackingError> {
        let package_id = &update.package_id;

        let origin = self
            .cache
            .get(package_id.as_str())
            .ok_or_else(|| stopped(package_id))?;

        let estimate = timeout(
            self.settings.estimator_timeout,
            self.estimator.estimate(origin, update.position),
        )
        .await
        .map_err(|_| {
            EstimationError::Unavailable("distance lookup timed out".into())
        })??;

        if estimate.status == RouteStatus::ZeroResults {
            return Err(EstimationError::ZeroResults.into());
        }

        // Tracking may have been stopped while the lookup was in flight.
        if !self.cache.has(package_id.as_str()) {
            return Err(stopped(package_id));
        }

        let durable = estimate.distance_meters
            >= self.settings.distance_threshold_meters;
        let persistence = if durable {
            self.persist(package_id, update.position, &estimate.duration_text)
                .await
        } else {
            Ok(())
        };

        if !self
            .cache
            .refresh_if_present(package_id.as_str(), update.position)
        {
            return Err(stopped(package_id));
        }
        let observers_notified = self
            .router
            .publish(package_id.topic(), ServerEvent::broadcast(update));

        persistence?;

        if durable {
            info!(
                %package_id,
                distance_m = estimate.distance_meters,
                eta = %estimate.duration_text,
                "durable position update written"
            );
        }

        Ok(UpdateOutcome {
            distance_meters: estimate.distance_meters,
            eta: estimate.duration_text,
            persisted: durable,
            observers_notified,
        })
    }

    async fn persist(
        &self,
        package_id: &PackageId,
        position: Coordinate,
        eta: &str,
    ) -> Result<(), PersistenceError> {
        let write = self.packages.update_package_position(
            package_id,
            position,
            eta,
            PackageStatus::InTransit,
            Utc::now(),
        );

        match timeout(self.settings.persistence_timeout, write).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(source)) => Err(PersistenceError::Store {
                package_id: package_id.clone(),
                source,
            }),
            Err(_) => Err(PersistenceError::TimedOut {
                package_id: package_id.clone(),
            }),
        }
    }

    /// Observer subscription. Joining always succeeds; when the package is
    /// not live the subscriber is told so directly.
    pub fn subscribe(
        &self,
        conn_id: ConnectionId,
        package_id: &PackageId,
    ) -> bool {
        self.router.join(conn_id, package_id.topic());

        if self.cache.has(package_id.as_str()) {
            debug!(%conn_id, %package_id, "observer joined package topic");
            true
        } else {
            let gate = TrackingGateError {
                package_id: package_id.clone(),
            };
            self.router
                .send_to(conn_id, ServerEvent::error(gate.to_string()));
            false
        }
    }

    pub fn unsubscribe(&self, conn_id: ConnectionId, package_id: &PackageId) {
        self.router.leave(conn_id, package_id.topic());
    }

    /// Seed the cache for a package that has just become trackable.
    pub fn start_tracking(&self, package_id: PackageId, position: Coordinate) {
        info!(%package_id, %position, "package tracking started");
        self.cache.set(package_id, position);
    }
}

fn stopped(package_id: &PackageId) -> TrackingError {
    TrackingGateError {
        package_id: package_id.clone(),
    }
    .into()
}
