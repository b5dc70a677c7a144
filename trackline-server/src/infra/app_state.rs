use std::{fmt, sync::Arc};

use trackline_core::{
    ConnectionAuthenticator, DistanceEstimator, LocationCoordinator,
    PackageStore, PositionCache, TopicRouter,
};

use crate::infra::config::Config;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub cache: Arc<PositionCache>,
    pub router: Arc<TopicRouter>,
    pub coordinator: Arc<LocationCoordinator>,
    pub authenticator: Arc<ConnectionAuthenticator>,
    pub packages: Arc<dyn PackageStore>,
}

impl fmt::Debug for AppState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppState")
            .field("cached_packages", &self.cache.len())
            .field("connections", &self.router.connection_count())
            .finish_non_exhaustive()
    }
}

impl AppState {
    /// Wires the tracking components around the given collaborators.
    pub fn new(
        config: Arc<Config>,
        authenticator: ConnectionAuthenticator,
        estimator: Arc<dyn DistanceEstimator>,
        packages: Arc<dyn PackageStore>,
    ) -> Self {
        let cache = Arc::new(PositionCache::new(config.tracking.cache_ttl));
        let router = Arc::new(TopicRouter::new());
        let coordinator = Arc::new(LocationCoordinator::new(
            Arc::clone(&cache),
            estimator,
            Arc::clone(&packages),
            Arc::clone(&router),
            config.tracking.settings(),
        ));

        Self {
            config,
            cache,
            router,
            coordinator,
            authenticator: Arc::new(authenticator),
            packages,
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }
}
