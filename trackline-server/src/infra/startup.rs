use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::infra::app_state::AppState;

#[async_trait]
pub trait StartupHooks: Send + Sync {
    async fn run(&self, state: &AppState) -> Result<()>;
}

/// Warms the position cache from in-transit packages and starts the
/// expiry sweeper.
#[derive(Debug, Default)]
pub struct ProdStartupHooks;

#[async_trait]
impl StartupHooks for ProdStartupHooks {
    async fn run(&self, state: &AppState) -> Result<()> {
        warm_cache(state).await;

        let period = state.config.tracking.sweep_interval;
        let _sweeper = state.cache.spawn_sweeper(period);
        info!(
            ttl = ?state.cache.ttl(),
            sweep_interval = ?period,
            "position cache sweeper started"
        );

        Ok(())
    }
}

/// Seeds the cache with every in-transit package. A store failure is logged
/// and leaves the cache as it was.
pub async fn warm_cache(state: &AppState) -> usize {
    match state.packages.active_positions().await {
        Ok(positions) => {
            let warmed = positions.len();
            for (package_id, position) in positions {
                state.cache.set(package_id, position);
            }
            info!(warmed, "position cache warmed from in-transit packages");
            warmed
        }
        Err(err) => {
            warn!(error = %err, "failed to warm position cache");
            0
        }
    }
}

#[derive(Debug, Default)]
pub struct NoopStartupHooks;

#[async_trait]
impl StartupHooks for NoopStartupHooks {
    async fn run(&self, _state: &AppState) -> Result<()> {
        Ok(())
    }
}
