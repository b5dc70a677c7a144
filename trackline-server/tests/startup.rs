mod common;

use trackline_core::{
    Coordinate, MockDistanceEstimator, MockPackageStore, PackageId, StoreError,
};
use trackline_server::infra::startup::{
    NoopStartupHooks, StartupHooks, warm_cache,
};

use common::build_test_app;

#[tokio::test]
async fn warm_cache_seeds_in_transit_packages() -> anyhow::Result<()> {
    let mut packages = MockPackageStore::new();
    packages.expect_active_positions().times(1).returning(|| {
        Ok(vec![
            (PackageId::from("PKG1"), Coordinate::new(6.5, 3.3)),
            (PackageId::from("PKG2"), Coordinate::new(9.07, 7.49)),
        ])
    });
    let app = build_test_app(MockDistanceEstimator::new(), packages)?;

    assert_eq!(warm_cache(&app.state).await, 2);
    assert_eq!(
        app.state.cache.get("PKG2"),
        Some(Coordinate::new(9.07, 7.49))
    );
    Ok(())
}

#[tokio::test]
async fn warm_cache_survives_store_failure() -> anyhow::Result<()> {
    let mut packages = MockPackageStore::new();
    packages
        .expect_active_positions()
        .returning(|| Err(StoreError::Database("connection refused".into())));
    let app = build_test_app(MockDistanceEstimator::new(), packages)?;
    app.state.cache.set("PKG1".into(), Coordinate::new(1.0, 1.0));

    assert_eq!(warm_cache(&app.state).await, 0);
    assert_eq!(app.state.cache.len(), 1);
    Ok(())
}

#[tokio::test]
async fn noop_hooks_leave_state_untouched() -> anyhow::Result<()> {
    let mut packages = MockPackageStore::new();
    packages.expect_active_positions().never();
    let app = build_test_app(MockDistanceEstimator::new(), packages)?;

    NoopStartupHooks.run(&app.state).await?;
    assert!(app.state.cache.is_empty());
    Ok(())
}
