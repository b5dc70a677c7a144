//! Layered configuration: `.env`, then `trackline.toml`, then environment
//! variables. CLI overrides are applied by the binary on top.

pub mod loader;
pub mod models;
pub mod sources;
pub mod validation;

pub use loader::{
    ConfigLoad, ConfigLoadError, ConfigLoader, ConfigLoaderOptions,
};
pub use models::{
    AuthConfig, Config, ConfigMetadata, CorsConfig, DatabaseConfig,
    GeolocationConfig, ServerConfig, TrackingConfig,
};
pub use sources::{EnvConfig, FileConfig, MalformedEnvVar};
pub use validation::{ConfigGuardRailError, ConfigWarning, ConfigWarnings};
