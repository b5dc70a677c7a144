use std::{fmt, path::PathBuf, time::Duration};

use trackline_core::TrackingSettings;
use url::Url;

pub const DEFAULT_DISTANCE_MATRIX_URL: &str =
    "https://maps.googleapis.com/maps/api/distancematrix/json";

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub tracking: TrackingConfig,
    pub geolocation: GeolocationConfig,
    pub cors: CorsConfig,
    pub metadata: ConfigMetadata,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Clone)]
pub struct DatabaseConfig {
    pub url: Option<String>,
}

impl fmt::Debug for DatabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DatabaseConfig")
            .field("url_configured", &self.url.is_some())
            .finish()
    }
}

#[derive(Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Retired signing secrets still accepted for verification.
    pub previous_secrets: Vec<String>,
    pub token_ttl: Duration,
}

impl fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("previous_secrets", &self.previous_secrets.len())
            .field("token_ttl", &self.token_ttl)
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackingConfig {
    pub distance_threshold_meters: u64,
    pub cache_ttl: Duration,
    pub sweep_interval: Duration,
    pub estimator_timeout: Duration,
    pub persistence_timeout: Duration,
    /// Capacity of each connection's outbound event queue.
    pub outbound_buffer: usize,
}

impl TrackingConfig {
    pub fn settings(&self) -> TrackingSettings {
        TrackingSettings {
            distance_threshold_meters: self.distance_threshold_meters,
            estimator_timeout: self.estimator_timeout,
            persistence_timeout: self.persistence_timeout,
        }
    }

    /// One fifth of the TTL, never below one second.
    pub fn default_sweep_interval(cache_ttl: Duration) -> Duration {
        (cache_ttl / 5).max(Duration::from_secs(1))
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        let defaults = TrackingSettings::default();
        let cache_ttl = trackline_core::cache::DEFAULT_TTL;
        Self {
            distance_threshold_meters: defaults.distance_threshold_meters,
            cache_ttl,
            sweep_interval: Self::default_sweep_interval(cache_ttl),
            estimator_timeout: defaults.estimator_timeout,
            persistence_timeout: defaults.persistence_timeout,
            outbound_buffer: 64,
        }
    }
}

#[derive(Clone)]
pub struct GeolocationConfig {
    pub api_url: Url,
    pub api_key: Option<String>,
}

impl fmt::Debug for GeolocationConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GeolocationConfig")
            .field("api_url", &self.api_url.as_str())
            .field("api_key_configured", &self.api_key.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
}

impl CorsConfig {
    pub fn is_wildcard(&self) -> bool {
        self.allowed_origins.iter().any(|origin| origin == "*")
    }
}

#[derive(Debug, Clone, Default)]
pub struct ConfigMetadata {
    pub config_path: Option<PathBuf>,
    pub env_file_loaded: bool,
}
