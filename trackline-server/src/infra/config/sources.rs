use serde::{Deserialize, Serialize};
use std::{path::PathBuf, str::FromStr};

/// Raw configuration as defined in a TOML file.
#[derive(Debug, Default, Clone, Deserialize, Serialize)]
#[serde(rename_all = "snake_case")]
pub struct FileConfig {
    #[serde(default)]
    pub server: FileServerConfig,
    #[serde(default)]
    pub database: FileDatabaseConfig,
    #[serde(default)]
    pub auth: FileAuthConfig,
    #[serde(default)]
    pub tracking: FileTrackingConfig,
    #[serde(default)]
    pub geolocation: FileGeolocationConfig,
    #[serde(default)]
    pub cors: FileCorsConfig,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileServerConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub host: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileDatabaseConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileAuthConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub jwt_secret: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_secrets: Option<Vec<String>>,
    /// Humantime string, e.g. `"90d"`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_ttl: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileTrackingConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distance_threshold_meters: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_ttl: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sweep_interval: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub estimator_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub persistence_timeout: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub outbound_buffer: Option<usize>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileGeolocationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Default, Clone, Deserialize, Serialize)]
pub struct FileCorsConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub allowed_origins: Option<Vec<String>>,
}

/// Environment-derived configuration values.
#[derive(Debug, Default, Clone)]
pub struct EnvConfig {
    pub config_path: Option<PathBuf>,
    pub server_host: Option<String>,
    pub server_port: Option<u16>,
    pub database_url: Option<String>,
    pub jwt_secret: Option<String>,
    pub jwt_previous_secrets: Option<Vec<String>>,
    pub jwt_expires_in: Option<String>,
    pub distance_threshold_meters: Option<u64>,
    pub cache_ttl: Option<String>,
    pub sweep_interval: Option<String>,
    pub estimator_timeout: Option<String>,
    pub persistence_timeout: Option<String>,
    pub outbound_buffer: Option<usize>,
    pub geolocation_api: Option<String>,
    pub geolocation_api_key: Option<String>,
    pub cors_allowed_origins: Option<Vec<String>>,
    /// Variables that were set but could not be parsed.
    pub malformed: Vec<MalformedEnvVar>,
}

/// An environment variable whose value did not parse as its expected type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MalformedEnvVar {
    pub name: &'static str,
    pub value: String,
}

impl EnvConfig {
    pub fn gather() -> Self {
        let mut malformed = Vec::new();
        let server_port = parse_var("SERVER_PORT", &mut malformed);
        let distance_threshold_meters =
            parse_var("TRACKING_DISTANCE_THRESHOLD_METERS", &mut malformed);
        let outbound_buffer =
            parse_var("TRACKING_OUTBOUND_BUFFER", &mut malformed);

        Self {
            config_path: std::env::var("TRACKLINE_CONFIG")
                .ok()
                .map(PathBuf::from),
            server_host: std::env::var("SERVER_HOST").ok(),
            server_port,
            database_url: std::env::var("DATABASE_URL")
                .or_else(|_| std::env::var("POSTGRESQL_CONNECTION_URI"))
                .ok(),
            jwt_secret: std::env::var("JWT_SECRET").ok(),
            jwt_previous_secrets: parse_csv_var("JWT_PREVIOUS_SECRETS"),
            jwt_expires_in: std::env::var("JWT_EXPIRES_IN").ok(),
            distance_threshold_meters,
            cache_ttl: std::env::var("TRACKING_CACHE_TTL").ok(),
            sweep_interval: std::env::var("TRACKING_SWEEP_INTERVAL").ok(),
            estimator_timeout: std::env::var("TRACKING_ESTIMATOR_TIMEOUT")
                .ok(),
            persistence_timeout: std::env::var("TRACKING_PERSISTENCE_TIMEOUT")
                .ok(),
            outbound_buffer,
            geolocation_api: std::env::var("GEOLOCATION_API").ok(),
            geolocation_api_key: std::env::var("GEOLOCATION_API_KEY").ok(),
            cors_allowed_origins: parse_csv_var("CORS_ALLOWED_ORIGINS"),
            malformed,
        }
    }
}

fn parse_var<T: FromStr>(
    name: &'static str,
    malformed: &mut Vec<MalformedEnvVar>,
) -> Option<T> {
    parse_value(name, std::env::var(name).ok(), malformed)
}

/// Parses a raw variable value. A value that is present but unparsable is
/// recorded in `malformed` rather than dropped.
fn parse_value<T: FromStr>(
    name: &'static str,
    raw: Option<String>,
    malformed: &mut Vec<MalformedEnvVar>,
) -> Option<T> {
    let raw = raw?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(_) => {
            malformed.push(MalformedEnvVar { name, value: raw });
            None
        }
    }
}

fn parse_csv_var(name: &str) -> Option<Vec<String>> {
    std::env::var(name).ok().map(|raw| split_csv(&raw))
}

pub(crate) fn split_csv(raw: &str) -> Vec<String> {
    raw.split(',')
        .filter_map(|part| {
            let trimmed = part.trim();
            if trimmed.is_empty() {
                None
            } else {
                Some(trimmed.to_string())
            }
        })
        .collect()
}
