use std::{
    fs,
    path::{Path, PathBuf},
    time::Duration,
};
use thiserror::Error;
use url::Url;

use super::{
    models::{
        AuthConfig, Config, ConfigMetadata, CorsConfig,
        DEFAULT_DISTANCE_MATRIX_URL, DatabaseConfig, GeolocationConfig,
        ServerConfig, TrackingConfig,
    },
    sources::{EnvConfig, FileConfig},
    validation::{self, ConfigGuardRailError, ConfigWarnings},
};

const DEFAULT_CONFIG_LOCATIONS: [&str; 2] =
    ["trackline.toml", "config/trackline.toml"];
const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Default, Clone)]
pub struct ConfigLoaderOptions {
    pub config_path: Option<PathBuf>,
    pub env_file: Option<PathBuf>,
}

#[derive(Debug, Default)]
pub struct ConfigLoader {
    options: ConfigLoaderOptions,
}

impl ConfigLoader {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: ConfigLoaderOptions) -> Self {
        Self { options }
    }

    pub fn with_config_path<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.options.config_path = Some(path.into());
        self
    }

    pub fn load(&self) -> Result<ConfigLoad, ConfigLoadError> {
        let env_file_loaded = match &self.options.env_file {
            Some(path) => dotenvy::from_path(path)
                .map(|_| true)
                .or_else(|err| match err {
                    dotenvy::Error::Io(_) => Ok(false),
                    _ => Err(err),
                })?,
            None => dotenvy::dotenv().map(|_| true).or_else(|err| match err {
                dotenvy::Error::Io(_) => Ok(false),
                _ => Err(err),
            })?,
        };

        self.load_with_env(EnvConfig::gather(), env_file_loaded)
    }

    /// Everything [`load`](Self::load) does after the process environment
    /// has been read.
    pub fn load_with_env(
        &self,
        env: EnvConfig,
        env_file_loaded: bool,
    ) -> Result<ConfigLoad, ConfigLoadError> {
        let (file_config, config_path) = self.load_file_config(&env)?;
        let (config, warnings) = Self::compose_config(
            file_config,
            env,
            config_path,
            env_file_loaded,
        )?;
        Ok(ConfigLoad { config, warnings })
    }

    fn load_file_config(
        &self,
        env: &EnvConfig,
    ) -> Result<(Option<FileConfig>, Option<PathBuf>), ConfigLoadError> {
        let explicit = self
            .options
            .config_path
            .clone()
            .or_else(|| env.config_path.clone());

        let path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigLoadError::MissingConfig { path });
                }
                path
            }
            None => match DEFAULT_CONFIG_LOCATIONS
                .iter()
                .map(PathBuf::from)
                .find(|candidate| candidate.exists())
            {
                Some(path) => path,
                None => return Ok((None, None)),
            },
        };

        let file_config = read_file_config(&path)?;
        Ok((Some(file_config), Some(path)))
    }

    pub fn compose_config(
        file_config: Option<FileConfig>,
        env: EnvConfig,
        config_path: Option<PathBuf>,
        env_file_loaded: bool,
    ) -> Result<(Config, ConfigWarnings), ConfigLoadError> {
        if let Some(bad) = env.malformed.first() {
            return Err(ConfigLoadError::InvalidEnvValue {
                name: bad.name,
                value: bad.value.clone(),
            });
        }

        let mut warnings = ConfigWarnings::default();

        if file_config.is_none() {
            warnings.push_with_hint(
                "No trackline.toml detected; falling back to environment variables",
                "Set TRACKLINE_CONFIG or place trackline.toml in the working directory",
            );
        }

        let FileConfig {
            server: file_server,
            database: file_database,
            auth: file_auth,
            tracking: file_tracking,
            geolocation: file_geolocation,
            cors: file_cors,
        } = file_config.unwrap_or_default();

        let server = ServerConfig {
            host: env
                .server_host
                .or(file_server.host)
                .unwrap_or_else(|| "0.0.0.0".to_string()),
            port: env.server_port.or(file_server.port).unwrap_or(3000),
        };

        let database = DatabaseConfig {
            url: env
                .database_url
                .or(file_database.url)
                .filter(|url| !url.trim().is_empty()),
        };

        let auth = AuthConfig {
            jwt_secret: env
                .jwt_secret
                .or(file_auth.jwt_secret)
                .unwrap_or_default(),
            previous_secrets: env
                .jwt_previous_secrets
                .or(file_auth.previous_secrets)
                .unwrap_or_default(),
            token_ttl: duration_field(
                "auth.token_ttl",
                env.jwt_expires_in.or(file_auth.token_ttl),
            )?
            .unwrap_or(DEFAULT_TOKEN_TTL),
        };

        let defaults = TrackingConfig::default();
        let cache_ttl = duration_field(
            "tracking.cache_ttl",
            env.cache_ttl.or(file_tracking.cache_ttl),
        )?
        .unwrap_or(defaults.cache_ttl);
        let tracking = TrackingConfig {
            distance_threshold_meters: env
                .distance_threshold_meters
                .or(file_tracking.distance_threshold_meters)
                .unwrap_or(defaults.distance_threshold_meters),
            cache_ttl,
            sweep_interval: duration_field(
                "tracking.sweep_interval",
                env.sweep_interval.or(file_tracking.sweep_interval),
            )?
            .unwrap_or_else(|| {
                TrackingConfig::default_sweep_interval(cache_ttl)
            }),
            estimator_timeout: duration_field(
                "tracking.estimator_timeout",
                env.estimator_timeout.or(file_tracking.estimator_timeout),
            )?
            .unwrap_or(defaults.estimator_timeout),
            persistence_timeout: duration_field(
                "tracking.persistence_timeout",
                env.persistence_timeout.or(file_tracking.persistence_timeout),
            )?
            .unwrap_or(defaults.persistence_timeout),
            outbound_buffer: env
                .outbound_buffer
                .or(file_tracking.outbound_buffer)
                .unwrap_or(defaults.outbound_buffer),
        };

        let raw_api_url = env
            .geolocation_api
            .or(file_geolocation.api_url)
            .filter(|url| !url.trim().is_empty())
            .unwrap_or_else(|| DEFAULT_DISTANCE_MATRIX_URL.to_string());
        let geolocation = GeolocationConfig {
            api_url: Url::parse(raw_api_url.trim()).map_err(|source| {
                ConfigLoadError::InvalidGeolocationUrl { source }
            })?,
            api_key: env
                .geolocation_api_key
                .or(file_geolocation.api_key)
                .filter(|key| !key.trim().is_empty()),
        };

        let cors = CorsConfig {
            allowed_origins: env
                .cors_allowed_origins
                .or(file_cors.allowed_origins)
                .unwrap_or_else(default_cors_origins),
        };

        let config = Config {
            server,
            database,
            auth,
            tracking,
            geolocation,
            cors,
            metadata: ConfigMetadata {
                config_path,
                env_file_loaded,
            },
        };

        warnings.extend(validation::apply_guard_rails(&config)?);

        Ok((config, warnings))
    }
}

fn read_file_config(path: &Path) -> Result<FileConfig, ConfigLoadError> {
    let contents =
        fs::read_to_string(path).map_err(|source| ConfigLoadError::Io {
            path: path.to_path_buf(),
            source,
        })?;
    toml::from_str(&contents).map_err(|source| ConfigLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

fn duration_field(
    field: &'static str,
    raw: Option<String>,
) -> Result<Option<Duration>, ConfigLoadError> {
    raw.map(|value| {
        humantime::parse_duration(value.trim()).map_err(|source| {
            ConfigLoadError::InvalidDuration {
                field,
                value,
                source,
            }
        })
    })
    .transpose()
}

fn default_cors_origins() -> Vec<String> {
    vec![
        "http://localhost:3000".to_string(),
        "http://localhost:5173".to_string(),
    ]
}

#[derive(Debug, Error)]
pub enum ConfigLoadError {
    #[error("configuration file missing: {path}")]
    MissingConfig { path: PathBuf },
    #[error("failed to read configuration {path}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse configuration {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
    #[error("invalid duration for {field}: '{value}'")]
    InvalidDuration {
        field: &'static str,
        value: String,
        #[source]
        source: humantime::DurationError,
    },
    #[error("invalid value for {name}: '{value}'")]
    InvalidEnvValue { name: &'static str, value: String },
    #[error("invalid geolocation API URL")]
    InvalidGeolocationUrl {
        #[source]
        source: url::ParseError,
    },
    #[error(transparent)]
    GuardRail(#[from] ConfigGuardRailError),
    #[error(transparent)]
    EnvFile(#[from] dotenvy::Error),
}

#[derive(Debug)]
pub struct ConfigLoad {
    pub config: Config,
    pub warnings: ConfigWarnings,
}
