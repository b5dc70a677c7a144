use thiserror::Error;

use super::models::Config;

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Error)]
pub enum ConfigGuardRailError {
    #[error("JWT_SECRET must be set to verify connection credentials")]
    MissingJwtSecret,
    #[error("distance threshold must be greater than zero")]
    InvalidThreshold,
    #[error("outbound buffer must hold at least one event")]
    InvalidOutboundBuffer,
    #[error("{field} must be greater than zero")]
    ZeroDuration { field: &'static str },
}

#[derive(Debug, Clone)]
pub struct ConfigWarning {
    pub message: String,
    pub hint: Option<String>,
}

#[derive(Debug, Default, Clone)]
pub struct ConfigWarnings {
    pub items: Vec<ConfigWarning>,
}

impl ConfigWarnings {
    pub fn push<S: Into<String>>(&mut self, message: S) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: None,
        });
    }

    pub fn push_with_hint<S: Into<String>, H: Into<String>>(
        &mut self,
        message: S,
        hint: H,
    ) {
        self.items.push(ConfigWarning {
            message: message.into(),
            hint: Some(hint.into()),
        });
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn extend(&mut self, other: ConfigWarnings) {
        self.items.extend(other.items);
    }

    pub fn contains(&self, needle: &str) -> bool {
        self.items.iter().any(|warning| warning.message.contains(needle))
    }
}

pub fn apply_guard_rails(
    config: &Config,
) -> Result<ConfigWarnings, ConfigGuardRailError> {
    let mut warnings = ConfigWarnings::default();

    if config.auth.jwt_secret.trim().is_empty() {
        return Err(ConfigGuardRailError::MissingJwtSecret);
    }
    if config.auth.jwt_secret.len() < MIN_SECRET_LEN {
        warnings.push_with_hint(
            format!("JWT secret is shorter than {MIN_SECRET_LEN} bytes"),
            "Generate one with `openssl rand -hex 32`",
        );
    }

    let tracking = &config.tracking;
    if tracking.distance_threshold_meters == 0 {
        return Err(ConfigGuardRailError::InvalidThreshold);
    }
    if tracking.outbound_buffer == 0 {
        return Err(ConfigGuardRailError::InvalidOutboundBuffer);
    }
    for (field, value) in [
        ("tracking.cache_ttl", tracking.cache_ttl),
        ("tracking.sweep_interval", tracking.sweep_interval),
        ("tracking.estimator_timeout", tracking.estimator_timeout),
        ("tracking.persistence_timeout", tracking.persistence_timeout),
        ("auth.token_ttl", config.auth.token_ttl),
    ] {
        if value.is_zero() {
            return Err(ConfigGuardRailError::ZeroDuration { field });
        }
    }
    if tracking.sweep_interval > tracking.cache_ttl {
        warnings.push(
            "tracking.sweep_interval exceeds cache_ttl; expired entries will linger past their TTL",
        );
    }

    if config.geolocation.api_key.is_none() {
        warnings.push_with_hint(
            "GEOLOCATION_API_KEY not configured; distance lookups will be sent without a key",
            "Set GEOLOCATION_API_KEY or geolocation.api_key in trackline.toml",
        );
    }

    if config.cors.is_wildcard() {
        warnings.push("CORS allows any origin");
    }

    Ok(warnings)
}
