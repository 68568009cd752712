use std::{net::SocketAddr, time::Duration};

use thiserror::Error;
use tracing::warn;

use crate::{
    presentation::handlers::registration_handler::FormLimits,
    usecase::provision_account_usecase::AvatarUploadSettings,
};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Missing environment variable {0}")]
    Missing(&'static str),

    #[error("Invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

#[derive(Clone)]
pub struct AppConfig {
    pub database_url: String,
    pub supabase_url: String,
    pub supabase_key: String,
    pub avatar_bucket: String,
    /// Seconds clients may cache an uploaded avatar
    pub avatar_cache_control: String,
    /// Where the confirmation email sends the user back to
    pub auth_redirect_url: Option<String>,
    pub http_timeout: Duration,
    pub bind_addr: SocketAddr,
    /// Untouched forms older than this are dropped when a new one opens
    pub form_idle_ttl: Duration,
    pub max_open_forms: usize,
}

impl AppConfig {
    /// Reads the process environment; a `.env` file should already be loaded by the caller.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| dotenvy::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let required = |key: &'static str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .ok_or(ConfigError::Missing(key))
        };
        let optional = |key: &'static str, default: &str| {
            lookup(key)
                .filter(|v| !v.trim().is_empty())
                .unwrap_or_else(|| {
                    warn!("{key} not set, using default: {default}");
                    default.to_string()
                })
        };

        let supabase_url = required("SUPABASE_URL")?;
        if !(supabase_url.starts_with("https://") || supabase_url.starts_with("http://")) {
            return Err(ConfigError::Invalid {
                key: "SUPABASE_URL",
                reason: "must be an http(s) URL".to_string(),
            });
        }

        let avatar_cache_control = optional("AVATAR_CACHE_CONTROL", "3600");
        if avatar_cache_control.parse::<u32>().is_err() {
            return Err(ConfigError::Invalid {
                key: "AVATAR_CACHE_CONTROL",
                reason: "must be a number of seconds".to_string(),
            });
        }

        let http_timeout = optional("HTTP_TIMEOUT_SECS", "15")
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::Invalid {
                key: "HTTP_TIMEOUT_SECS",
                reason: e.to_string(),
            })?;

        let bind_addr = optional("BIND_ADDR", "0.0.0.0:8080")
            .parse::<SocketAddr>()
            .map_err(|e| ConfigError::Invalid {
                key: "BIND_ADDR",
                reason: e.to_string(),
            })?;

        let form_idle_ttl = optional("FORM_IDLE_TTL_SECS", "1800")
            .parse::<u64>()
            .map(Duration::from_secs)
            .map_err(|e| ConfigError::Invalid {
                key: "FORM_IDLE_TTL_SECS",
                reason: e.to_string(),
            })?;

        let max_open_forms = match optional("MAX_OPEN_FORMS", "1000").parse::<usize>() {
            Ok(max) if max > 0 => max,
            _ => {
                return Err(ConfigError::Invalid {
                    key: "MAX_OPEN_FORMS",
                    reason: "must be a positive number".to_string(),
                });
            }
        };

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            supabase_url,
            supabase_key: required("SUPABASE_KEY")?,
            avatar_bucket: optional("AVATAR_BUCKET", "avatars"),
            avatar_cache_control,
            auth_redirect_url: lookup("AUTH_REDIRECT_URL").filter(|v| !v.trim().is_empty()),
            http_timeout,
            bind_addr,
            form_idle_ttl,
            max_open_forms,
        })
    }

    pub fn form_limits(&self) -> FormLimits {
        FormLimits {
            idle_ttl: self.form_idle_ttl,
            max_open: self.max_open_forms,
        }
    }

    pub fn avatar_settings(&self) -> AvatarUploadSettings {
        AvatarUploadSettings {
            bucket: self.avatar_bucket.clone(),
            cache_control: self.avatar_cache_control.clone(),
        }
    }
}
