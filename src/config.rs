use std::{env, fmt::Display, path::PathBuf, str::FromStr};

use log::{info, warn};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Environment variable {0} is required")]
    Missing(&'static str),

    #[error("Invalid {key} value: {info}")]
    Invalid { key: &'static str, info: String },
}

#[derive(Debug, Clone)]
pub struct Config {
    pub database_url: String,
    pub port: u16,
    pub secret_key: String,
    pub token_lifetime_hours: i64,
    pub media_root: PathBuf,
    pub media_url: String,
    pub max_upload_bytes: u64,
}

impl Config {
    pub fn load() -> Result<Self, ConfigError> {
        let media_url: String = try_load("MEDIA_URL", "/media/")?;

        Ok(Self {
            database_url: required("DATABASE_URL")?,
            port: try_load("PORT", "8000")?,
            secret_key: required("SECRET_KEY")?,
            token_lifetime_hours: try_load("TOKEN_LIFETIME_HOURS", "24")?,
            media_root: try_load("MEDIA_ROOT", "media")?,
            media_url: with_trailing_slash(media_url),
            max_upload_bytes: try_load("MAX_UPLOAD_BYTES", "10485760")?,
        })
    }
}

fn var(key: &str) -> Option<String> {
    env::var(key).ok()
}

fn required(key: &'static str) -> Result<String, ConfigError> {
    var(key).ok_or_else(|| {
        warn!("Environment variable {key} not found");
        ConfigError::Missing(key)
    })
}

fn try_load<T: FromStr>(key: &'static str, default: &str) -> Result<T, ConfigError>
where
    T::Err: Display,
{
    var(key)
        .unwrap_or_else(|| {
            info!("{key} not set, using default: {default}");
            default.to_string()
        })
        .parse()
        .map_err(|e: T::Err| ConfigError::Invalid {
            key,
            info: e.to_string(),
        })
}

fn with_trailing_slash(url: String) -> String {
    if url.ends_with('/') {
        url
    } else {
        format!("{url}/")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn media_url_gets_trailing_slash() {
        assert_eq!(with_trailing_slash("/media".to_string()), "/media/");
        assert_eq!(with_trailing_slash("/media/".to_string()), "/media/");
    }

    #[test]
    fn unset_required_key_is_missing() {
        assert!(matches!(
            required("RECIPE_API_TEST_UNSET_REQUIRED"),
            Err(ConfigError::Missing("RECIPE_API_TEST_UNSET_REQUIRED"))
        ));
    }

    #[test]
    fn unset_optional_key_uses_default() {
        let port: u16 = try_load("RECIPE_API_TEST_UNSET_PORT", "8000").unwrap();
        assert_eq!(port, 8000);
    }
}
