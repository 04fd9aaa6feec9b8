//! Lookup-driven configuration loading.
//!
//! `from_env()` reads the process environment; `from_lookup()` accepts any lookup so tests
//! never mutate global state.

use std::env;
use std::path::PathBuf;

use fsgate_telemetry::LogFormat;
use tracing::debug;

use crate::defaults::{
    DISPATCH_LOG_LEVEL, ENV_HELPER_PATH, ENV_LOG_FORMAT, ENV_LOG_LEVEL, ENV_TRANSPORT_DIR,
    HELPER_LOG_LEVEL, HELPER_PATH, TRANSPORT_SUBDIR,
};
use crate::error::{ConfigError, ConfigResult};
use crate::model::{DispatchConfig, HelperConfig};

impl HelperConfig {
    /// Load the helper configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when a variable holds an unusable value.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load the helper configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when a variable holds an unusable value.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        Ok(Self {
            log_level: parse_level(lookup(ENV_LOG_LEVEL), HELPER_LOG_LEVEL)?,
            log_format: parse_format(lookup(ENV_LOG_FORMAT))?,
        })
    }
}

impl DispatchConfig {
    /// Load the front-end configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when a variable holds an unusable value.
    pub fn from_env() -> ConfigResult<Self> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    /// Load the front-end configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::InvalidField`] when a variable holds an unusable value.
    pub fn from_lookup<F>(lookup: F) -> ConfigResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let helper_path = parse_absolute(
            ENV_HELPER_PATH,
            lookup(ENV_HELPER_PATH),
            PathBuf::from(HELPER_PATH),
        )?;
        let transport_dir = parse_absolute(
            ENV_TRANSPORT_DIR,
            lookup(ENV_TRANSPORT_DIR),
            env::temp_dir().join(TRANSPORT_SUBDIR),
        )?;
        let config = Self {
            helper_path,
            transport_dir,
            log_level: parse_level(lookup(ENV_LOG_LEVEL), DISPATCH_LOG_LEVEL)?,
            log_format: parse_format(lookup(ENV_LOG_FORMAT))?,
        };
        debug!(
            helper = %config.helper_path.display(),
            transport_dir = %config.transport_dir.display(),
            "loaded dispatch configuration"
        );
        Ok(config)
    }
}

fn parse_level(value: Option<String>, fallback: &str) -> ConfigResult<String> {
    match value {
        None => Ok(fallback.to_string()),
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Err(ConfigError::InvalidField {
                    field: ENV_LOG_LEVEL,
                    reason: "empty",
                    value: Some(raw),
                });
            }
            Ok(trimmed.to_string())
        }
    }
}

fn parse_format(value: Option<String>) -> ConfigResult<LogFormat> {
    value.map_or_else(
        || Ok(LogFormat::infer()),
        |raw| {
            raw.parse::<LogFormat>()
                .map_err(|_| ConfigError::InvalidField {
                    field: ENV_LOG_FORMAT,
                    reason: "unknown_format",
                    value: Some(raw),
                })
        },
    )
}

fn parse_absolute(
    field: &'static str,
    value: Option<String>,
    fallback: PathBuf,
) -> ConfigResult<PathBuf> {
    let Some(raw) = value else {
        return Ok(fallback);
    };
    let path = PathBuf::from(raw.trim());
    if !path.is_absolute() {
        return Err(ConfigError::InvalidField {
            field,
            reason: "relative_path",
            value: Some(raw),
        });
    }
    Ok(path)
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), (*value).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn helper_config_defaults_to_quiet_logging() -> anyhow::Result<()> {
        let config = HelperConfig::from_lookup(lookup_from(&[]))?;
        assert_eq!(config.log_level, HELPER_LOG_LEVEL);
        assert_eq!(config.log_format, LogFormat::infer());
        Ok(())
    }

    #[test]
    fn helper_config_reads_overrides() -> anyhow::Result<()> {
        let config = HelperConfig::from_lookup(lookup_from(&[
            (ENV_LOG_LEVEL, "debug"),
            (ENV_LOG_FORMAT, "json"),
        ]))?;
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.logging().level, "debug");
        Ok(())
    }

    #[test]
    fn invalid_values_name_the_variable() {
        assert_eq!(
            HelperConfig::from_lookup(lookup_from(&[(ENV_LOG_FORMAT, "xml")])),
            Err(ConfigError::InvalidField {
                field: ENV_LOG_FORMAT,
                reason: "unknown_format",
                value: Some("xml".to_string()),
            })
        );
        assert!(matches!(
            HelperConfig::from_lookup(lookup_from(&[(ENV_LOG_LEVEL, "  ")])),
            Err(ConfigError::InvalidField {
                field: ENV_LOG_LEVEL,
                reason: "empty",
                ..
            })
        ));
    }

    #[test]
    fn dispatch_config_requires_absolute_paths() -> anyhow::Result<()> {
        let config = DispatchConfig::from_lookup(lookup_from(&[]))?;
        assert_eq!(config.helper_path, PathBuf::from(HELPER_PATH));
        assert!(config.transport_dir.ends_with(TRANSPORT_SUBDIR));

        let custom = DispatchConfig::from_lookup(lookup_from(&[
            (ENV_HELPER_PATH, "/opt/fsgate/helper"),
            (ENV_TRANSPORT_DIR, "/run/fsgate"),
        ]))?;
        assert_eq!(custom.helper_path, PathBuf::from("/opt/fsgate/helper"));
        assert_eq!(custom.transport_dir, PathBuf::from("/run/fsgate"));

        assert!(matches!(
            DispatchConfig::from_lookup(lookup_from(&[(ENV_HELPER_PATH, "bin/helper")])),
            Err(ConfigError::InvalidField {
                field: ENV_HELPER_PATH,
                reason: "relative_path",
                ..
            })
        ));
        Ok(())
    }
}
