//! Typed configuration for both sides of the privilege boundary.

use std::path::PathBuf;

use fsgate_telemetry::{LogFormat, LoggingConfig};

use crate::defaults::BUILD_SHA;

/// Settings read by the privileged helper after the caller check passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperConfig {
    /// Tracing level or `EnvFilter` directive.
    pub log_level: String,
    /// Output format for diagnostics.
    pub log_format: LogFormat,
}

/// Settings for the restricted-privilege dispatch front end.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispatchConfig {
    /// Absolute path of the helper executable.
    pub helper_path: PathBuf,
    /// Absolute directory receiving per-invocation transport files.
    pub transport_dir: PathBuf,
    /// Tracing level or `EnvFilter` directive.
    pub log_level: String,
    /// Output format for diagnostics.
    pub log_format: LogFormat,
}

impl HelperConfig {
    /// Logging settings derived from this configuration.
    #[must_use]
    pub fn logging(&self) -> LoggingConfig<'_> {
        LoggingConfig {
            component: "fsgate-helper",
            level: &self.log_level,
            format: self.log_format,
            build_sha: BUILD_SHA,
        }
    }
}

impl DispatchConfig {
    /// Logging settings derived from this configuration.
    #[must_use]
    pub fn logging(&self) -> LoggingConfig<'_> {
        LoggingConfig {
            component: "fsgate-frontend",
            level: &self.log_level,
            format: self.log_format,
            build_sha: BUILD_SHA,
        }
    }
}
