//! Error types for configuration loading.

use thiserror::Error;

/// Primary error type for configuration operations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// A variable contained an invalid value.
    #[error("invalid configuration field")]
    InvalidField {
        /// Variable that failed validation.
        field: &'static str,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
}

impl ConfigError {
    /// Human-readable rendering naming the variable and the reason.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::InvalidField {
                field,
                reason,
                value: Some(value),
            } => format!("{field}: {reason} ({value})"),
            Self::InvalidField {
                field,
                reason,
                value: None,
            } => format!("{field}: {reason}"),
        }
    }
}

/// Convenience alias for configuration results.
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_names_variable_and_value() {
        let err = ConfigError::InvalidField {
            field: "FSGATE_LOG_FORMAT",
            reason: "unknown_format",
            value: Some("xml".to_string()),
        };
        assert_eq!(err.describe(), "FSGATE_LOG_FORMAT: unknown_format (xml)");
        assert_eq!(err.to_string(), "invalid configuration field");
    }
}
