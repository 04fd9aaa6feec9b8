//! Failures raised while installing logging.

use thiserror::Error;

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Errors raised by telemetry helpers.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// A global subscriber was already installed, or installation failed.
    #[error("failed to install tracing subscriber")]
    SubscriberInstall {
        /// Underlying tracing subscriber error.
        #[source]
        source: tracing_subscriber::util::TryInitError,
    },
    /// A log format name was not recognised.
    #[error("unknown log format")]
    UnknownFormat {
        /// Format name supplied by the caller.
        value: String,
    },
}

#[cfg(test)]
mod tests {
    use std::error::Error as _;

    use super::*;

    #[test]
    fn unknown_format_keeps_value_out_of_message() {
        let err = TelemetryError::UnknownFormat {
            value: "xml".to_string(),
        };
        assert_eq!(err.to_string(), "unknown log format");
        assert!(err.source().is_none());
        assert!(matches!(err, TelemetryError::UnknownFormat { ref value } if value == "xml"));
    }
}
