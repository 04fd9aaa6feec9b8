//! # Design
//!
//! - Constant error messages; context lives in fields so failures are attributable to a
//!   specific field without parsing message text.
//! - `describe()` renders the human-readable reason carried in helper reports.

use thiserror::Error;

use crate::model::OperationKind;

/// Failures while decoding a transport payload into an operation descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The payload is not a well-formed descriptor.
    #[error("malformed operation descriptor")]
    Malformed {
        /// Field that failed validation, when attributable to one.
        field: Option<&'static str>,
        /// Machine-readable reason for the failure.
        reason: &'static str,
        /// Offending value when available.
        value: Option<String>,
    },
    /// A field required by the declared kind is absent.
    #[error("operation descriptor missing required field")]
    MissingField {
        /// Declared kind of the descriptor.
        kind: OperationKind,
        /// Absent field.
        field: &'static str,
    },
}

impl DecodeError {
    pub(crate) fn malformed(
        field: Option<&'static str>,
        reason: &'static str,
        value: Option<String>,
    ) -> Self {
        Self::Malformed {
            field,
            reason,
            value,
        }
    }

    /// Human-readable reason suitable for the diagnostic stream.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::Malformed {
                field,
                reason,
                value,
            } => {
                let mut message = format!("malformed descriptor: {reason}");
                if let Some(field) = field {
                    message.push_str(&format!(" (field `{field}`)"));
                }
                if let Some(value) = value {
                    message.push_str(&format!(": {value}"));
                }
                message
            }
            Self::MissingField { kind, field } => {
                format!("descriptor of kind `{kind}` is missing required field `{field}`")
            }
        }
    }
}

/// Failures while encoding descriptors or reports.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// JSON serialisation failed.
    #[error("failed to encode json payload")]
    Json {
        /// Underlying serde error.
        source: serde_json::Error,
    },
}

impl From<serde_json::Error> for EncodeError {
    fn from(source: serde_json::Error) -> Self {
        Self::Json { source }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn describe_names_field_and_value() {
        let error = DecodeError::malformed(
            Some("source_path"),
            "relative_path",
            Some("notes.txt".to_string()),
        );
        assert_eq!(
            error.describe(),
            "malformed descriptor: relative_path (field `source_path`): notes.txt"
        );

        let missing = DecodeError::MissingField {
            kind: OperationKind::Move,
            field: "destination_path",
        };
        assert_eq!(
            missing.describe(),
            "descriptor of kind `move` is missing required field `destination_path`"
        );
    }
}
