//! Execution outcomes reported by the helper.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Per-item failures keyed by item identifier (path, entry name, or rendition name).
pub type ItemFailures = BTreeMap<String, String>;

/// Outcome of executing one operation descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ExecutionResult {
    /// Every item succeeded.
    Success {
        /// Ordered children for `list_directory`; absent for mutating operations.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        listing: Option<Vec<PathBuf>>,
    },
    /// Some items of a bulk operation failed; the rest were attempted.
    PartialFailure {
        /// Every failed item with its reason.
        failures: ItemFailures,
    },
    /// The invocation failed as a whole.
    FatalFailure {
        /// Human-readable reason.
        reason: String,
    },
}

impl ExecutionResult {
    /// Success without output.
    #[must_use]
    pub const fn success() -> Self {
        Self::Success { listing: None }
    }

    /// Success carrying a directory listing.
    #[must_use]
    pub const fn listing(entries: Vec<PathBuf>) -> Self {
        Self::Success {
            listing: Some(entries),
        }
    }

    /// Fatal failure with a reason.
    #[must_use]
    pub fn fatal(reason: impl Into<String>) -> Self {
        Self::FatalFailure {
            reason: reason.into(),
        }
    }

    /// Collapse collected item failures: none means success.
    #[must_use]
    pub fn from_failures(failures: ItemFailures) -> Self {
        if failures.is_empty() {
            Self::success()
        } else {
            Self::PartialFailure { failures }
        }
    }

    /// Whether the operation fully succeeded.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Directory entries returned by a successful listing.
    #[must_use]
    pub fn entries(&self) -> Option<&[PathBuf]> {
        match self {
            Self::Success {
                listing: Some(entries),
            } => Some(entries.as_slice()),
            _ => None,
        }
    }

    /// Single message summarising the failure for an end user, or `None` on success.
    ///
    /// Partial failures list every failed item on its own line.
    #[must_use]
    pub fn summary(&self) -> Option<String> {
        match self {
            Self::Success { .. } => None,
            Self::FatalFailure { reason } => Some(reason.clone()),
            Self::PartialFailure { failures } => {
                let mut message = String::new();
                for (item, reason) in failures {
                    if !message.is_empty() {
                        message.push('\n');
                    }
                    let _ = write!(message, "{item}: {reason}");
                }
                Some(message)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_failures_collapses_empty_map_to_success() {
        assert_eq!(
            ExecutionResult::from_failures(ItemFailures::new()),
            ExecutionResult::success()
        );

        let mut failures = ItemFailures::new();
        failures.insert("missing.txt".to_string(), "not found".to_string());
        let result = ExecutionResult::from_failures(failures.clone());
        assert_eq!(result, ExecutionResult::PartialFailure { failures });
        assert!(!result.is_success());
    }

    #[test]
    fn summary_lists_every_failed_item() {
        let mut failures = ItemFailures::new();
        failures.insert("b.txt".to_string(), "permission denied".to_string());
        failures.insert("a.txt".to_string(), "not found".to_string());
        let summary = ExecutionResult::PartialFailure { failures }.summary();
        assert_eq!(
            summary.as_deref(),
            Some("a.txt: not found\nb.txt: permission denied")
        );

        assert_eq!(
            ExecutionResult::fatal("unable to acquire root").summary(),
            Some("unable to acquire root".to_string())
        );
        assert_eq!(ExecutionResult::success().summary(), None);
    }

    #[test]
    fn listing_is_only_serialised_when_present() -> anyhow::Result<()> {
        let plain = serde_json::to_value(ExecutionResult::success())?;
        assert_eq!(plain, serde_json::json!({"status": "success"}));

        let listing = ExecutionResult::listing(vec![PathBuf::from("/tmp/a")]);
        assert_eq!(listing.entries(), Some([PathBuf::from("/tmp/a")].as_slice()));
        let value = serde_json::to_value(&listing)?;
        assert_eq!(value["listing"][0], "/tmp/a");
        Ok(())
    }
}
