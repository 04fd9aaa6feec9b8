//! Exit-status convention and the report line emitted on the helper's diagnostic stream.
//!
//! # Design
//! - Every exit code has one meaning shared by both sides of the boundary.
//! - Any item failure makes the exit status non-zero.
//! - The structured outcome travels as one prefixed JSON line; everything else on the
//!   stream is free-form diagnostics.

use crate::error::EncodeError;
use crate::result::ExecutionResult;

/// Prefix marking the structured report line on the helper's stderr.
pub const REPORT_PREFIX: &str = "fsgate-report: ";

/// Helper process exit statuses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HelperExit {
    /// Operation fully succeeded.
    Success,
    /// At least one item of a bulk operation failed.
    PartialFailure,
    /// A single-target operation or a capability failed.
    OperationFailed,
    /// The transport payload was unreadable or failed to decode.
    DecodeFailed,
    /// Elevated identity could not be confirmed.
    PrivilegeAcquisitionFailed,
    /// The launching process is not the trusted front end.
    UnauthorizedCaller,
    /// The helper command line was unusable.
    InvalidInvocation,
}

impl HelperExit {
    /// Numeric process exit code.
    #[must_use]
    pub const fn code(self) -> u8 {
        match self {
            Self::Success => 0,
            Self::PartialFailure => 1,
            Self::OperationFailed => 2,
            Self::DecodeFailed => 3,
            Self::PrivilegeAcquisitionFailed => 4,
            Self::UnauthorizedCaller => 5,
            Self::InvalidInvocation => 6,
        }
    }

    /// Map a process exit code back to its meaning.
    #[must_use]
    pub const fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Self::Success),
            1 => Some(Self::PartialFailure),
            2 => Some(Self::OperationFailed),
            3 => Some(Self::DecodeFailed),
            4 => Some(Self::PrivilegeAcquisitionFailed),
            5 => Some(Self::UnauthorizedCaller),
            6 => Some(Self::InvalidInvocation),
            _ => None,
        }
    }

    /// Stable label used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::PartialFailure => "partial_failure",
            Self::OperationFailed => "operation_failed",
            Self::DecodeFailed => "decode_failed",
            Self::PrivilegeAcquisitionFailed => "privilege_acquisition_failed",
            Self::UnauthorizedCaller => "unauthorized_caller",
            Self::InvalidInvocation => "invalid_invocation",
        }
    }

    /// Exit status implied by an execution result.
    #[must_use]
    pub const fn for_result(result: &ExecutionResult) -> Self {
        match result {
            ExecutionResult::Success { .. } => Self::Success,
            ExecutionResult::PartialFailure { .. } => Self::PartialFailure,
            ExecutionResult::FatalFailure { .. } => Self::OperationFailed,
        }
    }
}

/// Render the single prefixed report line for `result`.
///
/// # Errors
///
/// Returns an error if the result cannot be serialised.
pub fn render_report(result: &ExecutionResult) -> Result<String, EncodeError> {
    let body = serde_json::to_string(result)?;
    Ok(format!("{REPORT_PREFIX}{body}"))
}

/// Extract the last well-formed report from a diagnostic stream.
#[must_use]
pub fn parse_report(diagnostics: &str) -> Option<ExecutionResult> {
    diagnostics
        .lines()
        .rev()
        .filter_map(|line| line.trim_end().strip_prefix(REPORT_PREFIX))
        .find_map(|body| serde_json::from_str(body).ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::ItemFailures;

    #[test]
    fn exit_codes_map_back_to_meanings() {
        for exit in [
            HelperExit::Success,
            HelperExit::PartialFailure,
            HelperExit::OperationFailed,
            HelperExit::DecodeFailed,
            HelperExit::PrivilegeAcquisitionFailed,
            HelperExit::UnauthorizedCaller,
            HelperExit::InvalidInvocation,
        ] {
            assert_eq!(HelperExit::from_code(i32::from(exit.code())), Some(exit));
        }
        assert_eq!(HelperExit::from_code(-1), None);
    }

    #[test]
    fn partial_failure_exits_non_zero() {
        let mut failures = ItemFailures::new();
        failures.insert("/tmp/a".to_string(), "not found".to_string());
        let exit = HelperExit::for_result(&ExecutionResult::PartialFailure { failures });
        assert_eq!(exit, HelperExit::PartialFailure);
        assert_ne!(exit.code(), 0);
    }

    #[test]
    fn parse_report_skips_log_noise_and_takes_last_report() -> anyhow::Result<()> {
        let first = render_report(&ExecutionResult::fatal("stale"))?;
        let last = render_report(&ExecutionResult::success())?;
        let stream = format!(
            "WARN something happened\n{first}\nerror: noise\n{REPORT_PREFIX}{{not json\n{last}\n"
        );
        assert_eq!(parse_report(&stream), Some(ExecutionResult::success()));
        assert_eq!(parse_report("error: helper crashed"), None);
        Ok(())
    }
}
