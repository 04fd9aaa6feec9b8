//! Run-to-completion orchestration of one helper invocation.
//!
//! Stages run strictly in order: caller check, privilege acquisition, transport read, decode,
//! stdin resolution, execution. A failing stage ends the invocation and no later stage runs.

use std::path::PathBuf;

use fsgate_ops::{ExecutionResult, HelperExit, decode, render_report};
use tracing::{error, info};

use crate::archive::ArchiveCodec;
use crate::catalog::CatalogReader;
use crate::error::HelperError;
use crate::executor::Executor;
use crate::privilege::{Elevated, IdentityControl, PrivilegeAcquirer};
use crate::transport::DescriptorSource;
use crate::verify::{Authorized, CallerVerifier, ProcessInspector};

/// Final state of an invocation: the exit status and the reported result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperOutcome {
    /// Process exit status.
    pub exit: HelperExit,
    /// Result reported to the front end.
    pub result: ExecutionResult,
}

impl HelperOutcome {
    /// Outcome of an executed descriptor.
    #[must_use]
    pub const fn completed(result: ExecutionResult) -> Self {
        Self {
            exit: HelperExit::for_result(&result),
            result,
        }
    }

    /// Outcome of an invocation aborted before execution.
    #[must_use]
    pub fn aborted(error: &HelperError) -> Self {
        let exit = error.exit();
        let reason = error.describe();
        error!(exit_code = exit.code(), exit = exit.as_str(), reason = %reason, "invocation aborted");
        Self {
            exit,
            result: ExecutionResult::fatal(reason),
        }
    }

    /// Outcome of an unusable command line or environment.
    #[must_use]
    pub fn invalid_invocation(reason: impl Into<String>) -> Self {
        Self {
            exit: HelperExit::InvalidInvocation,
            result: ExecutionResult::fatal(reason),
        }
    }

    /// Lines for the diagnostic stream: one `error:` line per failure reason, then the report.
    #[must_use]
    pub fn diagnostics(&self) -> Vec<String> {
        let mut lines: Vec<String> = self
            .result
            .summary()
            .map(|summary| summary.lines().map(|line| format!("error: {line}")).collect())
            .unwrap_or_default();
        match render_report(&self.result) {
            Ok(report) => lines.push(report),
            Err(err) => lines.push(format!("error: failed to render report: {err}")),
        }
        lines
    }
}

/// Run every stage of an invocation.
pub fn run<I, C, S, A, R>(
    verifier: &CallerVerifier<I>,
    acquirer: PrivilegeAcquirer<C>,
    source: &S,
    executor: &Executor<A, R>,
) -> HelperOutcome
where
    I: ProcessInspector,
    C: IdentityControl,
    S: DescriptorSource,
    A: ArchiveCodec,
    R: CatalogReader,
{
    match verifier.verify() {
        Ok(caller) => run_authorized(&caller, acquirer, source, executor),
        Err(err) => HelperOutcome::aborted(&err),
    }
}

/// Run the stages that follow a successful caller check.
pub fn run_authorized<C, S, A, R>(
    caller: &Authorized,
    acquirer: PrivilegeAcquirer<C>,
    source: &S,
    executor: &Executor<A, R>,
) -> HelperOutcome
where
    C: IdentityControl,
    S: DescriptorSource,
    A: ArchiveCodec,
    R: CatalogReader,
{
    match acquirer.acquire(caller) {
        Ok(elevated) => execute_invocation(&elevated, source, executor),
        Err(err) => HelperOutcome::aborted(&err),
    }
}

/// Read, decode and execute the descriptor with an elevated identity.
pub fn execute_invocation<S, A, R>(
    elevated: &Elevated,
    source: &S,
    executor: &Executor<A, R>,
) -> HelperOutcome
where
    S: DescriptorSource,
    A: ArchiveCodec,
    R: CatalogReader,
{
    let bytes = match source.read_descriptor() {
        Ok(bytes) => bytes,
        Err(err) => return HelperOutcome::aborted(&err),
    };
    let descriptor = match decode(&bytes) {
        Ok(descriptor) => descriptor,
        Err(source) => return HelperOutcome::aborted(&HelperError::Decode { source }),
    };
    info!(
        kind = %descriptor.kind(),
        transport = %source.location().display(),
        "descriptor decoded"
    );
    let descriptor = match descriptor.resolve_stdin(|| source.read_stdin()) {
        Ok(descriptor) => descriptor,
        Err(err) => {
            return HelperOutcome::aborted(&HelperError::Transport {
                operation: "read_stdin",
                path: PathBuf::from("<stdin>"),
                source: err,
            });
        }
    };
    HelperOutcome::completed(executor.execute(elevated, descriptor))
}

#[cfg(test)]
mod tests {
    use fsgate_ops::{ItemFailures, REPORT_PREFIX, parse_report};

    use super::*;

    #[test]
    fn diagnostics_end_with_a_parseable_report() {
        let mut failures = ItemFailures::new();
        failures.insert("a.txt".to_string(), "not found".to_string());
        failures.insert("b.txt".to_string(), "permission denied".to_string());
        let outcome = HelperOutcome::completed(ExecutionResult::PartialFailure {
            failures: failures.clone(),
        });
        assert_eq!(outcome.exit, HelperExit::PartialFailure);

        let lines = outcome.diagnostics();
        assert_eq!(lines[0], "error: a.txt: not found");
        assert_eq!(lines[1], "error: b.txt: permission denied");
        assert!(lines[2].starts_with(REPORT_PREFIX));
        assert_eq!(
            parse_report(&lines.join("\n")),
            Some(ExecutionResult::PartialFailure { failures })
        );
    }

    #[test]
    fn success_emits_only_the_report() {
        let lines = HelperOutcome::completed(ExecutionResult::success()).diagnostics();
        assert_eq!(lines.len(), 1);
        assert!(lines[0].starts_with(REPORT_PREFIX));
    }

    #[test]
    fn invalid_invocation_uses_its_own_exit_code() {
        let outcome = HelperOutcome::invalid_invocation("missing --transport");
        assert_eq!(outcome.exit.code(), 6);
        assert_eq!(outcome.diagnostics()[0], "error: missing --transport");
    }
}
