//! Dispatch Front End: one async entry point per operation kind.
//!
//! # Design
//! - Every call is one fresh helper invocation with its own transport file.
//! - Helper-side failures come back as [`ExecutionResult`]; [`DispatchError`] is reserved
//!   for failures to reach the helper at all.
//! - The transport file is removed once the helper exits, whatever the outcome.

use std::path::{Path, PathBuf};

use fsgate_config::DispatchConfig;
use fsgate_ops::{
    ArchiveFormat, BytePayload, ExecutionResult, HelperExit, OperationDescriptor, parse_report,
};
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{DispatchError, DispatchResult};
use crate::launcher::{HelperLauncher, HelperOutput, ProcessLauncher};
use crate::transport::TransportWriter;

/// Hands descriptors to the privileged helper.
#[derive(Debug, Clone)]
pub struct Dispatcher<L = ProcessLauncher> {
    helper_path: PathBuf,
    transport: TransportWriter,
    launcher: L,
}

impl Dispatcher {
    /// Dispatcher spawning the configured helper.
    #[must_use]
    pub fn from_config(config: &DispatchConfig) -> Self {
        Self::with_launcher(&config.helper_path, &config.transport_dir, ProcessLauncher)
    }
}

impl<L: HelperLauncher> Dispatcher<L> {
    /// Dispatcher with a custom launcher.
    pub fn with_launcher(
        helper_path: impl Into<PathBuf>,
        transport_dir: impl Into<PathBuf>,
        launcher: L,
    ) -> Self {
        Self {
            helper_path: helper_path.into(),
            transport: TransportWriter::new(transport_dir),
            launcher,
        }
    }

    /// Run one descriptor through the helper, piping `stdin` when given.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::HelperUnavailable`] before writing anything when the helper is
    /// missing, and transport or launch errors when the helper cannot be run.
    pub async fn dispatch(
        &self,
        descriptor: OperationDescriptor,
        stdin: Option<Vec<u8>>,
    ) -> DispatchResult<ExecutionResult> {
        if !tokio::fs::metadata(&self.helper_path)
            .await
            .is_ok_and(|metadata| metadata.is_file())
        {
            return Err(DispatchError::HelperUnavailable {
                path: self.helper_path.clone(),
            });
        }

        let invocation = Uuid::new_v4();
        let kind = descriptor.kind();
        info!(%invocation, %kind, "dispatching operation");

        let transport = self.transport.write(invocation, &descriptor).await?;
        let launched = self
            .launcher
            .launch(&self.helper_path, transport.path(), stdin)
            .await;
        drop(transport);

        let output = launched?;
        let result = interpret(&output);
        info!(
            %invocation,
            %kind,
            exit_code = ?output.status,
            success = result.is_success(),
            "helper finished"
        );
        Ok(result)
    }

    /// Remove every path.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::dispatch`].
    pub async fn delete(&self, paths: Vec<PathBuf>) -> DispatchResult<ExecutionResult> {
        self.dispatch(
            OperationDescriptor::Delete {
                source_paths: paths,
            },
            None,
        )
        .await
    }

    /// Move every path into `destination`.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::dispatch`].
    pub async fn move_items(
        &self,
        paths: Vec<PathBuf>,
        destination: impl Into<PathBuf> + Send,
    ) -> DispatchResult<ExecutionResult> {
        self.dispatch(
            OperationDescriptor::Move {
                source_paths: paths,
                destination_path: destination.into(),
            },
            None,
        )
        .await
    }

    /// Copy every path into `destination`.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::dispatch`].
    pub async fn copy_items(
        &self,
        paths: Vec<PathBuf>,
        destination: impl Into<PathBuf> + Send,
    ) -> DispatchResult<ExecutionResult> {
        self.dispatch(
            OperationDescriptor::Copy {
                source_paths: paths,
                destination_path: destination.into(),
            },
            None,
        )
        .await
    }

    /// Symlink every path into `destination`.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::dispatch`].
    pub async fn link_items(
        &self,
        paths: Vec<PathBuf>,
        destination: impl Into<PathBuf> + Send,
    ) -> DispatchResult<ExecutionResult> {
        self.dispatch(
            OperationDescriptor::Link {
                source_paths: paths,
                destination_path: destination.into(),
            },
            None,
        )
        .await
    }

    /// Move `source` to the exact path `destination`.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::dispatch`].
    pub async fn rename(
        &self,
        source: impl Into<PathBuf> + Send,
        destination: impl Into<PathBuf> + Send,
    ) -> DispatchResult<ExecutionResult> {
        self.dispatch(
            OperationDescriptor::Rename {
                source_path: source.into(),
                destination_path: destination.into(),
            },
            None,
        )
        .await
    }

    /// Create directories (with intermediates) and empty files.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::dispatch`].
    pub async fn create_paths(
        &self,
        directories: Vec<PathBuf>,
        files: Vec<PathBuf>,
    ) -> DispatchResult<ExecutionResult> {
        self.dispatch(OperationDescriptor::CreatePaths { directories, files }, None)
            .await
    }

    /// Apply an owner and/or group to `path`.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::dispatch`].
    pub async fn set_owner_group(
        &self,
        path: impl Into<PathBuf> + Send,
        owner_name: Option<String>,
        group_name: Option<String>,
    ) -> DispatchResult<ExecutionResult> {
        self.dispatch(
            OperationDescriptor::SetOwnerGroup {
                source_path: path.into(),
                owner_name,
                group_name,
            },
            None,
        )
        .await
    }

    /// Apply POSIX `mode` to `path`.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::dispatch`].
    pub async fn set_permissions(
        &self,
        path: impl Into<PathBuf> + Send,
        mode: u32,
    ) -> DispatchResult<ExecutionResult> {
        self.dispatch(
            OperationDescriptor::SetPermissions {
                source_path: path.into(),
                mode,
            },
            None,
        )
        .await
    }

    /// Replace the contents of `path` with `data`, streamed over the helper's stdin.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::dispatch`].
    pub async fn write_bytes(
        &self,
        path: impl Into<PathBuf> + Send,
        data: Vec<u8>,
    ) -> DispatchResult<ExecutionResult> {
        self.dispatch(
            OperationDescriptor::WriteBytes {
                source_path: path.into(),
                payload: BytePayload::Stdin,
            },
            Some(data),
        )
        .await
    }

    /// Atomically replace the contents of `path` with `text`.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::dispatch`].
    pub async fn write_text(
        &self,
        path: impl Into<PathBuf> + Send,
        text: impl Into<String> + Send,
    ) -> DispatchResult<ExecutionResult> {
        self.dispatch(
            OperationDescriptor::WriteText {
                source_path: path.into(),
                text: text.into(),
            },
            None,
        )
        .await
    }

    /// Archive every path into `destination`.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::dispatch`].
    pub async fn compress(
        &self,
        paths: Vec<PathBuf>,
        destination: impl Into<PathBuf> + Send,
        format: ArchiveFormat,
    ) -> DispatchResult<ExecutionResult> {
        self.dispatch(
            OperationDescriptor::Compress {
                source_paths: paths,
                destination_path: destination.into(),
                format,
            },
            None,
        )
        .await
    }

    /// Expand `archive` into `destination`, detecting the format when `format` is `None`.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::dispatch`].
    pub async fn decompress(
        &self,
        archive: impl Into<PathBuf> + Send,
        destination: impl Into<PathBuf> + Send,
        format: Option<ArchiveFormat>,
    ) -> DispatchResult<ExecutionResult> {
        self.dispatch(
            OperationDescriptor::Decompress {
                source_path: archive.into(),
                destination_path: destination.into(),
                format,
            },
            None,
        )
        .await
    }

    /// Write every rendition of `catalog` into `destination`.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::dispatch`].
    pub async fn extract_catalog(
        &self,
        catalog: impl Into<PathBuf> + Send,
        destination: impl Into<PathBuf> + Send,
    ) -> DispatchResult<ExecutionResult> {
        self.dispatch(
            OperationDescriptor::ExtractCatalog {
                source_path: catalog.into(),
                destination_path: destination.into(),
            },
            None,
        )
        .await
    }

    /// List the immediate children of `directory`; entries are in the result's listing.
    ///
    /// # Errors
    ///
    /// See [`Dispatcher::dispatch`].
    pub async fn list_directory(
        &self,
        directory: impl Into<PathBuf> + Send,
    ) -> DispatchResult<ExecutionResult> {
        self.dispatch(
            OperationDescriptor::ListDirectory {
                source_path: directory.into(),
            },
            None,
        )
        .await
    }

    /// Helper executable this dispatcher launches.
    #[must_use]
    pub fn helper_path(&self) -> &Path {
        &self.helper_path
    }

    /// Launcher used for every invocation.
    #[must_use]
    pub const fn launcher(&self) -> &L {
        &self.launcher
    }
}

/// Turn raw helper output into a result.
///
/// A report is trusted only when its outcome agrees with the exit status; otherwise, and when
/// the helper produced no report, a fatal failure is synthesised.
#[must_use]
pub fn interpret(output: &HelperOutput) -> ExecutionResult {
    let status = describe_status(output.status);

    if let Some(result) = parse_report(&output.diagnostics) {
        if report_agrees(&result, output.status) {
            return result;
        }
        let reported = HelperExit::for_result(&result);
        warn!(status = %status, reported = reported.as_str(), "helper report contradicts exit status");
        return ExecutionResult::fatal(format!(
            "{status}: report claims {} and was discarded",
            reported.as_str()
        ));
    }

    let detail = output
        .diagnostics
        .lines()
        .rev()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(|line| line.strip_prefix("error: ").unwrap_or(line).to_string());
    warn!(status = %status, "helper produced no report");

    ExecutionResult::fatal(match detail {
        Some(detail) => format!("{status}: {detail}"),
        None => status,
    })
}

fn describe_status(status: Option<i32>) -> String {
    match status {
        Some(code) => HelperExit::from_code(code).map_or_else(
            || format!("helper exited with status {code}"),
            |exit| format!("helper exited with status {code} ({})", exit.as_str()),
        ),
        None => "helper terminated by a signal".to_string(),
    }
}

/// Success needs exit 0 and partial failure exit 1; a fatal report pairs with any failure
/// status from 2 upwards.
fn report_agrees(result: &ExecutionResult, status: Option<i32>) -> bool {
    let Some(actual) = status.and_then(HelperExit::from_code) else {
        return false;
    };
    match HelperExit::for_result(result) {
        HelperExit::OperationFailed => actual.code() >= HelperExit::OperationFailed.code(),
        expected => expected == actual,
    }
}

#[cfg(test)]
mod tests {
    use fsgate_ops::render_report;

    use super::*;

    #[test]
    fn report_line_wins_over_noise() -> anyhow::Result<()> {
        let report = render_report(&ExecutionResult::success())?;
        let output = HelperOutput {
            status: Some(0),
            diagnostics: format!("INFO executing operation\n{report}\n"),
        };
        assert_eq!(interpret(&output), ExecutionResult::success());
        Ok(())
    }

    #[test]
    fn report_contradicting_exit_status_is_discarded() -> anyhow::Result<()> {
        let success = render_report(&ExecutionResult::success())?;
        for status in [Some(5), Some(1), None] {
            let output = HelperOutput {
                status,
                diagnostics: format!("{success}\n"),
            };
            let result = interpret(&output);
            assert!(matches!(result, ExecutionResult::FatalFailure { .. }), "{status:?}");
        }

        let aborted = render_report(&ExecutionResult::fatal("unauthorized caller"))?;
        let output = HelperOutput {
            status: Some(i32::from(HelperExit::UnauthorizedCaller.code())),
            diagnostics: format!("error: unauthorized caller\n{aborted}\n"),
        };
        assert_eq!(interpret(&output), ExecutionResult::fatal("unauthorized caller"));

        let mismatched = HelperOutput {
            status: Some(0),
            diagnostics: format!("{aborted}\n"),
        };
        assert_eq!(
            interpret(&mismatched),
            ExecutionResult::fatal(
                "helper exited with status 0 (success): report claims operation_failed and was discarded"
            )
        );
        Ok(())
    }

    #[test]
    fn missing_report_is_synthesised_from_status_and_text() {
        let output = HelperOutput {
            status: Some(5),
            diagnostics: "error: unauthorized caller: parent process 7 is /bin/sh\n".to_string(),
        };
        assert_eq!(
            interpret(&output),
            ExecutionResult::fatal(
                "helper exited with status 5 (unauthorized_caller): unauthorized caller: parent process 7 is /bin/sh"
            )
        );

        let killed = HelperOutput {
            status: None,
            diagnostics: String::new(),
        };
        assert_eq!(
            interpret(&killed),
            ExecutionResult::fatal("helper terminated by a signal")
        );
    }
}
