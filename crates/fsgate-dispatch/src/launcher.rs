//! Launching the helper process.

use std::path::Path;
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::debug;

use crate::error::{DispatchError, DispatchResult};

/// Raw result of one helper process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HelperOutput {
    /// Exit code, `None` when the process was terminated by a signal.
    pub status: Option<i32>,
    /// Everything the helper wrote to its diagnostic stream.
    pub diagnostics: String,
}

/// Starts the helper and waits for it to finish.
#[async_trait]
pub trait HelperLauncher: Send + Sync {
    /// Run `helper --transport <transport>`, piping `stdin` when present.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Launch`] when the process cannot be started or awaited.
    async fn launch(
        &self,
        helper: &Path,
        transport: &Path,
        stdin: Option<Vec<u8>>,
    ) -> DispatchResult<HelperOutput>;
}

/// [`HelperLauncher`] spawning a real child process.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProcessLauncher;

#[async_trait]
impl HelperLauncher for ProcessLauncher {
    async fn launch(
        &self,
        helper: &Path,
        transport: &Path,
        stdin: Option<Vec<u8>>,
    ) -> DispatchResult<HelperOutput> {
        let mut command = Command::new(helper);
        command
            .arg("--transport")
            .arg(transport)
            .stdin(if stdin.is_some() {
                Stdio::piped()
            } else {
                Stdio::null()
            })
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = command
            .spawn()
            .map_err(|err| DispatchError::launch("helper.spawn", helper, err))?;

        let writer = match (stdin, child.stdin.take()) {
            (Some(bytes), Some(mut pipe)) => Some(tokio::spawn(async move {
                if let Err(err) = pipe.write_all(&bytes).await {
                    debug!(error = %err, "helper closed stdin early");
                }
            })),
            _ => None,
        };

        let output = child
            .wait_with_output()
            .await
            .map_err(|err| DispatchError::launch("helper.wait", helper, err))?;
        if let Some(writer) = writer {
            let _ = writer.await;
        }

        Ok(HelperOutput {
            status: output.status.code(),
            diagnostics: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
