//! Per-invocation transport files.
//!
//! Each invocation gets `<dir>/<uuid>.json`, created exclusively with owner-only permissions
//! and fully written before the helper launches. The file is removed when its
//! [`TransportFile`] guard drops.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use fsgate_ops::{OperationDescriptor, encode};
use tokio::fs::{DirBuilder, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DispatchError, DispatchResult};

const DIR_MODE: u32 = 0o700;
const FILE_MODE: u32 = 0o600;

/// Writes encoded descriptors into the transport directory.
#[derive(Debug, Clone)]
pub struct TransportWriter {
    dir: PathBuf,
}

impl TransportWriter {
    /// Writer targeting `dir`, created on first use.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory receiving transport files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Encode `descriptor` into a fresh transport file.
    ///
    /// # Errors
    ///
    /// Returns [`DispatchError::Encode`] or [`DispatchError::Transport`].
    pub async fn write(
        &self,
        invocation: Uuid,
        descriptor: &OperationDescriptor,
    ) -> DispatchResult<TransportFile> {
        let bytes = encode(descriptor).map_err(|source| DispatchError::Encode { source })?;

        DirBuilder::new()
            .recursive(true)
            .mode(DIR_MODE)
            .create(&self.dir)
            .await
            .map_err(|err| DispatchError::transport("transport.create_dir", &self.dir, err))?;

        let path = self.dir.join(format!("{invocation}.json"));
        let mut file = OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(FILE_MODE)
            .open(&path)
            .await
            .map_err(|err| DispatchError::transport("transport.create", &path, err))?;
        let guard = TransportFile { path };

        file.write_all(&bytes)
            .await
            .map_err(|err| DispatchError::transport("transport.write", &guard.path, err))?;
        file.sync_all()
            .await
            .map_err(|err| DispatchError::transport("transport.sync", &guard.path, err))?;
        debug!(transport = %guard.path.display(), bytes = bytes.len(), "transport written");
        Ok(guard)
    }
}

/// A written transport file, removed on drop.
#[derive(Debug)]
pub struct TransportFile {
    path: PathBuf,
}

impl TransportFile {
    /// Location handed to the helper.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TransportFile {
    fn drop(&mut self) {
        match fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == io::ErrorKind::NotFound => {}
            Err(err) => {
                warn!(transport = %self.path.display(), error = %err, "failed to remove transport");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::os::unix::fs::PermissionsExt;

    use fsgate_ops::decode;

    use super::*;

    #[tokio::test]
    async fn transport_is_private_decodable_and_removed_on_drop() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let writer = TransportWriter::new(temp.path().join("transport"));
        let descriptor = OperationDescriptor::ListDirectory {
            source_path: PathBuf::from("/var/log"),
        };
        let invocation = Uuid::new_v4();

        let transport = writer.write(invocation, &descriptor).await?;
        let path = transport.path().to_path_buf();
        assert_eq!(path, writer.dir().join(format!("{invocation}.json")));
        assert_eq!(fs::metadata(&path)?.permissions().mode() & 0o777, FILE_MODE);
        assert_eq!(decode(&fs::read(&path)?)?, descriptor);

        drop(transport);
        assert!(!path.exists());
        Ok(())
    }

    #[tokio::test]
    async fn reused_invocation_id_is_rejected() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let writer = TransportWriter::new(temp.path());
        let descriptor = OperationDescriptor::ListDirectory {
            source_path: PathBuf::from("/"),
        };
        let invocation = Uuid::new_v4();

        let _first = writer.write(invocation, &descriptor).await?;
        let second = writer.write(invocation, &descriptor).await;
        assert!(matches!(
            second,
            Err(DispatchError::Transport {
                operation: "transport.create",
                ..
            })
        ));
        Ok(())
    }
}
