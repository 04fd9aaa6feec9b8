//! Where the helper reads its descriptor and streamed payloads from.

use std::fs;
use std::io::{self, Read};
use std::path::{Path, PathBuf};

use crate::error::{HelperError, HelperResult};

/// Input channels of one helper invocation.
pub trait DescriptorSource {
    /// Read the encoded descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`HelperError::Transport`] when the transport location cannot be read.
    fn read_descriptor(&self) -> HelperResult<Vec<u8>>;

    /// Read a streamed payload to completion.
    ///
    /// # Errors
    ///
    /// Returns the IO error raised by the stream.
    fn read_stdin(&self) -> io::Result<Vec<u8>>;

    /// Label of the descriptor location used in diagnostics.
    fn location(&self) -> &Path;
}

/// Transport file written by the front end, plus the process standard input.
#[derive(Debug, Clone)]
pub struct TransportFile {
    path: PathBuf,
}

impl TransportFile {
    /// Read the descriptor from `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl DescriptorSource for TransportFile {
    fn read_descriptor(&self) -> HelperResult<Vec<u8>> {
        fs::read(&self.path).map_err(|source| HelperError::Transport {
            operation: "read_transport",
            path: self.path.clone(),
            source,
        })
    }

    fn read_stdin(&self) -> io::Result<Vec<u8>> {
        let mut buffer = Vec::new();
        io::stdin().lock().read_to_end(&mut buffer)?;
        Ok(buffer)
    }

    fn location(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_transport_is_a_transport_error() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let source = TransportFile::new(temp.path().join("absent.json"));
        let err = source.read_descriptor().err();
        assert!(matches!(
            err,
            Some(HelperError::Transport {
                operation: "read_transport",
                ..
            })
        ));
        assert_eq!(
            err.map(|err| err.exit()),
            Some(fsgate_ops::HelperExit::DecodeFailed)
        );
        Ok(())
    }

    #[test]
    fn transport_bytes_are_returned_verbatim() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("op.json");
        fs::write(&path, br#"{"kind":"list_directory","source_path":"/"}"#)?;
        let source = TransportFile::new(&path);
        assert_eq!(source.location(), path.as_path());
        assert_eq!(
            source.read_descriptor()?,
            br#"{"kind":"list_directory","source_path":"/"}"#.to_vec()
        );
        Ok(())
    }
}
