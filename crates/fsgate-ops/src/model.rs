//! Descriptor types for the single filesystem operation handed to the helper.
//!
//! # Design
//! - One closed variant per operation kind; kind-specific attributes are typed fields of
//!   their variant so every kind has an exhaustively matched field set.
//! - Bulk kinds carry `source_paths`; single-target kinds carry exactly one `source_path`.
//! - Descriptors are plain data and never hold IO handles.

use std::fmt::{self, Display, Formatter};
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Payload-free discriminator for [`OperationDescriptor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    /// Remove one or more paths.
    Delete,
    /// Move paths into a destination directory.
    Move,
    /// Copy paths into a destination directory.
    Copy,
    /// Symlink paths into a destination directory.
    Link,
    /// Move a single path to an exact destination path.
    Rename,
    /// Create directories and empty files.
    CreatePaths,
    /// Change owner and/or group of a path.
    SetOwnerGroup,
    /// Change the POSIX mode of a path.
    SetPermissions,
    /// Replace a file with raw bytes.
    WriteBytes,
    /// Atomically replace a file with UTF-8 text.
    WriteText,
    /// Build an archive from paths.
    Compress,
    /// Expand an archive into a directory.
    Decompress,
    /// Extract renditions from an asset catalog.
    ExtractCatalog,
    /// List the immediate children of a directory.
    ListDirectory,
}

impl OperationKind {
    /// Every supported kind, in wire-documentation order.
    pub const ALL: [Self; 14] = [
        Self::Delete,
        Self::Move,
        Self::Copy,
        Self::Link,
        Self::Rename,
        Self::CreatePaths,
        Self::SetOwnerGroup,
        Self::SetPermissions,
        Self::WriteBytes,
        Self::WriteText,
        Self::Compress,
        Self::Decompress,
        Self::ExtractCatalog,
        Self::ListDirectory,
    ];

    /// Wire tag for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Delete => "delete",
            Self::Move => "move",
            Self::Copy => "copy",
            Self::Link => "link",
            Self::Rename => "rename",
            Self::CreatePaths => "create_paths",
            Self::SetOwnerGroup => "set_owner_group",
            Self::SetPermissions => "set_permissions",
            Self::WriteBytes => "write_bytes",
            Self::WriteText => "write_text",
            Self::Compress => "compress",
            Self::Decompress => "decompress",
            Self::ExtractCatalog => "extract_catalog",
            Self::ListDirectory => "list_directory",
        }
    }

    /// Resolve a wire tag back to its kind.
    #[must_use]
    pub fn from_tag(tag: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.as_str() == tag)
    }

    /// Fields that must be present (and non-null) on the wire for this kind.
    #[must_use]
    pub const fn required_fields(self) -> &'static [&'static str] {
        match self {
            Self::Delete => &["source_paths"],
            Self::Move | Self::Copy | Self::Link => &["source_paths", "destination_path"],
            Self::Rename | Self::Decompress | Self::ExtractCatalog => {
                &["source_path", "destination_path"]
            }
            Self::CreatePaths => &[],
            Self::SetOwnerGroup | Self::ListDirectory => &["source_path"],
            Self::SetPermissions => &["source_path", "mode"],
            Self::WriteBytes => &["source_path", "payload"],
            Self::WriteText => &["source_path", "text"],
            Self::Compress => &["source_paths", "destination_path", "format"],
        }
    }

    /// Whether a failure on one item leaves sibling items to be attempted.
    #[must_use]
    pub const fn is_bulk(self) -> bool {
        matches!(
            self,
            Self::Delete
                | Self::Move
                | Self::Copy
                | Self::Link
                | Self::CreatePaths
                | Self::ExtractCatalog
        )
    }
}

impl Display for OperationKind {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Archive container formats understood by the archive capability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArchiveFormat {
    /// Deflate-compressed zip archive.
    Zip,
    /// Uncompressed tarball.
    Tar,
    /// Gzip-compressed tarball.
    TarGz,
}

impl ArchiveFormat {
    /// Wire tag for the format.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Zip => "zip",
            Self::Tar => "tar",
            Self::TarGz => "tar_gz",
        }
    }

    /// Infer the format from an archive file name.
    #[must_use]
    pub fn detect(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
            Some(Self::TarGz)
        } else if name.ends_with(".tar") {
            Some(Self::Tar)
        } else if name.ends_with(".zip") {
            Some(Self::Zip)
        } else {
            None
        }
    }
}

impl Display for ArchiveFormat {
    fn fmt(&self, formatter: &mut Formatter<'_>) -> fmt::Result {
        formatter.write_str(self.as_str())
    }
}

/// Where the bytes for a `write_bytes` operation come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "source", rename_all = "snake_case")]
pub enum BytePayload {
    /// Bytes embedded in the descriptor (base64 on the wire).
    Inline {
        /// Raw bytes to write.
        #[serde(with = "base64_data")]
        data: Vec<u8>,
    },
    /// Bytes piped through the helper's standard input.
    Stdin,
}

/// A single requested filesystem operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationDescriptor {
    /// Remove each path independently.
    Delete {
        /// Paths to remove.
        source_paths: Vec<PathBuf>,
    },
    /// Move each path to `destination_path/<name>`.
    Move {
        /// Paths to move.
        source_paths: Vec<PathBuf>,
        /// Directory receiving the moved items.
        destination_path: PathBuf,
    },
    /// Copy each path to `destination_path/<name>`.
    Copy {
        /// Paths to copy.
        source_paths: Vec<PathBuf>,
        /// Directory receiving the copies.
        destination_path: PathBuf,
    },
    /// Create `destination_path/<name>` symlinks pointing at each path.
    Link {
        /// Link targets.
        source_paths: Vec<PathBuf>,
        /// Directory receiving the links.
        destination_path: PathBuf,
    },
    /// Move one path to an exact new path.
    Rename {
        /// Path to rename.
        source_path: PathBuf,
        /// Exact new path.
        destination_path: PathBuf,
    },
    /// Create directories (with intermediates) and empty files (create-if-absent).
    CreatePaths {
        /// Directories to create.
        #[serde(default)]
        directories: Vec<PathBuf>,
        /// Files to create without truncating existing content.
        #[serde(default)]
        files: Vec<PathBuf>,
    },
    /// Apply owner and/or group to one path.
    SetOwnerGroup {
        /// Target path.
        source_path: PathBuf,
        /// User name or numeric uid.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        owner_name: Option<String>,
        /// Group name or numeric gid.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        group_name: Option<String>,
    },
    /// Apply a POSIX mode to one path.
    SetPermissions {
        /// Target path.
        source_path: PathBuf,
        /// Mode bits (`0..=0o7777`).
        mode: u32,
    },
    /// Replace the contents of one file with raw bytes.
    WriteBytes {
        /// Target file.
        source_path: PathBuf,
        /// Byte source.
        payload: BytePayload,
    },
    /// Atomically replace the contents of one file with UTF-8 text.
    WriteText {
        /// Target file.
        source_path: PathBuf,
        /// Replacement text.
        text: String,
    },
    /// Produce one archive containing every source path.
    Compress {
        /// Paths to archive.
        source_paths: Vec<PathBuf>,
        /// Archive file to produce.
        destination_path: PathBuf,
        /// Container format.
        format: ArchiveFormat,
    },
    /// Expand one archive into a directory.
    Decompress {
        /// Archive to expand.
        source_path: PathBuf,
        /// Output directory.
        destination_path: PathBuf,
        /// Container format; detected from the file name when absent.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        format: Option<ArchiveFormat>,
    },
    /// Write each rendition of an asset catalog into a directory.
    ExtractCatalog {
        /// Catalog archive.
        source_path: PathBuf,
        /// Output directory, created when absent.
        destination_path: PathBuf,
    },
    /// Enumerate the immediate children of one directory.
    ListDirectory {
        /// Directory to list.
        source_path: PathBuf,
    },
}

impl OperationDescriptor {
    /// Discriminator for this descriptor.
    #[must_use]
    pub const fn kind(&self) -> OperationKind {
        match self {
            Self::Delete { .. } => OperationKind::Delete,
            Self::Move { .. } => OperationKind::Move,
            Self::Copy { .. } => OperationKind::Copy,
            Self::Link { .. } => OperationKind::Link,
            Self::Rename { .. } => OperationKind::Rename,
            Self::CreatePaths { .. } => OperationKind::CreatePaths,
            Self::SetOwnerGroup { .. } => OperationKind::SetOwnerGroup,
            Self::SetPermissions { .. } => OperationKind::SetPermissions,
            Self::WriteBytes { .. } => OperationKind::WriteBytes,
            Self::WriteText { .. } => OperationKind::WriteText,
            Self::Compress { .. } => OperationKind::Compress,
            Self::Decompress { .. } => OperationKind::Decompress,
            Self::ExtractCatalog { .. } => OperationKind::ExtractCatalog,
            Self::ListDirectory { .. } => OperationKind::ListDirectory,
        }
    }

    /// Every path carried by the descriptor, paired with the wire field it came from.
    #[must_use]
    pub fn path_fields(&self) -> Vec<(&'static str, &Path)> {
        let mut fields = Vec::new();
        match self {
            Self::Delete { source_paths } => {
                fields.extend(source_paths.iter().map(|path| ("source_paths", path.as_path())));
            }
            Self::Move {
                source_paths,
                destination_path,
            }
            | Self::Copy {
                source_paths,
                destination_path,
            }
            | Self::Link {
                source_paths,
                destination_path,
            }
            | Self::Compress {
                source_paths,
                destination_path,
                ..
            } => {
                fields.extend(source_paths.iter().map(|path| ("source_paths", path.as_path())));
                fields.push(("destination_path", destination_path.as_path()));
            }
            Self::Rename {
                source_path,
                destination_path,
            }
            | Self::Decompress {
                source_path,
                destination_path,
                ..
            }
            | Self::ExtractCatalog {
                source_path,
                destination_path,
            } => {
                fields.push(("source_path", source_path.as_path()));
                fields.push(("destination_path", destination_path.as_path()));
            }
            Self::CreatePaths { directories, files } => {
                fields.extend(directories.iter().map(|path| ("directories", path.as_path())));
                fields.extend(files.iter().map(|path| ("files", path.as_path())));
            }
            Self::SetOwnerGroup { source_path, .. }
            | Self::SetPermissions { source_path, .. }
            | Self::WriteBytes { source_path, .. }
            | Self::WriteText { source_path, .. }
            | Self::ListDirectory { source_path } => {
                fields.push(("source_path", source_path.as_path()));
            }
        }
        fields
    }

    /// Whether the helper must read the payload from standard input.
    #[must_use]
    pub const fn requires_stdin(&self) -> bool {
        matches!(
            self,
            Self::WriteBytes {
                payload: BytePayload::Stdin,
                ..
            }
        )
    }

    /// Replace a stdin payload with the bytes produced by `read`.
    ///
    /// Descriptors that do not read from stdin are returned unchanged and `read` is not
    /// invoked.
    ///
    /// # Errors
    ///
    /// Returns the error produced by `read`.
    pub fn resolve_stdin<F>(self, read: F) -> io::Result<Self>
    where
        F: FnOnce() -> io::Result<Vec<u8>>,
    {
        match self {
            Self::WriteBytes {
                source_path,
                payload: BytePayload::Stdin,
            } => Ok(Self::WriteBytes {
                source_path,
                payload: BytePayload::Inline { data: read()? },
            }),
            other => Ok(other),
        }
    }
}

mod base64_data {
    use base64::{Engine as _, engine::general_purpose::STANDARD};
    use serde::{Deserialize, Deserializer, Serializer, de::Error as _};

    pub(super) fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&STANDARD.encode(data))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<u8>, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        STANDARD.decode(encoded.as_bytes()).map_err(D::Error::custom)
    }
}
