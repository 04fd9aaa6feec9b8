//! Archive capability: build and expand zip, tar and gzip-compressed tar archives.
//!
//! # Design
//! - Archives are written to a temporary sibling and swapped in when complete.
//! - Extraction rejects absolute and parent-relative entry names before touching the disk.
//! - Zip symlink entries come back as links; their targets must stay inside the destination.
//! - A format that does not match the archive contents is an operation failure.

use std::fs::{self, File, Permissions};
use std::io::{self, Read, Seek, Write};
use std::os::unix::fs::{PermissionsExt, symlink};
use std::path::{Component, Path, PathBuf};

use flate2::Compression;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use fsgate_ops::ArchiveFormat;
use tempfile::NamedTempFile;
use tracing::debug;
use walkdir::WalkDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::error::{HelperError, HelperResult};
use crate::fsutil::{self, NEW_FILE_MODE};

const FILE_TYPE_MASK: u32 = 0o170_000;
const SYMLINK_TYPE: u32 = 0o120_000;

/// Archive compression and extraction.
pub trait ArchiveCodec {
    /// Produce one archive at `destination` containing every path in `sources`.
    ///
    /// # Errors
    ///
    /// Returns an error when a source cannot be read or the archive cannot be written.
    fn compress(
        &self,
        sources: &[PathBuf],
        destination: &Path,
        format: ArchiveFormat,
    ) -> HelperResult<()>;

    /// Expand `archive` into the directory `destination`, creating it when absent.
    ///
    /// # Errors
    ///
    /// Returns an error when the archive is unreadable, does not match `format`, or names an
    /// entry outside `destination`.
    fn extract(&self, archive: &Path, destination: &Path, format: ArchiveFormat)
    -> HelperResult<()>;
}

/// [`ArchiveCodec`] built on the `zip`, `tar` and `flate2` crates.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardArchiveCodec;

impl ArchiveCodec for StandardArchiveCodec {
    fn compress(
        &self,
        sources: &[PathBuf],
        destination: &Path,
        format: ArchiveFormat,
    ) -> HelperResult<()> {
        let parent = destination
            .parent()
            .ok_or_else(|| HelperError::InvalidInput {
                field: "destination_path",
                reason: "no_parent",
                value: Some(destination.display().to_string()),
            })?;
        let mut temp = NamedTempFile::new_in(parent)
            .map_err(|err| HelperError::io("compress.create_temp", parent, err))?;

        match format {
            ArchiveFormat::Zip => write_zip(sources, destination, temp.as_file_mut())?,
            ArchiveFormat::Tar => {
                write_tar(sources, destination, temp.as_file_mut())?;
            }
            ArchiveFormat::TarGz => {
                let encoder = GzEncoder::new(temp.as_file_mut(), Compression::default());
                let encoder = write_tar(sources, destination, encoder)?;
                encoder
                    .finish()
                    .map_err(|err| HelperError::io("compress.gzip_finish", destination, err))?;
            }
        }

        fs::set_permissions(temp.path(), Permissions::from_mode(NEW_FILE_MODE))
            .map_err(|err| HelperError::io("compress.set_permissions", destination, err))?;
        temp.persist(destination)
            .map_err(|err| HelperError::io("compress.persist", destination, err.error))?;
        debug!(archive = %destination.display(), %format, "archive written");
        Ok(())
    }

    fn extract(
        &self,
        archive: &Path,
        destination: &Path,
        format: ArchiveFormat,
    ) -> HelperResult<()> {
        fs::create_dir_all(destination)
            .map_err(|err| HelperError::io("extract.create_destination", destination, err))?;
        let file =
            File::open(archive).map_err(|err| HelperError::io("extract.open", archive, err))?;
        match format {
            ArchiveFormat::Zip => extract_zip(archive, file, destination),
            ArchiveFormat::Tar => extract_tar(archive, file, destination),
            ArchiveFormat::TarGz => extract_tar(archive, GzDecoder::new(file), destination),
        }
    }
}

fn entry_name(path: &Path) -> String {
    path.components()
        .map(|component| component.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

fn archive_root(source: &Path) -> HelperResult<PathBuf> {
    Ok(PathBuf::from(fsutil::file_name(source)?))
}

fn write_zip<W: Write + Seek>(
    sources: &[PathBuf],
    destination: &Path,
    writer: W,
) -> HelperResult<()> {
    let mut zip = ZipWriter::new(writer);
    let options = FileOptions::default().compression_method(CompressionMethod::Deflated);

    for source in sources {
        let root = archive_root(source)?;
        for entry in WalkDir::new(source) {
            let entry = entry.map_err(|err| HelperError::walkdir("compress.walk", source, err))?;
            let relative = entry.path().strip_prefix(source).unwrap_or(entry.path());
            let name = entry_name(&root.join(relative));
            let metadata = entry
                .path()
                .symlink_metadata()
                .map_err(|err| HelperError::io("compress.inspect", entry.path(), err))?;
            let entry_options = options.unix_permissions(metadata.permissions().mode() & 0o7777);

            if metadata.is_dir() {
                zip.add_directory(format!("{name}/"), entry_options)
                    .map_err(|err| HelperError::zip("compress.zip_directory", destination, err))?;
            } else if metadata.file_type().is_symlink() {
                let target = fs::read_link(entry.path())
                    .map_err(|err| HelperError::io("compress.read_link", entry.path(), err))?;
                zip.add_symlink(name, target.to_string_lossy(), entry_options)
                    .map_err(|err| HelperError::zip("compress.zip_symlink", destination, err))?;
            } else {
                zip.start_file(name, entry_options)
                    .map_err(|err| HelperError::zip("compress.zip_file", destination, err))?;
                let mut input = File::open(entry.path())
                    .map_err(|err| HelperError::io("compress.open_entry", entry.path(), err))?;
                io::copy(&mut input, &mut zip)
                    .map_err(|err| HelperError::io("compress.copy_entry", entry.path(), err))?;
            }
        }
    }

    zip.finish()
        .map_err(|err| HelperError::zip("compress.zip_finish", destination, err))?;
    Ok(())
}

fn write_tar<W: Write>(sources: &[PathBuf], destination: &Path, writer: W) -> HelperResult<W> {
    let mut builder = tar::Builder::new(writer);
    builder.follow_symlinks(false);

    for source in sources {
        let root = archive_root(source)?;
        let metadata = fsutil::ensure_exists(source)?;
        let appended = if metadata.is_dir() {
            builder.append_dir_all(&root, source)
        } else {
            builder.append_path_with_name(source, &root)
        };
        appended.map_err(|err| HelperError::io("compress.tar_append", source, err))?;
    }

    builder
        .into_inner()
        .map_err(|err| HelperError::io("compress.tar_finish", destination, err))
}

fn extract_zip<R: Read + Seek>(archive: &Path, reader: R, destination: &Path) -> HelperResult<()> {
    let mut zip =
        ZipArchive::new(reader).map_err(|err| HelperError::zip("extract.zip_open", archive, err))?;

    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|err| HelperError::zip("extract.zip_entry", archive, err))?;
        let relative = fsutil::sanitize_relative("archive_entry", entry.name())?;
        if relative.as_os_str().is_empty() {
            continue;
        }
        let target = destination.join(&relative);

        if entry.is_dir() {
            fs::create_dir_all(&target)
                .map_err(|err| HelperError::io("extract.create_dir", &target, err))?;
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent)
                .map_err(|err| HelperError::io("extract.create_parent", parent, err))?;
        }
        if entry
            .unix_mode()
            .is_some_and(|mode| mode & FILE_TYPE_MASK == SYMLINK_TYPE)
        {
            let mut link = String::new();
            entry
                .read_to_string(&mut link)
                .map_err(|err| HelperError::io("extract.read_link", &target, err))?;
            let link = confined_link_target(&relative, &link)?;
            symlink(&link, &target)
                .map_err(|err| HelperError::io("extract.create_link", &target, err))?;
            continue;
        }
        let mut output = File::create(&target)
            .map_err(|err| HelperError::io("extract.create_file", &target, err))?;
        io::copy(&mut entry, &mut output)
            .map_err(|err| HelperError::io("extract.copy", &target, err))?;
        if let Some(mode) = entry.unix_mode() {
            fs::set_permissions(&target, Permissions::from_mode(mode & 0o7777))
                .map_err(|err| HelperError::io("extract.set_permissions", &target, err))?;
        }
    }
    Ok(())
}

/// Accept a link stored at `entry` only when `link` resolves inside the extraction root.
fn confined_link_target(entry: &Path, link: &str) -> HelperResult<PathBuf> {
    let escape = || HelperError::InvalidInput {
        field: "archive_entry",
        reason: "link_escapes_destination",
        value: Some(link.to_string()),
    };
    let target = Path::new(link);
    if target.is_absolute() {
        return Err(escape());
    }
    let mut depth = entry.components().count().saturating_sub(1);
    for component in target.components() {
        match component {
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::ParentDir => match depth.checked_sub(1) {
                Some(parent) => depth = parent,
                None => return Err(escape()),
            },
            Component::RootDir | Component::Prefix(_) => return Err(escape()),
        }
    }
    Ok(target.to_path_buf())
}

fn extract_tar<R: Read>(archive: &Path, reader: R, destination: &Path) -> HelperResult<()> {
    let mut tarball = tar::Archive::new(reader);
    let entries = tarball
        .entries()
        .map_err(|err| HelperError::io("extract.tar_open", archive, err))?;

    for entry in entries {
        let mut entry = entry.map_err(|err| HelperError::io("extract.tar_entry", archive, err))?;
        let name = entry
            .path()
            .map_err(|err| HelperError::io("extract.tar_path", archive, err))?
            .to_string_lossy()
            .into_owned();
        if fsutil::sanitize_relative("archive_entry", &name)?
            .as_os_str()
            .is_empty()
        {
            continue;
        }
        entry
            .unpack_in(destination)
            .map_err(|err| HelperError::io("extract.tar_unpack", destination, err))?;
    }
    Ok(())
}
