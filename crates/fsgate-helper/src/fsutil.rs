//! Filesystem primitives shared by the executor and the archive codec.

use std::fs::{self, File, Permissions};
use std::io::{self, Write};
use std::os::unix::fs::{MetadataExt, PermissionsExt, symlink};
use std::path::{Component, Path, PathBuf};

use nix::unistd::{Gid, Group, Uid, User, chown};
use tempfile::NamedTempFile;
use tracing::warn;
use walkdir::WalkDir;

use crate::error::{HelperError, HelperResult};

/// Mode given to files the helper creates from scratch.
pub(crate) const NEW_FILE_MODE: u32 = 0o644;

/// Fail with [`HelperError::DestinationExists`] when anything (even a dangling link) occupies
/// `path`.
pub(crate) fn ensure_vacant(path: &Path) -> HelperResult<()> {
    match fs::symlink_metadata(path) {
        Ok(_) => Err(HelperError::DestinationExists {
            path: path.to_path_buf(),
        }),
        Err(err) if err.kind() == io::ErrorKind::NotFound => Ok(()),
        Err(err) => Err(HelperError::io("ensure_vacant", path, err)),
    }
}

/// Fail with a not-found IO error unless `path` exists (links are not followed).
pub(crate) fn ensure_exists(path: &Path) -> HelperResult<fs::Metadata> {
    fs::symlink_metadata(path).map_err(|err| HelperError::io("inspect_source", path, err))
}

/// Remove a file, link or whole directory tree.
pub(crate) fn remove_path(path: &Path) -> HelperResult<()> {
    let metadata = ensure_exists(path)?;
    if metadata.is_dir() {
        fs::remove_dir_all(path).map_err(|err| HelperError::io("remove.dir", path, err))
    } else {
        fs::remove_file(path).map_err(|err| HelperError::io("remove.file", path, err))
    }
}

/// Final path component used to place an item inside a destination directory.
pub(crate) fn file_name(path: &Path) -> HelperResult<&std::ffi::OsStr> {
    path.file_name().ok_or_else(|| HelperError::InvalidInput {
        field: "source_paths",
        reason: "no_file_name",
        value: Some(path.display().to_string()),
    })
}

/// Recursively copy `source` to `destination`, recreating symbolic links as links.
pub(crate) fn copy_tree(source: &Path, destination: &Path) -> HelperResult<()> {
    let metadata = ensure_exists(source)?;
    if metadata.file_type().is_symlink() {
        return copy_link(source, destination);
    }
    if !metadata.is_dir() {
        fs::copy(source, destination)
            .map_err(|err| HelperError::io("copy_tree.copy_file", destination, err))?;
        return Ok(());
    }
    ensure_outside(source, destination)?;

    for entry in WalkDir::new(source) {
        let entry = entry.map_err(|err| HelperError::walkdir("copy_tree.walk", source, err))?;
        let relative = entry
            .path()
            .strip_prefix(source)
            .map_err(|_| HelperError::InvalidInput {
                field: "source_paths",
                reason: "strip_prefix",
                value: Some(entry.path().display().to_string()),
            })?;
        let target = destination.join(relative);
        let file_type = entry.file_type();
        if file_type.is_dir() {
            fs::create_dir_all(&target)
                .map_err(|err| HelperError::io("copy_tree.create_dir", &target, err))?;
        } else if file_type.is_symlink() {
            copy_link(entry.path(), &target)?;
        } else {
            fs::copy(entry.path(), &target)
                .map_err(|err| HelperError::io("copy_tree.copy_entry", &target, err))?;
        }
    }
    Ok(())
}

fn copy_link(source: &Path, destination: &Path) -> HelperResult<()> {
    let target =
        fs::read_link(source).map_err(|err| HelperError::io("copy_tree.read_link", source, err))?;
    symlink(&target, destination)
        .map_err(|err| HelperError::io("copy_tree.create_link", destination, err))
}

/// Fail unless `destination` lies outside the directory `source`.
///
/// `destination` need not exist; its parent must.
pub(crate) fn ensure_outside(source: &Path, destination: &Path) -> HelperResult<()> {
    let source = fs::canonicalize(source)
        .map_err(|err| HelperError::io("copy_tree.resolve_source", source, err))?;
    let resolved = match (destination.parent(), destination.file_name()) {
        (Some(parent), Some(name)) => fs::canonicalize(parent)
            .map_err(|err| HelperError::io("copy_tree.resolve_destination", parent, err))?
            .join(name),
        _ => destination.to_path_buf(),
    };
    if resolved.starts_with(&source) {
        return Err(HelperError::InvalidInput {
            field: "destination_path",
            reason: "destination_inside_source",
            value: None,
        });
    }
    Ok(())
}

/// Move `source` to `destination`, copying and removing when they live on different devices.
pub(crate) fn move_tree(source: &Path, destination: &Path) -> HelperResult<()> {
    match fs::rename(source, destination) {
        Ok(()) => Ok(()),
        Err(err) if err.kind() == io::ErrorKind::CrossesDevices => {
            move_across_devices(source, destination, copy_tree)
        }
        Err(err) => Err(HelperError::io("move_tree.rename", source, err)),
    }
}

/// Copy-then-remove move. A failed copy removes whatever it left at `destination`.
fn move_across_devices<F>(source: &Path, destination: &Path, copy: F) -> HelperResult<()>
where
    F: FnOnce(&Path, &Path) -> HelperResult<()>,
{
    if let Err(err) = copy(source, destination) {
        if fs::symlink_metadata(destination).is_ok() {
            if let Err(cleanup) = remove_path(destination) {
                warn!(
                    path = %destination.display(),
                    error = %cleanup,
                    "partial copy left behind after failed move"
                );
            }
        }
        return Err(err);
    }
    remove_path(source)
}

/// Atomically replace `path` with `contents`.
pub(crate) fn write_atomic(path: &Path, contents: &[u8]) -> HelperResult<()> {
    write_atomic_with(path, |file| file.write_all(contents))
}

/// Atomically replace `path` with whatever `fill` writes.
///
/// The data goes to a sibling temporary file that is renamed over `path` only after `fill`
/// and the flush succeed. An existing file's mode, owner and group carry over.
pub(crate) fn write_atomic_with<F>(path: &Path, fill: F) -> HelperResult<()>
where
    F: FnOnce(&mut File) -> io::Result<()>,
{
    let parent = path.parent().ok_or_else(|| HelperError::InvalidInput {
        field: "source_path",
        reason: "no_parent",
        value: Some(path.display().to_string()),
    })?;
    let previous = match fs::metadata(path) {
        Ok(metadata) => Some(metadata),
        Err(err) if err.kind() == io::ErrorKind::NotFound => None,
        Err(err) => return Err(HelperError::io("write_atomic.inspect", path, err)),
    };

    let mut temp = NamedTempFile::new_in(parent)
        .map_err(|err| HelperError::io("write_atomic.create_temp", parent, err))?;
    fill(temp.as_file_mut())
        .and_then(|()| temp.as_file().sync_all())
        .map_err(|err| HelperError::io("write_atomic.write", path, err))?;

    match &previous {
        Some(metadata) => {
            fs::set_permissions(temp.path(), metadata.permissions())
                .map_err(|err| HelperError::io("write_atomic.set_permissions", path, err))?;
            let owner = Uid::from_raw(metadata.uid());
            let group = Gid::from_raw(metadata.gid());
            if let Err(errno) = chown(temp.path(), Some(owner), Some(group)) {
                warn!(
                    path = %path.display(),
                    error = %errno,
                    "could not carry ownership over to replacement file"
                );
            }
        }
        None => {
            fs::set_permissions(temp.path(), Permissions::from_mode(NEW_FILE_MODE))
                .map_err(|err| HelperError::io("write_atomic.set_permissions", path, err))?;
        }
    }

    temp.persist(path)
        .map_err(|err| HelperError::io("write_atomic.persist", path, err.error))?;
    Ok(())
}

/// Resolve a user name or numeric uid.
pub(crate) fn resolve_owner(owner: &str) -> HelperResult<Uid> {
    let trimmed = owner.trim();
    if let Ok(id) = trimmed.parse::<u32>() {
        return Ok(Uid::from_raw(id));
    }
    let user = User::from_name(trimmed)
        .map_err(|source| HelperError::UserLookup {
            user: trimmed.to_string(),
            source,
        })?
        .ok_or_else(|| HelperError::InvalidInput {
            field: "owner_name",
            reason: "unknown_user",
            value: Some(trimmed.to_string()),
        })?;
    Ok(user.uid)
}

/// Resolve a group name or numeric gid.
pub(crate) fn resolve_group(group: &str) -> HelperResult<Gid> {
    let trimmed = group.trim();
    if let Ok(id) = trimmed.parse::<u32>() {
        return Ok(Gid::from_raw(id));
    }
    let group = Group::from_name(trimmed)
        .map_err(|source| HelperError::GroupLookup {
            group: trimmed.to_string(),
            source,
        })?
        .ok_or_else(|| HelperError::InvalidInput {
            field: "group_name",
            reason: "unknown_group",
            value: Some(trimmed.to_string()),
        })?;
    Ok(group.gid)
}

/// Reduce an archive entry or rendition name to a relative path without parent, root or
/// prefix components. Names made only of `.` components reduce to an empty path.
pub(crate) fn sanitize_relative(field: &'static str, entry: &str) -> HelperResult<PathBuf> {
    let path = Path::new(entry);
    if path.is_absolute() {
        return Err(HelperError::InvalidInput {
            field,
            reason: "absolute_path",
            value: Some(entry.to_string()),
        });
    }

    let mut sanitized = PathBuf::new();
    for component in path.components() {
        match component {
            Component::Normal(segment) => sanitized.push(segment),
            Component::CurDir => {}
            _ => {
                return Err(HelperError::InvalidInput {
                    field,
                    reason: "invalid_segment",
                    value: Some(entry.to_string()),
                });
            }
        }
    }
    Ok(sanitized)
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    #[test]
    fn ensure_vacant_sees_dangling_links() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let link = temp.path().join("dangling");
        symlink(temp.path().join("nowhere"), &link)?;
        assert!(matches!(
            ensure_vacant(&link),
            Err(HelperError::DestinationExists { .. })
        ));
        ensure_vacant(&temp.path().join("free"))?;
        Ok(())
    }

    #[test]
    fn copy_tree_keeps_links_as_links() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let source = temp.path().join("src");
        fs::create_dir_all(source.join("nested"))?;
        fs::write(source.join("nested/data.txt"), b"payload")?;
        symlink("nested/data.txt", source.join("alias"))?;

        let destination = temp.path().join("dst");
        copy_tree(&source, &destination)?;

        assert_eq!(fs::read(destination.join("nested/data.txt"))?, b"payload");
        let alias = destination.join("alias");
        assert!(fs::symlink_metadata(&alias)?.file_type().is_symlink());
        assert_eq!(fs::read_link(alias)?, PathBuf::from("nested/data.txt"));
        Ok(())
    }

    #[test]
    fn move_tree_relocates_directories() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let source = temp.path().join("album");
        fs::create_dir(&source)?;
        fs::write(source.join("track.flac"), b"flac")?;
        let destination = temp.path().join("moved");

        move_tree(&source, &destination)?;
        assert!(!source.exists());
        assert_eq!(fs::read(destination.join("track.flac"))?, b"flac");
        Ok(())
    }

    #[test]
    fn copy_tree_refuses_destination_inside_source() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let source = temp.path().join("photos");
        fs::create_dir_all(source.join("2024"))?;

        for destination in [source.join("photos"), source.join("2024/photos")] {
            assert!(matches!(
                copy_tree(&source, &destination),
                Err(HelperError::InvalidInput {
                    reason: "destination_inside_source",
                    ..
                })
            ));
            assert!(!destination.exists());
        }
        assert_eq!(fs::read_dir(&source)?.count(), 1);

        let sibling = temp.path().join("photos-backup");
        copy_tree(&source, &sibling)?;
        assert!(sibling.join("2024").is_dir());
        Ok(())
    }

    #[test]
    fn failed_cross_device_copy_removes_partial_destination() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let source = temp.path().join("album");
        fs::create_dir(&source)?;
        fs::write(source.join("track.flac"), b"flac")?;
        let destination = temp.path().join("moved");

        let result = move_across_devices(&source, &destination, |_, target| {
            fs::create_dir(target).map_err(|err| HelperError::io("test.mkdir", target, err))?;
            fs::write(target.join("track.flac"), b"fl")
                .map_err(|err| HelperError::io("test.write", target, err))?;
            Err(HelperError::io(
                "copy_tree.copy_entry",
                target,
                io::Error::from(io::ErrorKind::PermissionDenied),
            ))
        });

        assert!(matches!(
            result,
            Err(HelperError::Io {
                operation: "copy_tree.copy_entry",
                ..
            })
        ));
        assert!(fs::symlink_metadata(&destination).is_err());
        assert_eq!(fs::read(source.join("track.flac"))?, b"flac");
        ensure_vacant(&destination)?;

        move_across_devices(&source, &destination, copy_tree)?;
        assert!(!source.exists());
        assert_eq!(fs::read(destination.join("track.flac"))?, b"flac");
        Ok(())
    }

    #[test]
    fn failed_fill_leaves_original_untouched() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("notes.txt");
        fs::write(&path, b"original")?;

        let result = write_atomic_with(&path, |file| {
            file.write_all(b"half of the new")?;
            Err(io::Error::other("disk full"))
        });

        assert!(matches!(
            result,
            Err(HelperError::Io {
                operation: "write_atomic.write",
                ..
            })
        ));
        assert_eq!(fs::read(&path)?, b"original");
        assert_eq!(fs::read_dir(temp.path())?.count(), 1);
        Ok(())
    }

    #[test]
    fn atomic_write_preserves_mode() -> anyhow::Result<()> {
        let temp = tempfile::tempdir()?;
        let path = temp.path().join("script.sh");
        fs::write(&path, b"#!/bin/sh\n")?;
        fs::set_permissions(&path, Permissions::from_mode(0o750))?;

        write_atomic(&path, b"#!/bin/sh\nexit 0\n")?;

        let mut contents = String::new();
        File::open(&path)?.read_to_string(&mut contents)?;
        assert_eq!(contents, "#!/bin/sh\nexit 0\n");
        assert_eq!(fs::metadata(&path)?.permissions().mode() & 0o7777, 0o750);

        let fresh = temp.path().join("fresh.txt");
        write_atomic(&fresh, b"new")?;
        assert_eq!(
            fs::metadata(&fresh)?.permissions().mode() & 0o7777,
            NEW_FILE_MODE
        );
        Ok(())
    }

    #[test]
    fn numeric_ids_resolve_without_lookup() -> anyhow::Result<()> {
        assert_eq!(resolve_owner("1000")?, Uid::from_raw(1000));
        assert_eq!(resolve_group(" 20 ")?, Gid::from_raw(20));
        assert!(matches!(
            resolve_owner("no-such-user-fsgate"),
            Err(HelperError::InvalidInput {
                reason: "unknown_user",
                ..
            }) | Err(HelperError::UserLookup { .. })
        ));
        Ok(())
    }

    #[test]
    fn sanitize_relative_rejects_escapes() -> anyhow::Result<()> {
        assert_eq!(
            sanitize_relative("archive_entry", "./docs/readme.md")?,
            PathBuf::from("docs/readme.md")
        );
        assert_eq!(sanitize_relative("archive_entry", "./")?, PathBuf::new());
        for entry in ["/etc/passwd", "../escape", "docs/../../escape"] {
            assert!(
                sanitize_relative("archive_entry", entry).is_err(),
                "{entry} must be rejected"
            );
        }
        Ok(())
    }
}
