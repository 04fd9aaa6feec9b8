//! Operation Executor: performs one decoded descriptor with the elevated identity.
//!
//! # Design
//! - Entry point requires the [`Elevated`] token; execution never queries identity itself.
//! - Bulk kinds attempt every item sequentially and collect every failure.
//! - Single-target kinds fail the invocation on their first error.
//! - Existing destination entries are never overwritten by move, copy, link or rename.

use std::fs::{self, OpenOptions, Permissions};
use std::os::unix::fs::{PermissionsExt, symlink};
use std::path::{Path, PathBuf};

use fsgate_ops::{
    ArchiveFormat, BytePayload, ExecutionResult, ItemFailures, OperationDescriptor, OperationKind,
};
use nix::unistd::chown;
use tracing::{debug, error, info, warn};

use crate::archive::{ArchiveCodec, StandardArchiveCodec};
use crate::catalog::{CatalogReader, UnavailableCatalogReader};
use crate::error::{HelperError, HelperResult};
use crate::fsutil;
use crate::privilege::Elevated;

/// Executes descriptors using the injected archive and catalog capabilities.
#[derive(Debug, Clone, Default)]
pub struct Executor<A = StandardArchiveCodec, C = UnavailableCatalogReader> {
    archive: A,
    catalog: C,
}

impl Executor {
    /// Executor with the production capabilities.
    #[must_use]
    pub const fn standard() -> Self {
        Self {
            archive: StandardArchiveCodec,
            catalog: UnavailableCatalogReader,
        }
    }
}

impl<A: ArchiveCodec, C: CatalogReader> Executor<A, C> {
    /// Executor with custom capabilities.
    pub const fn with_capabilities(archive: A, catalog: C) -> Self {
        Self { archive, catalog }
    }

    /// Perform `descriptor` and report its outcome.
    pub fn execute(&self, elevated: &Elevated, descriptor: OperationDescriptor) -> ExecutionResult {
        let kind = descriptor.kind();
        info!(%kind, uid = elevated.uid(), "executing operation");

        let result = match descriptor {
            OperationDescriptor::Delete { source_paths } => {
                let mut ledger = ItemLedger::new(kind);
                for path in &source_paths {
                    let item = path.display().to_string();
                    ledger.record(&item, &item, fsutil::remove_path(path));
                }
                ledger.finish()
            }
            OperationDescriptor::Move {
                source_paths,
                destination_path,
            } => transfer(kind, &source_paths, &destination_path, |source, target| {
                fsutil::ensure_exists(source)?;
                fsutil::ensure_vacant(target)?;
                fsutil::move_tree(source, target)
            }),
            OperationDescriptor::Copy {
                source_paths,
                destination_path,
            } => transfer(kind, &source_paths, &destination_path, |source, target| {
                fsutil::ensure_exists(source)?;
                fsutil::ensure_vacant(target)?;
                fsutil::copy_tree(source, target)
            }),
            OperationDescriptor::Link {
                source_paths,
                destination_path,
            } => transfer(kind, &source_paths, &destination_path, |source, target| {
                fsutil::ensure_vacant(target)?;
                symlink(source, target).map_err(|err| HelperError::io("link.create", target, err))
            }),
            OperationDescriptor::Rename {
                source_path,
                destination_path,
            } => conclude(kind, rename(&source_path, &destination_path)),
            OperationDescriptor::CreatePaths { directories, files } => {
                create_paths(kind, &directories, &files)
            }
            OperationDescriptor::SetOwnerGroup {
                source_path,
                owner_name,
                group_name,
            } => conclude(
                kind,
                set_owner_group(&source_path, owner_name.as_deref(), group_name.as_deref()),
            ),
            OperationDescriptor::SetPermissions { source_path, mode } => conclude(
                kind,
                fs::set_permissions(&source_path, Permissions::from_mode(mode))
                    .map_err(|err| HelperError::io("set_permissions", &source_path, err)),
            ),
            OperationDescriptor::WriteBytes {
                source_path,
                payload,
            } => conclude(kind, write_bytes(&source_path, payload)),
            OperationDescriptor::WriteText { source_path, text } => {
                conclude(kind, fsutil::write_atomic(&source_path, text.as_bytes()))
            }
            OperationDescriptor::Compress {
                source_paths,
                destination_path,
                format,
            } => conclude(
                kind,
                self.archive
                    .compress(&source_paths, &destination_path, format),
            ),
            OperationDescriptor::Decompress {
                source_path,
                destination_path,
                format,
            } => conclude(
                kind,
                self.decompress(&source_path, &destination_path, format),
            ),
            OperationDescriptor::ExtractCatalog {
                source_path,
                destination_path,
            } => self.extract_catalog(kind, &source_path, &destination_path),
            OperationDescriptor::ListDirectory { source_path } => {
                match list_directory(&source_path) {
                    Ok(entries) => ExecutionResult::listing(entries),
                    Err(err) => conclude(kind, Err(err)),
                }
            }
        };

        info!(%kind, success = result.is_success(), "operation finished");
        result
    }

    fn decompress(
        &self,
        archive: &Path,
        destination: &Path,
        format: Option<ArchiveFormat>,
    ) -> HelperResult<()> {
        let format = format
            .or_else(|| ArchiveFormat::detect(archive))
            .ok_or_else(|| HelperError::Unsupported {
                operation: "archive format",
                value: Some(archive.display().to_string()),
            })?;
        self.archive.extract(archive, destination, format)
    }

    fn extract_catalog(
        &self,
        kind: OperationKind,
        catalog: &Path,
        destination: &Path,
    ) -> ExecutionResult {
        let renditions = match self.catalog.renditions(catalog).and_then(|renditions| {
            fs::create_dir_all(destination)
                .map_err(|err| HelperError::io("extract_catalog.create_dir", destination, err))?;
            Ok(renditions)
        }) {
            Ok(renditions) => renditions,
            Err(err) => return conclude(kind, Err(err)),
        };

        let mut ledger = ItemLedger::new(kind);
        for rendition in renditions {
            let Some(data) = rendition.data else {
                debug!(rendition = %rendition.name, "rendition has no item data");
                continue;
            };
            let outcome = rendition_path(destination, &rendition.name).and_then(|target| {
                fs::write(&target, &data)
                    .map_err(|err| HelperError::io("extract_catalog.write", &target, err))
            });
            ledger.record(&rendition.name, &rendition.name, outcome);
        }
        ledger.finish()
    }
}

/// Per-item failure collector for bulk kinds.
struct ItemLedger {
    kind: OperationKind,
    failures: ItemFailures,
}

impl ItemLedger {
    const fn new(kind: OperationKind) -> Self {
        Self {
            kind,
            failures: ItemFailures::new(),
        }
    }

    /// Record `outcome` under `item`, or under `fallback` when `item` already failed.
    fn record(&mut self, item: &str, fallback: &str, outcome: HelperResult<()>) {
        let Err(err) = outcome else {
            return;
        };
        let reason = err.reason();
        warn!(kind = %self.kind, item, reason = %reason, error = %err, "item failed");
        let key = if self.failures.contains_key(item) {
            fallback
        } else {
            item
        };
        self.failures.insert(key.to_string(), reason);
    }

    fn finish(self) -> ExecutionResult {
        ExecutionResult::from_failures(self.failures)
    }
}

fn conclude(kind: OperationKind, outcome: HelperResult<()>) -> ExecutionResult {
    match outcome {
        Ok(()) => ExecutionResult::success(),
        Err(err) => {
            let reason = err.describe();
            error!(%kind, reason = %reason, error = %err, "operation failed");
            ExecutionResult::fatal(reason)
        }
    }
}

/// Apply `apply(source, destination/<name>)` to every source, keyed by the source's name.
fn transfer<F>(
    kind: OperationKind,
    sources: &[PathBuf],
    destination: &Path,
    apply: F,
) -> ExecutionResult
where
    F: Fn(&Path, &Path) -> HelperResult<()>,
{
    let mut ledger = ItemLedger::new(kind);
    for source in sources {
        let full = source.display().to_string();
        let item = source
            .file_name()
            .map_or_else(|| full.clone(), |name| name.to_string_lossy().into_owned());
        let outcome = fsutil::file_name(source)
            .and_then(|name| apply(source, &destination.join(name)));
        ledger.record(&item, &full, outcome);
    }
    ledger.finish()
}

fn rename(source: &Path, destination: &Path) -> HelperResult<()> {
    fsutil::ensure_exists(source)?;
    fsutil::ensure_vacant(destination)?;
    fsutil::move_tree(source, destination)
}

fn create_paths(kind: OperationKind, directories: &[PathBuf], files: &[PathBuf]) -> ExecutionResult {
    let mut ledger = ItemLedger::new(kind);
    for directory in directories {
        let item = directory.display().to_string();
        let outcome = fs::create_dir_all(directory)
            .map_err(|err| HelperError::io("create_paths.directory", directory, err));
        ledger.record(&item, &item, outcome);
    }
    for file in files {
        let item = file.display().to_string();
        ledger.record(&item, &item, create_file(file));
    }
    ledger.finish()
}

fn create_file(path: &Path) -> HelperResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .map_err(|err| HelperError::io("create_paths.parent", parent, err))?;
    }
    OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .map_err(|err| HelperError::io("create_paths.file", path, err))?;
    Ok(())
}

fn set_owner_group(path: &Path, owner: Option<&str>, group: Option<&str>) -> HelperResult<()> {
    let uid = owner.map(fsutil::resolve_owner).transpose()?;
    let gid = group.map(fsutil::resolve_group).transpose()?;
    chown(path, uid, gid).map_err(|errno| HelperError::nix("set_owner_group.chown", path, errno))
}

fn write_bytes(path: &Path, payload: BytePayload) -> HelperResult<()> {
    match payload {
        BytePayload::Inline { data } => {
            fs::write(path, data).map_err(|err| HelperError::io("write_bytes", path, err))
        }
        BytePayload::Stdin => Err(HelperError::InvalidInput {
            field: "payload",
            reason: "unresolved_stdin",
            value: None,
        }),
    }
}

fn rendition_path(destination: &Path, name: &str) -> HelperResult<PathBuf> {
    let relative = fsutil::sanitize_relative("rendition_name", name)?;
    if relative.components().count() != 1 {
        return Err(HelperError::InvalidInput {
            field: "rendition_name",
            reason: "not_a_file_name",
            value: Some(name.to_string()),
        });
    }
    Ok(destination.join(relative))
}

fn list_directory(path: &Path) -> HelperResult<Vec<PathBuf>> {
    let mut entries = Vec::new();
    for entry in fs::read_dir(path).map_err(|err| HelperError::io("list_directory", path, err))? {
        let entry = entry.map_err(|err| HelperError::io("list_directory.entry", path, err))?;
        entries.push(entry.path());
    }
    entries.sort();
    Ok(entries)
}
