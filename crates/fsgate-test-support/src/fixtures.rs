//! Scratch filesystem fixtures.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use anyhow::Result;
use tempfile::TempDir;

/// Create a scratch directory removed when the handle drops.
///
/// # Errors
///
/// Returns an error if the directory cannot be created.
pub fn temp_dir() -> Result<TempDir> {
    Ok(tempfile::Builder::new().prefix("fsgate-").tempdir()?)
}

/// Write `entries` (relative path, contents) beneath `root`, creating parents as needed.
///
/// # Errors
///
/// Returns an error if any file cannot be written.
pub fn write_files(root: &Path, entries: &[(&str, &[u8])]) -> Result<()> {
    for (relative, contents) in entries {
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, contents)?;
    }
    Ok(())
}

/// Write a zip archive containing `entries` verbatim, including unsafe entry names.
///
/// # Errors
///
/// Returns an error if the archive cannot be written.
pub fn write_zip_archive(archive: &Path, entries: &[(&str, &[u8])]) -> Result<()> {
    let file = File::create(archive)?;
    let mut zip = zip::ZipWriter::new(file);
    let options = zip::write::FileOptions::default();
    for (path, contents) in entries {
        zip.start_file(*path, options)?;
        zip.write_all(contents)?;
    }
    zip.finish()?;
    Ok(())
}
