//! Crash-safe whole-file replacement.

use std::fs::{self, File};
use std::io::{self, Write};
use std::path::Path;

/// Replaces `path` with `contents` atomically.
///
/// The data is written to a temporary file in the same directory, flushed to
/// disk, given the permissions (and on Unix the ownership) of the file it
/// replaces, and renamed over the original.
pub fn atomic_write(path: &Path, contents: &[u8]) -> io::Result<()> {
    write_replacement(path, contents, None)
}

/// Like [`atomic_write`], but sets an explicit Unix permission mode.
///
/// Used for artifacts holding credentials. On other platforms the mode is
/// ignored.
pub fn atomic_write_with_mode(path: &Path, contents: &[u8], mode: u32) -> io::Result<()> {
    write_replacement(path, contents, Some(mode))
}

fn write_replacement(path: &Path, contents: &[u8], mode: Option<u32>) -> io::Result<()> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));

    let mut tmp = tempfile::Builder::new()
        .prefix(".provision-")
        .suffix(".tmp")
        .tempfile_in(dir)?;

    tmp.write_all(contents)?;
    tmp.flush()?;

    let existing = fs::metadata(path).ok();
    match (mode, &existing) {
        (Some(mode), _) => set_mode(tmp.as_file(), mode)?,
        (None, Some(meta)) => tmp.as_file().set_permissions(meta.permissions())?,
        (None, None) => {}
    }
    if let Some(meta) = &existing {
        copy_ownership(tmp.as_file(), meta)?;
    }

    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;

    // Make the rename itself durable.
    if let Ok(dir) = File::open(dir) {
        let _ = dir.sync_all();
    }

    tracing::debug!(path = %path.display(), bytes = contents.len(), "Replaced file atomically");
    Ok(())
}

#[cfg(unix)]
fn set_mode(file: &File, mode: u32) -> io::Result<()> {
    use std::os::unix::fs::PermissionsExt;
    file.set_permissions(fs::Permissions::from_mode(mode))
}

#[cfg(not(unix))]
fn set_mode(_file: &File, _mode: u32) -> io::Result<()> {
    Ok(())
}

#[cfg(unix)]
fn copy_ownership(file: &File, meta: &fs::Metadata) -> io::Result<()> {
    use std::os::unix::fs::MetadataExt;
    std::os::unix::fs::fchown(file, Some(meta.uid()), Some(meta.gid()))
}

#[cfg(not(unix))]
fn copy_ownership(_file: &File, _meta: &fs::Metadata) -> io::Result<()> {
    Ok(())
}
