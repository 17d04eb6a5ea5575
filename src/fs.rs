//! Filesystem helpers shared by the pipelines
//!
//! - Atomic writes via tempfile + rename
//! - The newer-than filter backing incremental copies

use std::fs;
use std::path::Path;

use crate::error::KilnResult;

/// Outcome of an incremental copy
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CopyOutcome {
    Written,
    Skipped,
}

/// Write content to a file atomically
///
/// Parent directories are created first; the content lands in a temp file
/// next to the destination and is renamed into place.
pub fn atomic_write(path: &Path, content: &[u8]) -> KilnResult<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    std::io::Write::write_all(&mut tmp, content)?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// True when `src` is strictly newer than `dest` (or `dest` is absent)
///
/// Mirrors the incremental-copy contract: a destination at least as new as
/// its source is up to date and must not be rewritten.
pub fn is_newer(src: &Path, dest: &Path) -> KilnResult<bool> {
    if !dest.exists() {
        return Ok(true);
    }
    let src_mtime = fs::metadata(src)?.modified()?;
    let dest_mtime = fs::metadata(dest)?.modified()?;
    Ok(src_mtime > dest_mtime)
}

/// Copy `src` to `dest` unless the destination is already up to date
pub fn copy_if_newer(src: &Path, dest: &Path) -> KilnResult<CopyOutcome> {
    if !is_newer(src, dest)? {
        return Ok(CopyOutcome::Skipped);
    }
    let content = fs::read(src)?;
    atomic_write(dest, &content)?;
    Ok(CopyOutcome::Written)
}

/// Delete a directory tree; absent directories are fine
pub fn clean_dir(path: &Path) -> KilnResult<()> {
    if path.exists() {
        fs::remove_dir_all(path)?;
    }
    Ok(())
}
