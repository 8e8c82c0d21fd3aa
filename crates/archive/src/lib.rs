//! Directory tree <-> single tar archive.
//!
//! The archive is the unit transferred over the wire: [`pack`] turns a
//! directory into one deterministic tar blob, [`unpack`] reproduces the tree.
//! Entries are prefixed with the source directory's own name, so unpacking
//! into a working root yields `working_root/<dir_name>/...` ready for the
//! receiver's directory swap. Empty directories get their own entries and
//! survive the round-trip.

use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::time::Instant;

use walkdir::WalkDir;

/// Errors produced while packing or unpacking an archive.
///
/// Any failure aborts the whole operation; partial output must not be
/// treated as valid by the caller.
#[derive(Debug, thiserror::Error)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("not a file: {0}")]
    NotAFile(String),

    #[error("source directory has no name: {0}")]
    UnnamedSource(String),

    #[error("walk error: {0}")]
    Walk(#[from] walkdir::Error),
}

/// Packs `source_dir` into a tar stream written to `writer`.
///
/// Entries are named `<dir_name>/<relative_path>` and emitted in sorted
/// order, so the same tree always produces the same archive.
pub fn pack<W: Write>(source_dir: &Path, writer: W) -> Result<(), ArchiveError> {
    if !source_dir.is_dir() {
        return Err(ArchiveError::NotADirectory(source_dir.display().to_string()));
    }
    let root_name = source_dir
        .file_name()
        .ok_or_else(|| ArchiveError::UnnamedSource(source_dir.display().to_string()))?;

    let started = Instant::now();
    let mut builder = tar::Builder::new(writer);
    for entry in WalkDir::new(source_dir).sort_by_file_name() {
        let entry = entry?;
        let rel = entry
            .path()
            .strip_prefix(source_dir)
            .expect("walked entry is under source_dir");
        let name = Path::new(root_name).join(rel);
        if entry.file_type().is_dir() {
            builder.append_dir(&name, entry.path())?;
        } else {
            let mut file = File::open(entry.path())?;
            builder.append_file(&name, &mut file)?;
        }
    }
    let mut writer = builder.into_inner()?;
    writer.flush()?;

    tracing::debug!(
        source = %source_dir.display(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "packed directory"
    );
    Ok(())
}

/// Packs `source_dir` into the file at `dest` and returns the archive size
/// in bytes.
pub fn pack_to_file(source_dir: &Path, dest: &Path) -> Result<u64, ArchiveError> {
    let file = File::create(dest)?;
    pack(source_dir, file)?;
    Ok(std::fs::metadata(dest)?.len())
}

/// Unpacks the tar archive at `archive` into `dest_dir`, creating the
/// destination if absent.
///
/// The tree is reproduced exactly, including empty directories. Entry paths
/// that would escape `dest_dir` are refused by the tar reader.
pub fn unpack(archive: &Path, dest_dir: &Path) -> Result<(), ArchiveError> {
    if !archive.is_file() {
        return Err(ArchiveError::NotAFile(archive.display().to_string()));
    }
    std::fs::create_dir_all(dest_dir)?;

    let started = Instant::now();
    let mut reader = tar::Archive::new(File::open(archive)?);
    reader.unpack(dest_dir)?;

    tracing::debug!(
        dest = %dest_dir.display(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "unpacked archive"
    );
    Ok(())
}
