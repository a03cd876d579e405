//! Tree builder: materialize small-file and large-blob plans on disk.
//!
//! Layout under the output root:
//!
//! ```text
//! scripts/   script_NNN.py
//! reports/   report_NNN.txt
//! templates/ template_NNN.j2
//! configs/   config_NNN.cfg
//! data/      devices_<N>MB.csv, links_<N>MB.csv, sites_<N>MB.csv, data_<i>_<N>MB.json
//! ```
//!
//! The root directory is created if missing and then held under an exclusive
//! `flock()` for the whole build, before anything in it is removed, so two
//! generators never interleave in one tree.

#![allow(missing_docs)]

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::core::errors::{NrsError, Result};
use crate::plan::budget::{BlobAssignment, BudgetPlan};
use crate::plan::small_files::{SmallFileKind, SmallFilePlan};
use crate::tree::content::{blob_header, small_file_body};

// ──────────────────── constants ────────────────────

pub use crate::plan::budget::MB;
/// Directory holding the large blobs.
pub const DATA_DIR: &str = "data";
const CHUNK_SIZE: usize = 4 * 1024 * 1024; // 4 MB write chunks
const FSYNC_EVERY_BYTES: u64 = 64 * 1024 * 1024; // fsync every 64 MB

// ──────────────────── reports ────────────────────

/// What a created file was planned as.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CreatedKind {
    Small { kind: SmallFileKind },
    Blob,
}

/// Emitted once per file as soon as it is on disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CreatedFile {
    pub path: PathBuf,
    pub bytes: u64,
    pub kind: CreatedKind,
}

/// Result of a build.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub root: PathBuf,
    pub small_files: BTreeMap<SmallFileKind, usize>,
    pub small_bytes: u64,
    pub blob_files: usize,
    pub blob_bytes: u64,
    /// Measured by walking the tree after the build.
    pub on_disk_bytes: u64,
}

impl BuildReport {
    #[must_use]
    pub fn files_created(&self) -> usize {
        self.small_files.values().sum::<usize>() + self.blob_files
    }
}

// ──────────────────── builder ────────────────────

/// Where and how to write the tree.
#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub root: PathBuf,
    /// Bytes per planned MB. [`MB`] except in tests.
    pub unit_bytes: u64,
    /// Replace a non-empty root instead of refusing.
    pub force: bool,
}

impl BuildOptions {
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            unit_bytes: MB,
            force: false,
        }
    }
}

/// Creates directories and files from precomputed plans.
pub struct TreeBuilder {
    options: BuildOptions,
}

impl TreeBuilder {
    #[must_use]
    pub const fn new(options: BuildOptions) -> Self {
        Self { options }
    }

    /// Write every planned file. `on_file` sees each file right after it is written.
    pub fn build(
        &self,
        small: &SmallFilePlan,
        blobs: &BudgetPlan,
        on_file: &mut dyn FnMut(&CreatedFile),
    ) -> Result<BuildReport> {
        let root = &self.options.root;
        fs::create_dir_all(root).map_err(|e| NrsError::io(root, e))?;
        let _lock = lock_dir(root)?;
        self.prepare_root()?;

        for kind in SmallFileKind::ALL {
            let dir = root.join(kind.dir());
            fs::create_dir_all(&dir).map_err(|e| NrsError::io(&dir, e))?;
        }
        let data_dir = root.join(DATA_DIR);
        fs::create_dir_all(&data_dir).map_err(|e| NrsError::io(&data_dir, e))?;

        let mut report = BuildReport {
            root: root.clone(),
            ..BuildReport::default()
        };

        for file in &small.files {
            let path = root.join(&file.path);
            let body = small_file_body(file.kind, file.index, file.size_bytes);
            fs::write(&path, &body).map_err(|e| NrsError::io(&path, e))?;

            *report.small_files.entry(file.kind).or_default() += 1;
            report.small_bytes += body.len() as u64;
            on_file(&CreatedFile {
                path,
                bytes: body.len() as u64,
                kind: CreatedKind::Small { kind: file.kind },
            });
        }

        for blob in &blobs.assignments {
            let path = data_dir.join(blob.file_name());
            let bytes = self.create_blob(&path, blob)?;

            report.blob_files += 1;
            report.blob_bytes += bytes;
            on_file(&CreatedFile {
                path,
                bytes,
                kind: CreatedKind::Blob,
            });
        }

        report.on_disk_bytes = tree_size(root)?;
        Ok(report)
    }

    // ──────────────────── internal ────────────────────

    /// Empty the locked root, or refuse when it has content and `force` is off.
    ///
    /// Only the contents go; the root inode stays so the held lock keeps covering it.
    fn prepare_root(&self) -> Result<()> {
        let root = &self.options.root;
        let entries: Vec<_> = fs::read_dir(root)
            .map_err(|e| NrsError::io(root, e))?
            .collect::<std::io::Result<_>>()
            .map_err(|e| NrsError::io(root, e))?;
        if entries.is_empty() {
            return Ok(());
        }
        if !self.options.force {
            return Err(NrsError::OutputNotEmpty { path: root.clone() });
        }
        for entry in entries {
            let path = entry.path();
            let meta = fs::symlink_metadata(&path).map_err(|e| NrsError::io(&path, e))?;
            let removed = if meta.is_dir() {
                fs::remove_dir_all(&path)
            } else {
                fs::remove_file(&path)
            };
            removed.map_err(|e| NrsError::io(&path, e))?;
        }
        Ok(())
    }

    fn create_blob(&self, path: &Path, blob: &BlobAssignment) -> Result<u64> {
        let target = blob.size_mb.saturating_mul(self.options.unit_bytes);
        let result = write_blob(path, blob, target);
        if result.is_err() {
            // Clean up partial file on write error.
            let _ = fs::remove_file(path);
        }
        result
    }
}

fn write_blob(path: &Path, blob: &BlobAssignment, target: u64) -> Result<u64> {
    let mut file = OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .open(path)
        .map_err(|e| NrsError::io(path, e))?;

    let mut header = blob_header(blob);
    header.truncate(usize::try_from(target).unwrap_or(usize::MAX));
    file.write_all(&header).map_err(|e| NrsError::io(path, e))?;

    let written = ensure_min_size(&mut file, path, header.len() as u64, target)?;
    file.sync_all().map_err(|e| NrsError::io(path, e))?;
    Ok(written)
}

/// Append zero-filled chunks until the file holds at least `target` bytes.
///
/// Returns the final length.
pub fn ensure_min_size(file: &mut File, path: &Path, current: u64, target: u64) -> Result<u64> {
    let chunk = vec![0u8; CHUNK_SIZE];
    let mut written = current;
    let mut bytes_since_fsync: u64 = 0;

    while written < target {
        let remaining = target - written;
        let to_write = usize::try_from(remaining).map_or(CHUNK_SIZE, |r| r.min(CHUNK_SIZE));

        file.write_all(&chunk[..to_write])
            .map_err(|e| NrsError::io(path, e))?;
        written += to_write as u64;
        bytes_since_fsync += to_write as u64;

        if bytes_since_fsync >= FSYNC_EVERY_BYTES {
            file.sync_all().map_err(|e| NrsError::io(path, e))?;
            bytes_since_fsync = 0;
        }
    }

    Ok(written)
}

/// Total size of regular files under `root`. Symlinks are not followed.
pub fn tree_size(root: &Path) -> Result<u64> {
    let mut total = 0;
    let mut stack = vec![root.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir).map_err(|e| NrsError::io(&dir, e))? {
            let entry = entry.map_err(|e| NrsError::io(&dir, e))?;
            let path = entry.path();
            let meta = fs::symlink_metadata(&path).map_err(|e| NrsError::io(&path, e))?;
            if meta.is_dir() {
                stack.push(path);
            } else if meta.is_file() {
                total += meta.len();
            }
        }
    }
    Ok(total)
}

// ──────────────────── locking ────────────────────

#[cfg(unix)]
fn lock_dir(dir: &Path) -> Result<nix::fcntl::Flock<File>> {
    let handle = File::open(dir).map_err(|e| NrsError::io(dir, e))?;

    #[allow(deprecated)]
    nix::fcntl::Flock::lock(handle, nix::fcntl::FlockArg::LockExclusiveNonblock).map_err(
        |(_file, e)| NrsError::Runtime {
            details: format!("another run holds the lock on {}: {e}", dir.display()),
        },
    )
}

#[cfg(not(unix))]
fn lock_dir(_dir: &Path) -> Result<()> {
    Ok(())
}

// ──────────────────── tests ────────────────────
