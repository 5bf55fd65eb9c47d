//! Finalize and recovery renames
//!
//! Temporary segment files become permanent by dropping the `-tmp` marker
//! from their names. The index and filter are renamed before the data
//! file, because their permanent names are derived from it: a permanent
//! data file therefore always has permanent siblings.
//!
//! Every rename is idempotent. A name without the marker is left alone,
//! and a temporary file that is already gone while its permanent twin
//! exists counts as renamed, so an interrupted sequence can simply be run
//! again.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::config::Config;
use crate::error::Result;
use crate::partitioner::Partitioner;

use super::descriptor::strip_marker;
use super::{Component, Descriptor, SSTableReader};

/// Rename one temporary file to its permanent name and return that name
pub fn rename_to_permanent(path: &Path) -> Result<PathBuf> {
    let target = strip_marker(path);
    if target == path {
        return Ok(target);
    }

    match fs::rename(path, &target) {
        Ok(()) => {
            tracing::debug!("Renamed {} -> {}", path.display(), target.display());
            Ok(target)
        }
        Err(e) if e.kind() == io::ErrorKind::NotFound && target.exists() => Ok(target),
        Err(e) => Err(e.into()),
    }
}

/// Rename index, filter, then data; make the renames durable
pub(crate) fn rename_components(descriptor: &Descriptor) -> Result<Descriptor> {
    rename_to_permanent(&descriptor.index_path())?;
    rename_to_permanent(&descriptor.filter_path())?;
    // last: the other names derive from this one
    rename_to_permanent(&descriptor.data_path())?;
    sync_dir(descriptor.dir())?;
    Ok(descriptor.as_permanent())
}

/// Finish the renames of a segment whose files are already closed and
/// durable, then open it for reading.
///
/// `data_path` may name either the temporary or the permanent data file.
pub fn rename_and_open(
    data_path: &Path,
    partitioner: Arc<dyn Partitioner>,
    config: &Config,
) -> Result<SSTableReader> {
    let (descriptor, _) = Descriptor::from_path(data_path)?;
    let descriptor = rename_components(&descriptor)?;
    let cache_fraction = config.keys_cached_fraction_for(descriptor.table());
    SSTableReader::open(
        &descriptor.data_path(),
        partitioner,
        config.index_interval,
        cache_fraction,
    )
}

/// Outcome of scanning a directory for unfinished segments
#[derive(Debug, Default)]
pub struct RecoveryReport {
    /// Segments whose rename sequence was completed, now open for reading
    pub recovered: Vec<SSTableReader>,

    /// Temporary data files left alone: the writer never reached the
    /// rename step, so their contents may not be durable
    pub incomplete: Vec<PathBuf>,
}

/// Complete every rename sequence that a crash interrupted in `dir`.
///
/// A temporary segment is recovered only when at least one of its
/// siblings already carries a permanent name, which proves every sync
/// barrier of finalize was passed.
pub fn recover_directory(
    dir: &Path,
    partitioner: Arc<dyn Partitioner>,
    config: &Config,
) -> Result<RecoveryReport> {
    let mut report = RecoveryReport::default();

    let mut candidates = Vec::new();
    for entry in fs::read_dir(dir)? {
        let path = entry?.path();
        if !path.is_file() {
            continue;
        }
        if let Ok((descriptor, Component::Data)) = Descriptor::from_path(&path) {
            if descriptor.is_temporary() {
                candidates.push(descriptor);
            }
        }
    }
    candidates.sort_by_key(|d| d.generation());

    for descriptor in candidates {
        let permanent = descriptor.as_permanent();
        let renames_started =
            permanent.index_path().exists() || permanent.filter_path().exists();

        if !renames_started {
            tracing::warn!("Leaving incomplete segment {} for cleanup", descriptor);
            report.incomplete.push(descriptor.data_path());
            continue;
        }

        tracing::warn!("Completing interrupted rename of {}", descriptor);
        let reader = rename_and_open(&descriptor.data_path(), Arc::clone(&partitioner), config)?;
        report.recovered.push(reader);
    }

    Ok(report)
}

/// Persist directory entries (the renames themselves)
#[cfg(unix)]
fn sync_dir(dir: &Path) -> Result<()> {
    let dir = if dir.as_os_str().is_empty() { Path::new(".") } else { dir };
    fs::File::open(dir)?.sync_all()?;
    Ok(())
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) -> Result<()> {
    Ok(())
}
