//! On-disk snapshot generations and archives.
//!
//! The metadata server persists its state as a dump file plus a change
//! log. The warden rotates dump generations when a shadow stops: the
//! oldest numbered generation becomes a timestamped archive, the younger
//! generations shift up, and the current dump becomes generation 1. A
//! stopped shadow therefore has no current dump to silently re-seed the
//! cluster from — bringing it back as leader requires an explicit
//! operator restore. Archives are pruned once they age out of the
//! retention window; age comes from the timestamp embedded in the file
//! name, so pruning is deterministic and restart-safe.

use crate::core::error::{WardenError, WardenResult};
use chrono::{DateTime, NaiveDateTime, Utc};
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Current dump file name.
pub const DUMP_FILE: &str = "metadata.dump";

/// Magic bytes opening every dump file.
pub const DUMP_MAGIC: &[u8; 8] = b"MDMPv01\n";

/// Number of numbered generations kept besides the current dump.
pub const GENERATIONS: u32 = 3;

/// Timestamp format embedded in archive names.
const ARCHIVE_TIMESTAMP: &str = "%Y%m%d-%H%M%S";

/// Path of the current dump under `data_dir`.
pub fn dump_path(data_dir: &Path) -> PathBuf {
    data_dir.join(DUMP_FILE)
}

/// Path of numbered generation `n` under `data_dir`.
fn generation_path(data_dir: &Path, n: u32) -> PathBuf {
    data_dir.join(format!("{DUMP_FILE}.{n}"))
}

/// Path of the archive stamped `at` under `data_dir`.
fn archive_path(data_dir: &Path, at: DateTime<Utc>) -> PathBuf {
    data_dir.join(format!(
        "{DUMP_FILE}.{}.bak",
        at.format(ARCHIVE_TIMESTAMP)
    ))
}

/// Read the metadata version from the dump header.
///
/// A missing dump reads as version 0 (nothing durable on disk); a dump
/// that exists but cannot be parsed is a snapshot fault, never silently
/// version 0.
pub fn read_dump_version(data_dir: &Path) -> WardenResult<u64> {
    let path = dump_path(data_dir);
    let mut file = match std::fs::File::open(&path) {
        Ok(file) => file,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
        Err(e) => return Err(e.into()),
    };

    let mut header = [0u8; 16];
    file.read_exact(&mut header).map_err(|e| {
        WardenError::Snapshot(format!("short dump header in {}: {e}", path.display()))
    })?;
    if &header[..8] != DUMP_MAGIC {
        return Err(WardenError::Snapshot(format!(
            "bad dump magic in {}",
            path.display()
        )));
    }
    let mut version = [0u8; 8];
    version.copy_from_slice(&header[8..]);
    Ok(u64::from_le_bytes(version))
}

/// Result of one rotation pass.
#[derive(Debug, Clone, Default)]
pub struct Rotation {
    /// Archive created from the oldest generation, if one existed.
    pub archived: Option<PathBuf>,
    /// Whether a current dump was shifted into generation 1.
    pub rotated_current: bool,
}

/// Rotate dump generations in fixed order.
///
/// Oldest numbered generation → timestamped archive, then each younger
/// generation shifts up one slot, then the current dump becomes
/// generation 1. Missing files are skipped, so a repeated rotation with
/// no new dump moves nothing.
pub fn rotate(data_dir: &Path, at: DateTime<Utc>) -> WardenResult<Rotation> {
    let mut report = Rotation::default();

    let oldest = generation_path(data_dir, GENERATIONS);
    if oldest.exists() {
        let archive = archive_path(data_dir, at);
        std::fs::rename(&oldest, &archive)?;
        report.archived = Some(archive);
    }

    for n in (1..GENERATIONS).rev() {
        let from = generation_path(data_dir, n);
        if from.exists() {
            std::fs::rename(&from, generation_path(data_dir, n + 1))?;
        }
    }

    let current = dump_path(data_dir);
    if current.exists() {
        std::fs::rename(&current, generation_path(data_dir, 1))?;
        report.rotated_current = true;
    }

    Ok(report)
}

/// Delete archives whose embedded timestamp has aged out of `retention`.
///
/// Returns the removed paths. Names that do not parse as archives are
/// left alone — pruning only ever deletes what rotation created.
pub fn prune_archives(
    data_dir: &Path,
    retention: Duration,
    now: DateTime<Utc>,
) -> WardenResult<Vec<PathBuf>> {
    let mut removed = Vec::new();
    let retention =
        chrono::Duration::from_std(retention).unwrap_or_else(|_| chrono::Duration::MAX);

    for entry in std::fs::read_dir(data_dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        let Some(stamp) = archive_timestamp(name) else {
            continue;
        };
        if now - stamp > retention {
            std::fs::remove_file(entry.path())?;
            removed.push(entry.path());
        }
    }
    Ok(removed)
}

/// Parse the timestamp out of an archive name, if `name` is one.
fn archive_timestamp(name: &str) -> Option<DateTime<Utc>> {
    let middle = name
        .strip_prefix(DUMP_FILE)?
        .strip_prefix('.')?
        .strip_suffix(".bak")?;
    NaiveDateTime::parse_from_str(middle, ARCHIVE_TIMESTAMP)
        .ok()
        .map(|naive| naive.and_utc())
}
