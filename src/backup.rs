//! Backup lifecycle: create before a destructive edit, restore on demand,
//! list what exists on disk.
//!
//! The on-disk layout is part of the external contract: a backup lives at
//! `<path>.bak`, and every restore first snapshots the current target to
//! `<path>.before-restore`. Alternate suffixes (`~`, `.backup`, `.orig`)
//! are recognized only to *report* their presence when the expected backup
//! is missing; restore never falls back to them implicitly.

use chrono::{DateTime, Local};
use globset::Glob;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use thiserror::Error;

/// Default backup suffix, appended to the full file name.
pub const BACKUP_SUFFIX: &str = ".bak";

/// Suffix of the safety snapshot taken before every restore.
pub const RESTORE_SNAPSHOT_SUFFIX: &str = ".before-restore";

/// Alternate backup suffixes, probed in this order for diagnostics only.
const ALTERNATE_SUFFIXES: [&str; 3] = ["~", ".backup", ".orig"];

/// All suffixes recognized when inferring a backup's original file name.
const KNOWN_SUFFIXES: [&str; 5] = [".bak", ".backup", ".orig", ".before-restore", "~"];

#[derive(Error, Debug)]
pub enum BackupError {
    #[error("{0}")]
    NoBackupFound(String),

    #[error("invalid backup glob '{pattern}': {source}")]
    BadGlob {
        pattern: String,
        #[source]
        source: globset::Error,
    },

    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
}

fn io_err<'a>(action: &'static str, path: &'a Path) -> impl FnOnce(std::io::Error) -> BackupError + 'a {
    move |source| BackupError::Io {
        action,
        path: path.to_path_buf(),
        source,
    }
}

/// `<path><suffix>`, appended to the file name (`notes.txt` → `notes.txt.bak`).
pub fn with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut name = OsString::from(path.as_os_str());
    name.push(suffix);
    PathBuf::from(name)
}

/// Where this file's backup lives.
pub fn backup_path(path: &Path) -> PathBuf {
    with_suffix(path, BACKUP_SUFFIX)
}

/// Snapshot the file to `<path>.bak` before a destructive edit.
///
/// Overwrites any previous backup: a backup is the last known good content
/// before the current edit, not a history.
pub fn create_backup(path: &Path) -> Result<PathBuf, BackupError> {
    let backup = backup_path(path);
    fs::copy(path, &backup).map_err(io_err("write backup", &backup))?;
    Ok(backup)
}

/// What a restore actually did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreOutcome {
    /// The backup file the content came from.
    pub restored_from: PathBuf,
    /// The safety snapshot of the pre-restore target, if the target existed.
    pub safety_snapshot: Option<PathBuf>,
    /// Whether the consumed backup was deleted afterward.
    pub backup_deleted: bool,
}

/// Restore `path` from `<path>.bak`.
///
/// The expected backup must exist; a missing backup is an error that names
/// any alternate-suffix candidates found, without touching them or the
/// target. Before overwriting, the target's current content is snapshotted
/// to `<path>.before-restore`.
pub fn restore(path: &Path, keep_backup: bool) -> Result<RestoreOutcome, BackupError> {
    let backup = backup_path(path);
    if !backup.is_file() {
        let alternates: Vec<String> = ALTERNATE_SUFFIXES
            .into_iter()
            .map(|suffix| with_suffix(path, suffix))
            .filter(|candidate| candidate.is_file())
            .map(|candidate| candidate.display().to_string())
            .collect();
        let mut message = format!("no backup found at {}", backup.display());
        if !alternates.is_empty() {
            message.push_str(&format!(
                "; alternate backup file(s) present but not restored: {}",
                alternates.join(", ")
            ));
        }
        return Err(BackupError::NoBackupFound(message));
    }

    // Safety net: keep what is being overwritten.
    let safety_snapshot = if path.is_file() {
        let snapshot = with_suffix(path, RESTORE_SNAPSHOT_SUFFIX);
        fs::copy(path, &snapshot).map_err(io_err("write restore snapshot", &snapshot))?;
        Some(snapshot)
    } else {
        None
    };

    fs::copy(&backup, path).map_err(io_err("restore", path))?;

    let backup_deleted = if keep_backup {
        false
    } else {
        fs::remove_file(&backup).map_err(io_err("delete consumed backup", &backup))?;
        true
    };

    Ok(RestoreOutcome {
        restored_from: backup,
        safety_snapshot,
        backup_deleted,
    })
}

/// One entry from a backup listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupEntry {
    pub path: PathBuf,
    /// File name with the recognized backup suffix stripped, when one matches.
    pub original_name: Option<String>,
    pub size_bytes: u64,
    /// Local-time modification stamp, `YYYY-MM-DD HH:MM:SS`.
    pub modified: String,
}

/// Enumerate regular files directly under `directory` whose names match the
/// glob `pattern`, sorted by name.
pub fn list_backups(directory: &Path, pattern: &str) -> Result<Vec<BackupEntry>, BackupError> {
    let matcher = Glob::new(pattern)
        .map_err(|source| BackupError::BadGlob {
            pattern: pattern.to_string(),
            source,
        })?
        .compile_matcher();

    let mut entries = Vec::new();
    let listing = fs::read_dir(directory).map_err(io_err("list", directory))?;
    for entry in listing {
        let entry = entry.map_err(io_err("list", directory))?;
        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !matcher.is_match(name) {
            continue;
        }
        let metadata = entry.metadata().map_err(io_err("stat", &entry.path()))?;
        if !metadata.is_file() {
            continue;
        }
        entries.push(BackupEntry {
            path: entry.path(),
            original_name: infer_original(name),
            size_bytes: metadata.len(),
            modified: format_mtime(metadata.modified().ok()),
        });
    }

    entries.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(entries)
}

/// Strip the first recognized backup suffix from a file name.
fn infer_original(name: &str) -> Option<String> {
    KNOWN_SUFFIXES
        .iter()
        .find_map(|suffix| name.strip_suffix(suffix))
        .filter(|stripped| !stripped.is_empty())
        .map(str::to_string)
}

fn format_mtime(mtime: Option<SystemTime>) -> String {
    match mtime {
        Some(time) => DateTime::<Local>::from(time)
            .format("%Y-%m-%d %H:%M:%S")
            .to_string(),
        None => "unknown".to_string(),
    }
}
