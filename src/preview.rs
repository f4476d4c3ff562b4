//! Dry-run previews: show the diff a mutation would produce without
//! touching the real file.
//!
//! The candidate content is written to a scratch copy in a throwaway
//! temporary directory and read back, so the preview exercises the same
//! write path as a real edit. The scratch directory is discarded when it
//! drops, on success and on every failure path, and neither the target
//! file nor its backup state is ever modified.

use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::engine;

#[derive(Error, Debug)]
pub enum PreviewError {
    #[error("failed to stage preview copy for {}: {source}", path.display())]
    Scratch {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error(transparent)]
    Write(#[from] engine::EngineError),
}

/// Render a unified diff between a file's current content and a candidate
/// mutation result. Returns a "no changes" payload when they are identical.
pub fn render(path: &Path, original: &str, candidate: &str) -> Result<String, PreviewError> {
    let scratch = tempfile::tempdir().map_err(|source| PreviewError::Scratch {
        path: path.to_path_buf(),
        source,
    })?;
    let file_name = path.file_name().unwrap_or_else(|| "scratch".as_ref());
    let scratch_path = scratch.path().join(file_name);

    // Stage the candidate through the real write path, then diff what
    // actually landed on disk.
    engine::atomic_replace(&scratch_path, candidate)?;
    let staged = fs::read_to_string(&scratch_path).map_err(|source| PreviewError::Scratch {
        path: scratch_path.clone(),
        source,
    })?;

    if staged == original {
        return Ok(format!(
            "preview: no changes would be made to {}",
            path.display()
        ));
    }

    let mut out = String::new();
    out.push_str(&format!("--- {} (current)\n", path.display()));
    out.push_str(&format!("+++ {} (preview)\n", path.display()));

    let diff = TextDiff::from_lines(original, &staged);
    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => '-',
            ChangeTag::Insert => '+',
            ChangeTag::Equal => ' ',
        };
        out.push(sign);
        out.push_str(change.value());
        if !change.value().ends_with('\n') {
            out.push('\n');
        }
    }
    Ok(out)
}
