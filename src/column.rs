//! Column processing via the external `awk` binary.
//!
//! This is the one operation that still shells out: awk programs are passed
//! through verbatim as a single argv entry (no shell, no quoting layer) and
//! the target file is a second argv entry, so there is nothing to escape.
//! The target file is only ever read by awk; output goes to stdout or to a
//! separate output file.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ColumnError {
    #[error("failed to run awk: {0}")]
    Spawn(std::io::Error),

    #[error("awk exited with {status}: {stderr}")]
    Failed { status: String, stderr: String },

    #[error("failed to write awk output to {}: {source}", path.display())]
    Output {
        path: PathBuf,
        source: std::io::Error,
    },
}

/// Run an awk program over `file` and return its stdout.
pub fn run_awk(file: &Path, script: &str) -> Result<String, ColumnError> {
    let output = Command::new("awk")
        .arg(script)
        .arg(file)
        .output()
        .map_err(ColumnError::Spawn)?;

    if !output.status.success() {
        return Err(ColumnError::Failed {
            status: output
                .status
                .code()
                .map(|code| format!("status {code}"))
                .unwrap_or_else(|| "signal".to_string()),
            stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Run an awk program and write its stdout to `output_file`.
pub fn run_awk_to_file(
    file: &Path,
    script: &str,
    output_file: &Path,
) -> Result<usize, ColumnError> {
    let stdout = run_awk(file, script)?;
    fs::write(output_file, &stdout).map_err(|source| ColumnError::Output {
        path: output_file.to_path_buf(),
        source,
    })?;
    Ok(stdout.len())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn awk_available() -> bool {
        Command::new("awk").arg("--version").output().is_ok()
    }

    #[test]
    fn test_awk_extracts_columns() {
        if !awk_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("data.txt");
        fs::write(&file, "a 1\nb 2\n").unwrap();

        let out = run_awk(&file, "{ print $2 }").unwrap();
        assert_eq!(out, "1\n2\n");
    }

    #[test]
    fn test_awk_failure_leaves_input_unchanged() {
        if !awk_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("data.txt");
        fs::write(&file, "a 1\n").unwrap();

        let err = run_awk(&file, "{ this is not awk }").unwrap_err();
        assert!(matches!(err, ColumnError::Failed { .. }));
        assert_eq!(fs::read_to_string(&file).unwrap(), "a 1\n");
    }

    #[test]
    fn test_awk_output_redirects_to_file() {
        if !awk_available() {
            return;
        }
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("data.txt");
        let out = dir.path().join("cols.txt");
        fs::write(&file, "x y\n").unwrap();

        let bytes = run_awk_to_file(&file, "{ print $1 }", &out).unwrap();
        assert_eq!(bytes, 2);
        assert_eq!(fs::read_to_string(&out).unwrap(), "x\n");
    }
}
