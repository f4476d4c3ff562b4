//! The mutation engine: in-memory line edits committed by one atomic write.
//!
//! Every mutation computes the complete new file content in memory first;
//! the only disk operation is a single tempfile + fsync + rename replace.
//! A crash mid-operation therefore leaves either the old or the new content,
//! never a half-written mix. Files are read fresh per request and never
//! cached across requests.

use crate::address::LineRange;
use crate::pattern::{Occurrence, PatternError, SubstituteExpr};
use regex::Regex;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to {action} {}: {source}", path.display())]
    Io {
        action: &'static str,
        path: PathBuf,
        source: std::io::Error,
    },
}

/// A file read as an ordered sequence of lines. Owned by one request;
/// rejoining preserves whether the original ended with a newline.
#[derive(Debug, Clone)]
pub struct FileSnapshot {
    path: PathBuf,
    lines: Vec<String>,
    trailing_newline: bool,
}

impl FileSnapshot {
    pub fn read(path: &Path) -> Result<Self, EngineError> {
        let content = fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                EngineError::NotFound(path.to_path_buf())
            } else {
                EngineError::Io {
                    action: "read",
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let trailing_newline = content.ends_with('\n');
        let lines = if content.is_empty() {
            Vec::new()
        } else {
            let mut lines: Vec<String> = content.split('\n').map(str::to_string).collect();
            if trailing_newline {
                lines.pop();
            }
            lines
        };

        Ok(FileSnapshot {
            path: path.to_path_buf(),
            lines,
            trailing_newline,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn line_count(&self) -> usize {
        self.lines.len()
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Rebuild full file content from a line vector, preserving the
    /// original trailing-newline state.
    pub fn join(&self, lines: &[String]) -> String {
        if lines.is_empty() {
            return String::new();
        }
        let mut content = lines.join("\n");
        if self.trailing_newline {
            content.push('\n');
        }
        content
    }

    pub fn content(&self) -> String {
        self.join(&self.lines)
    }

    /// Replace the file's content on disk with `lines`, atomically.
    pub fn commit(&self, lines: &[String]) -> Result<(), EngineError> {
        atomic_replace(&self.path, &self.join(lines))
    }
}

/// One line-addressed edit action.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineEditAction {
    /// Replace the addressed lines with the given content.
    Substitute { content: String },
    /// Remove the addressed lines entirely; later lines shift up.
    Delete,
    /// Insert content immediately before the range's first line.
    InsertBefore { content: String },
    /// Insert content immediately after the range's last line.
    InsertAfter { content: String },
}

/// Outcome of a computed mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
#[must_use = "an EditOutcome says whether anything changed"]
pub struct EditOutcome {
    pub changed: bool,
    pub summary: String,
}

/// Apply a line edit to a snapshot's lines, producing the new line vector
/// and a human-readable summary. Pure; the caller decides whether and when
/// to commit.
pub fn apply_line_edit(
    snapshot: &FileSnapshot,
    range: LineRange,
    action: &LineEditAction,
) -> (Vec<String>, EditOutcome) {
    let lines = snapshot.lines();
    let mut out: Vec<String> = Vec::with_capacity(lines.len() + 4);
    // Indices into the 0-based line vector.
    let start = range.start - 1;
    let end = range.end; // exclusive

    let summary = match action {
        LineEditAction::Substitute { content } => {
            let replacement = split_content(content);
            out.extend_from_slice(&lines[..start]);
            out.extend(replacement.iter().cloned());
            out.extend_from_slice(&lines[end..]);
            format!(
                "replaced line(s) {} with {} line(s)",
                range,
                replacement.len()
            )
        }
        LineEditAction::Delete => {
            out.extend_from_slice(&lines[..start]);
            out.extend_from_slice(&lines[end..]);
            format!("deleted {} line(s) at {}", range.line_count(), range)
        }
        LineEditAction::InsertBefore { content } => {
            let inserted = split_content(content);
            out.extend_from_slice(&lines[..start]);
            out.extend(inserted.iter().cloned());
            out.extend_from_slice(&lines[start..]);
            format!("inserted {} line(s) before line {}", inserted.len(), range.start)
        }
        LineEditAction::InsertAfter { content } => {
            let inserted = split_content(content);
            out.extend_from_slice(&lines[..end]);
            out.extend(inserted.iter().cloned());
            out.extend_from_slice(&lines[end..]);
            format!("inserted {} line(s) after line {}", inserted.len(), range.end)
        }
    };

    let changed = out != lines;
    (out, EditOutcome { changed, summary })
}

/// Per-file substitution accounting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SubstitutionReport {
    pub replacements: usize,
    pub lines_changed: usize,
}

/// Apply a substitution expression line by line (the default mode: the
/// pattern never sees a line terminator).
pub fn apply_substitution(
    snapshot: &FileSnapshot,
    expr: &SubstituteExpr,
) -> Result<(Vec<String>, SubstitutionReport), PatternError> {
    let regex = expr.compile()?;
    let mut report = SubstitutionReport::default();
    let mut out = Vec::with_capacity(snapshot.line_count());

    for line in snapshot.lines() {
        let (new_line, replaced) = substitute_in(&regex, line, expr);
        if replaced > 0 && new_line != *line {
            report.replacements += replaced;
            report.lines_changed += 1;
        }
        out.push(new_line);
    }
    Ok((out, report))
}

/// Apply a substitution expression to the whole file content at once: the
/// explicit opt-in slurp mode, where the pattern may span line boundaries.
pub fn apply_substitution_slurp(
    snapshot: &FileSnapshot,
    expr: &SubstituteExpr,
) -> Result<(String, SubstitutionReport), PatternError> {
    let regex = expr.compile()?;
    let content = snapshot.content();
    let (new_content, replaced) = substitute_in(&regex, &content, expr);
    let report = SubstitutionReport {
        replacements: if new_content != content { replaced } else { 0 },
        lines_changed: 0,
    };
    Ok((new_content, report))
}

fn substitute_in(regex: &Regex, text: &str, expr: &SubstituteExpr) -> (String, usize) {
    match expr.occurrence {
        Occurrence::All => {
            let count = regex.find_iter(text).count();
            if count == 0 {
                return (text.to_string(), 0);
            }
            (regex.replace_all(text, expr.replacement.as_str()).into_owned(), count)
        }
        Occurrence::First => {
            if !regex.is_match(text) {
                return (text.to_string(), 0);
            }
            (regex.replace(text, expr.replacement.as_str()).into_owned(), 1)
        }
        Occurrence::Nth(n) => match replace_nth(regex, text, &expr.replacement, n) {
            Some(new_text) => (new_text, 1),
            None => (text.to_string(), 0),
        },
    }
}

/// Replace only the Nth non-overlapping match, expanding capture references
/// in the replacement.
fn replace_nth(regex: &Regex, text: &str, replacement: &str, nth: usize) -> Option<String> {
    let caps = regex.captures_iter(text).nth(nth - 1)?;
    let whole = caps.get(0)?;
    let mut out = String::with_capacity(text.len());
    out.push_str(&text[..whole.start()]);
    caps.expand(replacement, &mut out);
    out.push_str(&text[whole.end()..]);
    Some(out)
}

/// Split request-supplied content into lines for insertion.
fn split_content(content: &str) -> Vec<String> {
    content.split('\n').map(str::to_string).collect()
}

/// Atomically replace a file's content: tempfile in the same directory,
/// write, fsync, rename over the target.
pub fn atomic_replace(path: &Path, content: &str) -> Result<(), EngineError> {
    let io_err = |action: &'static str, source: std::io::Error| EngineError::Io {
        action,
        path: path.to_path_buf(),
        source,
    };

    let parent = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let mut temp = tempfile::NamedTempFile::new_in(parent)
        .map_err(|e| io_err("create temp file near", e))?;
    temp.write_all(content.as_bytes())
        .map_err(|e| io_err("write", e))?;
    temp.as_file().sync_all().map_err(|e| io_err("sync", e))?;
    temp.persist(path).map_err(|e| io_err("replace", e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::address::RangeSpec;
    use tempfile::TempDir;

    fn write_snapshot(dir: &TempDir, name: &str, content: &str) -> FileSnapshot {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        FileSnapshot::read(&path).unwrap()
    }

    fn range(spec: &str, count: usize) -> LineRange {
        RangeSpec::parse(spec).unwrap().resolve(count).unwrap()
    }

    #[test]
    fn test_snapshot_preserves_trailing_newline() {
        let dir = TempDir::new().unwrap();
        let with = write_snapshot(&dir, "a.txt", "x\ny\n");
        assert_eq!(with.line_count(), 2);
        assert_eq!(with.content(), "x\ny\n");

        let without = write_snapshot(&dir, "b.txt", "x\ny");
        assert_eq!(without.line_count(), 2);
        assert_eq!(without.content(), "x\ny");
    }

    #[test]
    fn test_snapshot_of_empty_file() {
        let dir = TempDir::new().unwrap();
        let snap = write_snapshot(&dir, "empty.txt", "");
        assert_eq!(snap.line_count(), 0);
        assert_eq!(snap.content(), "");
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = FileSnapshot::read(&dir.path().join("absent.txt")).unwrap_err();
        assert!(matches!(err, EngineError::NotFound(_)));
    }

    #[test]
    fn test_delete_shifts_following_lines() {
        let dir = TempDir::new().unwrap();
        let snap = write_snapshot(&dir, "f.txt", "1\n2\n3\n4\n5\n");
        let (lines, outcome) =
            apply_line_edit(&snap, range("2,3", 5), &LineEditAction::Delete);
        assert_eq!(lines, vec!["1", "4", "5"]);
        assert!(outcome.changed);
        // Line r2+1 becomes the new line r1.
        assert_eq!(lines[1], "4");
    }

    #[test]
    fn test_insert_after_last_line_appends() {
        let dir = TempDir::new().unwrap();
        let snap = write_snapshot(&dir, "f.txt", "1\n2\n3\n4\n5\n");
        let (lines, _) = apply_line_edit(
            &snap,
            range("$", 5),
            &LineEditAction::InsertAfter {
                content: "6".to_string(),
            },
        );
        assert_eq!(lines.len(), 6);
        assert_eq!(lines[5], "6");
    }

    #[test]
    fn test_insert_before_first_line() {
        let dir = TempDir::new().unwrap();
        let snap = write_snapshot(&dir, "f.txt", "b\nc\n");
        let (lines, _) = apply_line_edit(
            &snap,
            range("1", 2),
            &LineEditAction::InsertBefore {
                content: "a".to_string(),
            },
        );
        assert_eq!(lines, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_substitute_range_with_multiline_content() {
        let dir = TempDir::new().unwrap();
        let snap = write_snapshot(&dir, "f.txt", "1\n2\n3\n4\n");
        let (lines, _) = apply_line_edit(
            &snap,
            range("2,3", 4),
            &LineEditAction::Substitute {
                content: "x\ny\nz".to_string(),
            },
        );
        assert_eq!(lines, vec!["1", "x", "y", "z", "4"]);
    }

    #[test]
    fn test_substitution_first_per_line() {
        let dir = TempDir::new().unwrap();
        let snap = write_snapshot(&dir, "f.txt", "foo foo\nbar\nfoo\n");
        let expr = SubstituteExpr::parse("s/foo/qux/").unwrap();
        let (lines, report) = apply_substitution(&snap, &expr).unwrap();
        assert_eq!(lines, vec!["qux foo", "bar", "qux"]);
        assert_eq!(report.replacements, 2);
        assert_eq!(report.lines_changed, 2);
    }

    #[test]
    fn test_substitution_all_occurrences() {
        let dir = TempDir::new().unwrap();
        let snap = write_snapshot(&dir, "f.txt", "foo foo\nfoo\n");
        let expr = SubstituteExpr::parse("s/foo/qux/g").unwrap();
        let (lines, report) = apply_substitution(&snap, &expr).unwrap();
        assert_eq!(lines, vec!["qux qux", "qux"]);
        assert_eq!(report.replacements, 3);
    }

    #[test]
    fn test_substitution_nth_occurrence() {
        let dir = TempDir::new().unwrap();
        let snap = write_snapshot(&dir, "f.txt", "a a a a\n");
        let expr = SubstituteExpr::parse("s/a/X/3").unwrap();
        let (lines, report) = apply_substitution(&snap, &expr).unwrap();
        assert_eq!(lines, vec!["a a X a"]);
        assert_eq!(report.replacements, 1);
    }

    #[test]
    fn test_substitution_capture_groups() {
        let dir = TempDir::new().unwrap();
        let snap = write_snapshot(&dir, "f.txt", "key=value\n");
        let expr = SubstituteExpr::parse(r"s/(\w+)=(\w+)/$2=$1/").unwrap();
        let (lines, _) = apply_substitution(&snap, &expr).unwrap();
        assert_eq!(lines, vec!["value=key"]);
    }

    #[test]
    fn test_substitution_no_match_reports_zero() {
        let dir = TempDir::new().unwrap();
        let snap = write_snapshot(&dir, "f.txt", "a\nb\n");
        let expr = SubstituteExpr::parse("s/zzz/x/g").unwrap();
        let (lines, report) = apply_substitution(&snap, &expr).unwrap();
        assert_eq!(lines, snap.lines());
        assert_eq!(report, SubstitutionReport::default());
    }

    #[test]
    fn test_slurp_substitution_spans_lines() {
        let dir = TempDir::new().unwrap();
        let snap = write_snapshot(&dir, "f.txt", "begin\nend\n");
        let expr = SubstituteExpr::parse(r"s/begin\nend/joined/").unwrap();
        let (content, report) = apply_substitution_slurp(&snap, &expr).unwrap();
        assert_eq!(content, "joined\n");
        assert_eq!(report.replacements, 1);
    }

    #[test]
    fn test_line_mode_never_crosses_lines() {
        let dir = TempDir::new().unwrap();
        let snap = write_snapshot(&dir, "f.txt", "begin\nend\n");
        let expr = SubstituteExpr::parse(r"s/begin\nend/joined/").unwrap();
        let (_, report) = apply_substitution(&snap, &expr).unwrap();
        assert_eq!(report.replacements, 0);
    }

    #[test]
    fn test_commit_is_full_replace() {
        let dir = TempDir::new().unwrap();
        let snap = write_snapshot(&dir, "f.txt", "1\n2\n3\n");
        snap.commit(&["only".to_string()]).unwrap();
        assert_eq!(fs::read_to_string(snap.path()).unwrap(), "only\n");
    }
}
