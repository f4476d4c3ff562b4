//! The request layer: structured requests in, one text payload or one typed
//! error out.
//!
//! This is where command arguments become concrete text operations: a
//! request names an operation and its fields; dispatch composes the line
//! addressor, pattern matcher, mutation engine, backup manager, and preview
//! generator to produce a single payload. Validation (missing file, bad
//! range, bad pattern) happens before any mutation attempt; when a
//! destructive write does happen, its backup was durably written first.
//!
//! Requests are handled one at a time and share no state beyond the
//! filesystem; every request re-reads its target file.

use globset::{Glob, GlobMatcher};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{debug, warn};
use walkdir::WalkDir;

use crate::address::{resolve_line, AddressError, RangeSpec};
use crate::backup::{self, BackupError};
use crate::column::{self, ColumnError};
use crate::context::{self, gutter_width, ContextWindow};
use crate::engine::{self, EngineError, FileSnapshot, LineEditAction, SubstitutionReport};
use crate::pattern::{PatternError, PatternMatcher, SubstituteExpr};
use crate::preview::{self, PreviewError};

/// Request-scoped error taxonomy. Every failure surfaces as exactly one of
/// these, carrying a single descriptive message.
#[derive(Error, Debug)]
pub enum OpError {
    #[error("file not found: {}", .0.display())]
    FileNotFound(PathBuf),

    #[error("{0}")]
    InvalidRange(String),

    #[error("{0}")]
    OutOfRange(String),

    #[error("{0}")]
    PatternSyntax(String),

    #[error("{0}")]
    NoBackupFound(String),

    #[error("unknown action '{0}' (expected substitute, delete, insert_before, or insert_after)")]
    UnknownAction(String),

    #[error("{0}")]
    ExternalTool(String),

    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{0}")]
    Io(String),
}

impl From<AddressError> for OpError {
    fn from(e: AddressError) -> Self {
        match e {
            AddressError::Invalid { .. } => OpError::InvalidRange(e.to_string()),
            AddressError::OutOfRange { .. } => OpError::OutOfRange(e.to_string()),
        }
    }
}

impl From<PatternError> for OpError {
    fn from(e: PatternError) -> Self {
        OpError::PatternSyntax(e.to_string())
    }
}

impl From<EngineError> for OpError {
    fn from(e: EngineError) -> Self {
        match e {
            EngineError::NotFound(path) => OpError::FileNotFound(path),
            other => OpError::Io(other.to_string()),
        }
    }
}

impl From<BackupError> for OpError {
    fn from(e: BackupError) -> Self {
        match e {
            BackupError::NoBackupFound(message) => OpError::NoBackupFound(message),
            BackupError::BadGlob { .. } => OpError::PatternSyntax(e.to_string()),
            BackupError::Io { .. } => OpError::Io(e.to_string()),
        }
    }
}

impl From<ColumnError> for OpError {
    fn from(e: ColumnError) -> Self {
        OpError::ExternalTool(e.to_string())
    }
}

impl From<PreviewError> for OpError {
    fn from(e: PreviewError) -> Self {
        match e {
            PreviewError::Write(engine_err) => engine_err.into(),
            scratch => OpError::Io(scratch.to_string()),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_directory() -> PathBuf {
    PathBuf::from(".")
}

fn default_backup_glob() -> String {
    "*.bak".to_string()
}

fn default_search_context() -> usize {
    3
}

fn default_show_context() -> usize {
    5
}

/// One structured request. The serialized form is tagged by `operation`
/// (kebab-case) with camelCase fields, so an automated client sends e.g.
/// `{"operation": "line-edit", "file": "a.txt", "action": "delete",
/// "lineRange": "2,4"}`.
#[derive(Debug, Deserialize)]
#[serde(
    tag = "operation",
    rename_all = "kebab-case",
    rename_all_fields = "camelCase"
)]
pub enum Request {
    /// Apply a sed-style substitution expression to one file.
    PatternSubstitute {
        file: PathBuf,
        pattern: String,
        #[serde(default = "default_true")]
        backup: bool,
        #[serde(default)]
        preview: bool,
        #[serde(default)]
        slurp: bool,
    },

    /// Apply one substitution across every file matching a glob.
    PatternSubstituteMulti {
        pattern: String,
        file_pattern: String,
        #[serde(default = "default_directory")]
        directory: PathBuf,
        #[serde(default = "default_true")]
        backup: bool,
    },

    /// Replace literal text, no pattern language involved.
    LiteralReplace {
        file: PathBuf,
        find: String,
        replace: String,
        #[serde(default = "default_true")]
        all: bool,
        #[serde(default = "default_true")]
        backup: bool,
    },

    /// Line-addressed edit: substitute, delete, insert_before, insert_after.
    LineEdit {
        file: PathBuf,
        action: String,
        #[serde(default)]
        line_number: Option<usize>,
        #[serde(default)]
        line_range: Option<String>,
        #[serde(default)]
        content: Option<String>,
        #[serde(default = "default_true")]
        backup: bool,
    },

    /// Run an awk program over the file.
    ColumnProcess {
        file: PathBuf,
        script: String,
        #[serde(default)]
        output_file: Option<PathBuf>,
    },

    /// Restore a file from its `.bak` backup.
    Restore {
        file: PathBuf,
        #[serde(default = "default_true")]
        keep_backup: bool,
    },

    /// List backup files in a directory.
    ListBackups {
        #[serde(default = "default_directory")]
        directory: PathBuf,
        #[serde(default = "default_backup_glob")]
        pattern: String,
    },

    /// Read a file: whole, an addressed range, or search hits with context.
    Read {
        file: PathBuf,
        #[serde(default)]
        lines: Option<String>,
        #[serde(default)]
        search: Option<String>,
        #[serde(default = "default_search_context")]
        context: usize,
    },

    /// Search a file, one context block per matching line.
    Search {
        file: PathBuf,
        pattern: String,
        #[serde(default = "default_search_context")]
        context: usize,
        #[serde(default)]
        case_insensitive: bool,
    },

    /// Show a context window around one line.
    ShowContext {
        file: PathBuf,
        line_number: usize,
        #[serde(default = "default_show_context")]
        context: usize,
    },
}

impl Request {
    /// Operation name as it appears on the wire.
    pub fn operation(&self) -> &'static str {
        match self {
            Request::PatternSubstitute { .. } => "pattern-substitute",
            Request::PatternSubstituteMulti { .. } => "pattern-substitute-multi",
            Request::LiteralReplace { .. } => "literal-replace",
            Request::LineEdit { .. } => "line-edit",
            Request::ColumnProcess { .. } => "column-process",
            Request::Restore { .. } => "restore",
            Request::ListBackups { .. } => "list-backups",
            Request::Read { .. } => "read",
            Request::Search { .. } => "search",
            Request::ShowContext { .. } => "show-context",
        }
    }
}

/// Dispatch one request to its operation.
pub fn handle(request: &Request) -> Result<String, OpError> {
    debug!(operation = request.operation(), "dispatching request");
    match request {
        Request::PatternSubstitute {
            file,
            pattern,
            backup,
            preview,
            slurp,
        } => pattern_substitute(file, pattern, *backup, *preview, *slurp),
        Request::PatternSubstituteMulti {
            pattern,
            file_pattern,
            directory,
            backup,
        } => pattern_substitute_multi(pattern, file_pattern, directory, *backup),
        Request::LiteralReplace {
            file,
            find,
            replace,
            all,
            backup,
        } => literal_replace(file, find, replace, *all, *backup),
        Request::LineEdit {
            file,
            action,
            line_number,
            line_range,
            content,
            backup,
        } => line_edit(
            file,
            action,
            *line_number,
            line_range.as_deref(),
            content.as_deref(),
            *backup,
        ),
        Request::ColumnProcess {
            file,
            script,
            output_file,
        } => column_process(file, script, output_file.as_deref()),
        Request::Restore { file, keep_backup } => restore(file, *keep_backup),
        Request::ListBackups { directory, pattern } => list_backups(directory, pattern),
        Request::Read {
            file,
            lines,
            search,
            context,
        } => read(file, lines.as_deref(), search.as_deref(), *context),
        Request::Search {
            file,
            pattern,
            context,
            case_insensitive,
        } => {
            let snapshot = FileSnapshot::read(file)?;
            search_file(&snapshot, pattern, *context, *case_insensitive)
        }
        Request::ShowContext {
            file,
            line_number,
            context,
        } => show_context(file, *line_number, *context),
    }
}

fn backup_note(path: &Path, enabled: bool) -> Result<String, OpError> {
    if enabled {
        let backup = backup::create_backup(path)?;
        Ok(format!(" (backup: {})", backup.display()))
    } else {
        Ok(String::new())
    }
}

fn pattern_substitute(
    file: &Path,
    pattern: &str,
    backup: bool,
    preview: bool,
    slurp: bool,
) -> Result<String, OpError> {
    // Expression and regex syntax are validated before the file is touched.
    let expr = SubstituteExpr::parse(pattern)?;
    expr.compile()?;
    let snapshot = FileSnapshot::read(file)?;

    let (candidate, report) = if slurp {
        engine::apply_substitution_slurp(&snapshot, &expr)?
    } else {
        let (lines, report) = engine::apply_substitution(&snapshot, &expr)?;
        (snapshot.join(&lines), report)
    };

    if preview {
        return Ok(preview::render(file, &snapshot.content(), &candidate)?);
    }

    if report.replacements == 0 {
        return Ok(format!(
            "no matches for '{}' in {}; file unchanged",
            expr.pattern,
            file.display()
        ));
    }

    let note = backup_note(file, backup)?;
    engine::atomic_replace(file, &candidate)?;
    Ok(format!(
        "replaced {} occurrence(s){} in {}{}",
        report.replacements,
        lines_changed_note(&report),
        file.display(),
        note
    ))
}

fn lines_changed_note(report: &SubstitutionReport) -> String {
    if report.lines_changed > 0 {
        format!(" on {} line(s)", report.lines_changed)
    } else {
        String::new()
    }
}

fn compile_glob(pattern: &str) -> Result<GlobMatcher, OpError> {
    Glob::new(pattern)
        .map(|glob| glob.compile_matcher())
        .map_err(|e| OpError::PatternSyntax(format!("invalid file glob '{pattern}': {e}")))
}

fn pattern_substitute_multi(
    pattern: &str,
    file_pattern: &str,
    directory: &Path,
    backup: bool,
) -> Result<String, OpError> {
    let expr = SubstituteExpr::parse(pattern)?;
    expr.compile()?;
    let matcher = compile_glob(file_pattern)?;

    let mut lines = Vec::new();
    let mut scanned = 0usize;
    let mut changed = 0usize;

    for entry in WalkDir::new(directory)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry.map_err(|e| OpError::Io(format!("failed to list {}: {e}", directory.display())))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let name = entry.file_name();
        if !matcher.is_match(Path::new(name)) {
            continue;
        }
        scanned += 1;
        let path = entry.path();
        match substitute_one(path, &expr, backup) {
            Ok(Some(report)) => {
                changed += 1;
                lines.push(format!(
                    "{}: replaced {} occurrence(s) on {} line(s)",
                    path.display(),
                    report.replacements,
                    report.lines_changed
                ));
            }
            Ok(None) => lines.push(format!("{}: no matches", path.display())),
            Err(e) => {
                // One unreadable file does not abort the sweep.
                warn!(file = %path.display(), error = %e, "skipping file in multi-substitute");
                lines.push(format!("{}: error: {}", path.display(), e));
            }
        }
    }

    if scanned == 0 {
        return Ok(format!(
            "no files matching '{}' in {}",
            file_pattern,
            directory.display()
        ));
    }

    let mut payload = format!("{scanned} file(s) scanned, {changed} changed\n");
    payload.push_str(&lines.join("\n"));
    Ok(payload)
}

/// Substitute in one file; `Ok(None)` means no matches (file untouched).
fn substitute_one(
    path: &Path,
    expr: &SubstituteExpr,
    backup: bool,
) -> Result<Option<SubstitutionReport>, OpError> {
    let snapshot = FileSnapshot::read(path)?;
    let (lines, report) = engine::apply_substitution(&snapshot, expr)?;
    if report.replacements == 0 {
        return Ok(None);
    }
    if backup {
        backup::create_backup(path)?;
    }
    snapshot.commit(&lines)?;
    Ok(Some(report))
}

fn literal_replace(
    file: &Path,
    find: &str,
    replace: &str,
    all: bool,
    backup: bool,
) -> Result<String, OpError> {
    if find.is_empty() {
        return Err(OpError::InvalidRequest(
            "'find' text must not be empty".to_string(),
        ));
    }

    let snapshot = FileSnapshot::read(file)?;
    let content = snapshot.content();
    let occurrences = content.matches(find).count();
    if occurrences == 0 {
        return Ok(format!(
            "no occurrences of '{}' in {}; file unchanged",
            find,
            file.display()
        ));
    }

    let (new_content, replaced) = if all {
        (content.replace(find, replace), occurrences)
    } else {
        (content.replacen(find, replace, 1), 1)
    };

    let note = backup_note(file, backup)?;
    engine::atomic_replace(file, &new_content)?;
    Ok(format!(
        "replaced {} of {} occurrence(s) of '{}' in {}{}",
        replaced,
        occurrences,
        find,
        file.display(),
        note
    ))
}

fn parse_action(action: &str, content: Option<&str>) -> Result<LineEditAction, OpError> {
    let require_content = || {
        content.map(str::to_string).ok_or_else(|| {
            OpError::InvalidRequest(format!("action '{action}' requires 'content'"))
        })
    };
    match action {
        "substitute" => Ok(LineEditAction::Substitute {
            content: require_content()?,
        }),
        "delete" => Ok(LineEditAction::Delete),
        "insert_before" => Ok(LineEditAction::InsertBefore {
            content: require_content()?,
        }),
        "insert_after" => Ok(LineEditAction::InsertAfter {
            content: require_content()?,
        }),
        other => Err(OpError::UnknownAction(other.to_string())),
    }
}

fn line_edit(
    file: &Path,
    action: &str,
    line_number: Option<usize>,
    line_range: Option<&str>,
    content: Option<&str>,
    backup: bool,
) -> Result<String, OpError> {
    let action = parse_action(action, content)?;

    let spec = match (line_number, line_range) {
        (Some(number), None) => RangeSpec::parse(&number.to_string())?,
        (None, Some(range)) => RangeSpec::parse(range)?,
        (Some(_), Some(_)) => {
            return Err(OpError::InvalidRequest(
                "provide either 'lineNumber' or 'lineRange', not both".to_string(),
            ))
        }
        (None, None) => {
            return Err(OpError::InvalidRequest(
                "line-edit requires 'lineNumber' or 'lineRange'".to_string(),
            ))
        }
    };

    let snapshot = FileSnapshot::read(file)?;
    let range = spec.resolve(snapshot.line_count())?;
    let (new_lines, outcome) = engine::apply_line_edit(&snapshot, range, &action);

    if !outcome.changed {
        return Ok(format!(
            "{} in {}; content unchanged",
            outcome.summary,
            file.display()
        ));
    }

    let note = backup_note(file, backup)?;
    snapshot.commit(&new_lines)?;
    Ok(format!("{} in {}{}", outcome.summary, file.display(), note))
}

fn column_process(
    file: &Path,
    script: &str,
    output_file: Option<&Path>,
) -> Result<String, OpError> {
    if !file.is_file() {
        return Err(OpError::FileNotFound(file.to_path_buf()));
    }
    match output_file {
        Some(out) => {
            let bytes = column::run_awk_to_file(file, script, out)?;
            Ok(format!(
                "wrote {} byte(s) of awk output to {}",
                bytes,
                out.display()
            ))
        }
        None => Ok(column::run_awk(file, script)?),
    }
}

fn restore(file: &Path, keep_backup: bool) -> Result<String, OpError> {
    let outcome = backup::restore(file, keep_backup)?;
    let mut payload = format!(
        "restored {} from {}",
        file.display(),
        outcome.restored_from.display()
    );
    if let Some(snapshot) = outcome.safety_snapshot {
        payload.push_str(&format!(
            "; previous content saved to {}",
            snapshot.display()
        ));
    }
    payload.push_str(if outcome.backup_deleted {
        "; backup deleted"
    } else {
        "; backup kept"
    });
    Ok(payload)
}

fn list_backups(directory: &Path, pattern: &str) -> Result<String, OpError> {
    let entries = backup::list_backups(directory, pattern)?;
    if entries.is_empty() {
        return Ok(format!(
            "no backup files matching '{}' in {}",
            pattern,
            directory.display()
        ));
    }

    let lines: Vec<String> = entries
        .iter()
        .map(|entry| {
            let original = entry
                .original_name
                .as_deref()
                .map(|name| format!("  (original: {name})"))
                .unwrap_or_default();
            format!(
                "{}  {} byte(s)  {}{}",
                entry.path.display(),
                entry.size_bytes,
                entry.modified,
                original
            )
        })
        .collect();
    Ok(lines.join("\n"))
}

fn read(
    file: &Path,
    lines: Option<&str>,
    search: Option<&str>,
    context: usize,
) -> Result<String, OpError> {
    let snapshot = FileSnapshot::read(file)?;

    if let Some(pattern) = search {
        return search_file(&snapshot, pattern, context, false);
    }

    let count = snapshot.line_count();
    if count == 0 {
        return Ok(format!("{}: empty file", file.display()));
    }
    let width = gutter_width(count);

    let window = match lines {
        Some(spec) => {
            let range = RangeSpec::parse(spec)?.resolve(count)?;
            ContextWindow {
                start: range.start,
                end: range.end,
            }
        }
        None => ContextWindow {
            start: 1,
            end: count,
        },
    };
    Ok(context::render(snapshot.lines(), window, None, width))
}

fn search_file(
    snapshot: &FileSnapshot,
    pattern: &str,
    radius: usize,
    case_insensitive: bool,
) -> Result<String, OpError> {
    let matcher = PatternMatcher::new(pattern, case_insensitive)?;
    let matches = matcher.find_lines(snapshot.lines(), radius);
    if matches.is_empty() {
        return Ok(format!(
            "no matches for '{}' in {}",
            pattern,
            snapshot.path().display()
        ));
    }

    let width = gutter_width(snapshot.line_count());
    let blocks: Vec<String> = matches
        .iter()
        .map(|found| context::render(snapshot.lines(), found.window, Some(found.line_number), width))
        .collect();

    let mut payload = format!(
        "{} match(es) for '{}' in {}\n",
        matches.len(),
        pattern,
        snapshot.path().display()
    );
    payload.push_str(&blocks.join("--\n"));
    Ok(payload)
}

fn show_context(file: &Path, line_number: usize, radius: usize) -> Result<String, OpError> {
    let snapshot = FileSnapshot::read(file)?;
    let count = snapshot.line_count();
    resolve_line(line_number, count)?;
    let window = ContextWindow::around(line_number, radius, count);
    Ok(context::render(
        snapshot.lines(),
        window,
        Some(line_number),
        gutter_width(count),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn seed(dir: &TempDir, name: &str, content: &str) -> PathBuf {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path
    }

    #[test]
    fn test_request_parses_from_tagged_json() {
        let request: Request = serde_json::from_str(
            r#"{"operation": "line-edit", "file": "a.txt", "action": "delete", "lineRange": "2,4"}"#,
        )
        .unwrap();
        assert_eq!(request.operation(), "line-edit");
        match request {
            Request::LineEdit {
                line_range, backup, ..
            } => {
                assert_eq!(line_range.as_deref(), Some("2,4"));
                assert!(backup, "backup defaults to true");
            }
            other => panic!("parsed wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_request_defaults_match_contract() {
        let request: Request = serde_json::from_str(
            r#"{"operation": "search", "file": "a.txt", "pattern": "x"}"#,
        )
        .unwrap();
        match request {
            Request::Search {
                context,
                case_insensitive,
                ..
            } => {
                assert_eq!(context, 3);
                assert!(!case_insensitive);
            }
            other => panic!("parsed wrong variant: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_action_is_typed() {
        let dir = TempDir::new().unwrap();
        let file = seed(&dir, "a.txt", "x\n");
        let err = handle(&Request::LineEdit {
            file,
            action: "obliterate".to_string(),
            line_number: Some(1),
            line_range: None,
            content: None,
            backup: true,
        })
        .unwrap_err();
        assert!(matches!(err, OpError::UnknownAction(_)));
    }

    #[test]
    fn test_validation_precedes_side_effects() {
        let dir = TempDir::new().unwrap();
        let file = seed(&dir, "a.txt", "x\ny\n");
        // Bad range: nothing written, no backup created.
        let err = handle(&Request::LineEdit {
            file: file.clone(),
            action: "delete".to_string(),
            line_number: None,
            line_range: Some("5,9".to_string()),
            content: None,
            backup: true,
        })
        .unwrap_err();
        assert!(matches!(err, OpError::OutOfRange(_)));
        assert!(!dir.path().join("a.txt.bak").exists());
        assert_eq!(fs::read_to_string(&file).unwrap(), "x\ny\n");
    }

    #[test]
    fn test_missing_file_is_file_not_found() {
        let err = handle(&Request::Search {
            file: PathBuf::from("/nonexistent/nowhere.txt"),
            pattern: "x".to_string(),
            context: 3,
            case_insensitive: false,
        })
        .unwrap_err();
        assert!(matches!(err, OpError::FileNotFound(_)));
    }

    #[test]
    fn test_zero_matches_is_success_payload() {
        let dir = TempDir::new().unwrap();
        let file = seed(&dir, "a.txt", "alpha\nbeta\n");
        let payload = handle(&Request::Search {
            file,
            pattern: "gamma".to_string(),
            context: 3,
            case_insensitive: false,
        })
        .unwrap();
        assert!(payload.contains("no matches"));
    }
}
