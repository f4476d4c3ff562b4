//! Pattern matching: line-oriented regex evaluation and substitution
//! expression parsing.
//!
//! Matching is per physical line: a pattern is never tested across a line
//! boundary in search paths. Multi-line matching exists only as the mutation
//! engine's explicit slurp mode. A pattern that fails to compile rejects the
//! current request; it never takes the process down.

use crate::context::ContextWindow;
use regex::{Regex, RegexBuilder};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum PatternError {
    #[error("invalid pattern '{pattern}': {source}")]
    Syntax {
        pattern: String,
        #[source]
        source: regex::Error,
    },

    #[error("invalid substitution expression '{expr}': {reason}")]
    Expression { expr: String, reason: String },
}

/// A compiled line-oriented matcher.
#[derive(Debug)]
pub struct PatternMatcher {
    regex: Regex,
}

/// One matching line, with its clamped context window.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LineMatch {
    /// 1-based line number of the match.
    pub line_number: usize,
    /// Text of the first match on the line.
    pub matched: String,
    /// Display window around the match, clamped into `[1, line_count]`.
    pub window: ContextWindow,
}

impl PatternMatcher {
    pub fn new(pattern: &str, case_insensitive: bool) -> Result<Self, PatternError> {
        let regex = compile(pattern, case_insensitive)?;
        Ok(PatternMatcher { regex })
    }

    pub fn is_match(&self, line: &str) -> bool {
        self.regex.is_match(line)
    }

    /// Find all matching lines, in line order. A line with several matches
    /// yields one record. Zero matches is an empty vec, not an error.
    pub fn find_lines(&self, lines: &[String], context_radius: usize) -> Vec<LineMatch> {
        let line_count = lines.len();
        lines
            .iter()
            .enumerate()
            .filter_map(|(index, line)| {
                self.regex.find(line).map(|found| {
                    let line_number = index + 1;
                    LineMatch {
                        line_number,
                        matched: found.as_str().to_string(),
                        window: ContextWindow::around(line_number, context_radius, line_count),
                    }
                })
            })
            .collect()
    }
}

/// Compile a pattern, mapping syntax failures to the request-scoped error.
pub fn compile(pattern: &str, case_insensitive: bool) -> Result<Regex, PatternError> {
    RegexBuilder::new(pattern)
        .case_insensitive(case_insensitive)
        .build()
        .map_err(|source| PatternError::Syntax {
            pattern: pattern.to_string(),
            source,
        })
}

/// Which occurrences a substitution applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Occurrence {
    /// First occurrence (per line in line mode, per file in slurp mode).
    First,
    /// Every occurrence.
    All,
    /// The Nth occurrence only, 1-based.
    Nth(usize),
}

/// A parsed `s<delim>pattern<delim>replacement<delim>flags` expression.
///
/// The delimiter is the character following `s`; occurrences of it inside
/// the pattern or replacement are backslash-escaped. Recognized flags are
/// `g` (all occurrences), `i` (case-insensitive), and a positive integer
/// (Nth occurrence only). Replacement text uses `regex`-crate capture
/// syntax (`$1`, `${name}`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubstituteExpr {
    pub pattern: String,
    pub replacement: String,
    pub occurrence: Occurrence,
    pub case_insensitive: bool,
}

impl SubstituteExpr {
    pub fn parse(expr: &str) -> Result<Self, PatternError> {
        let fail = |reason: &str| PatternError::Expression {
            expr: expr.to_string(),
            reason: reason.to_string(),
        };

        let mut chars = expr.chars();
        if chars.next() != Some('s') {
            return Err(fail("expected an expression of the form s/pattern/replacement/"));
        }
        let delim = chars.next().ok_or_else(|| fail("missing delimiter after 's'"))?;
        if delim == '\\' {
            return Err(fail("'\\' cannot be used as the delimiter"));
        }

        let body = &expr[1 + delim.len_utf8()..];
        let (pattern, rest) = take_field(body, delim)
            .ok_or_else(|| fail("unterminated pattern field"))?;
        let (replacement, flags) = take_field(rest, delim)
            .ok_or_else(|| fail("unterminated replacement field"))?;

        let mut occurrence = Occurrence::First;
        let mut case_insensitive = false;
        let mut digits = String::new();
        for flag in flags.chars() {
            match flag {
                'g' => {
                    if matches!(occurrence, Occurrence::Nth(_)) {
                        return Err(fail("'g' cannot be combined with an occurrence index"));
                    }
                    occurrence = Occurrence::All;
                }
                'i' => case_insensitive = true,
                d if d.is_ascii_digit() => digits.push(d),
                other => return Err(fail(&format!("unknown flag '{other}'"))),
            }
        }
        if !digits.is_empty() {
            if occurrence == Occurrence::All {
                return Err(fail("'g' cannot be combined with an occurrence index"));
            }
            let nth: usize = digits
                .parse()
                .map_err(|_| fail("occurrence index does not fit in a line"))?;
            if nth == 0 {
                return Err(fail("occurrence index must be at least 1"));
            }
            occurrence = Occurrence::Nth(nth);
        }

        Ok(SubstituteExpr {
            pattern,
            replacement,
            occurrence,
            case_insensitive,
        })
    }

    /// Compile this expression's pattern.
    pub fn compile(&self) -> Result<Regex, PatternError> {
        compile(&self.pattern, self.case_insensitive)
    }
}

/// Split off one delimiter-terminated field, unescaping `\<delim>` within
/// it. Returns the field and the text after the delimiter, or `None` when
/// the field is unterminated.
fn take_field(text: &str, delim: char) -> Option<(String, &str)> {
    let mut field = String::new();
    let mut iter = text.char_indices();
    while let Some((offset, ch)) = iter.next() {
        if ch == '\\' {
            match iter.next() {
                Some((_, next)) if next == delim => field.push(delim),
                Some((_, next)) => {
                    // Leave other escapes intact for the regex engine.
                    field.push('\\');
                    field.push(next);
                }
                None => {
                    field.push('\\');
                }
            }
        } else if ch == delim {
            return Some((field, &text[offset + delim.len_utf8()..]));
        } else {
            field.push(ch);
        }
    }
    None
}
