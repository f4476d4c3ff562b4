//! Line addressing: range specifier parsing and strict bounds resolution.
//!
//! A range specifier is `"N"`, `"N,M"`, or `"N,$"` where `$` denotes the last
//! line of the file. Resolution against a known line count is strict: an
//! address that falls outside the file is an error, never silently clamped.
//! Clamping is reserved for context windows, where a partial window is the
//! expected display behavior rather than a mis-targeted edit.

use std::fmt;
use thiserror::Error;

/// A resolved, validated line interval. Both bounds are 1-based inclusive and
/// satisfy `1 <= start <= end <= line_count` of the file they were resolved
/// against.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineRange {
    pub start: usize,
    pub end: usize,
}

impl LineRange {
    /// Number of lines covered by this range. Always at least 1.
    pub fn line_count(&self) -> usize {
        self.end - self.start + 1
    }
}

impl fmt::Display for LineRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.start == self.end {
            write!(f, "{}", self.start)
        } else {
            write!(f, "{},{}", self.start, self.end)
        }
    }
}

/// One endpoint of an unresolved range specifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Endpoint {
    Line(usize),
    Last,
}

/// A parsed but not yet resolved range specifier. `$` endpoints are only
/// given a concrete value once the file's line count is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RangeSpec {
    start: Endpoint,
    end: Endpoint,
}

#[derive(Error, Debug)]
pub enum AddressError {
    #[error("invalid line range '{spec}': {reason}")]
    Invalid { spec: String, reason: String },

    #[error("line range {range} is out of range for a {line_count}-line file")]
    OutOfRange { range: LineRange, line_count: usize },
}

impl RangeSpec {
    /// Parse a specifier string: a single line number, `"A,B"`, or `"A,$"`.
    ///
    /// `start < 1` and malformed endpoints are rejected here; `start > end`
    /// can involve `$` and is checked at resolution time.
    pub fn parse(spec: &str) -> Result<Self, AddressError> {
        let invalid = |reason: &str| AddressError::Invalid {
            spec: spec.to_string(),
            reason: reason.to_string(),
        };

        let mut parts = spec.splitn(2, ',');
        let start_text = parts.next().unwrap_or("").trim();
        let end_text = parts.next().map(str::trim);

        let start = parse_endpoint(start_text).ok_or_else(|| {
            invalid("expected a line number such as '3', '3,9', or '3,$'")
        })?;
        if start == Endpoint::Line(0) {
            return Err(invalid("line numbers are 1-based; 0 is not addressable"));
        }

        let end = match end_text {
            None => start,
            Some(text) => parse_endpoint(text)
                .ok_or_else(|| invalid("range end must be a line number or '$'"))?,
        };
        if end == Endpoint::Line(0) {
            return Err(invalid("line numbers are 1-based; 0 is not addressable"));
        }

        Ok(RangeSpec { start, end })
    }

    /// Resolve `$` endpoints and validate against the file's line count.
    pub fn resolve(&self, line_count: usize) -> Result<LineRange, AddressError> {
        let start = match self.start {
            Endpoint::Line(n) => n,
            Endpoint::Last => line_count.max(1),
        };
        let end = match self.end {
            Endpoint::Line(n) => n,
            Endpoint::Last => line_count.max(1),
        };

        if start > end {
            return Err(AddressError::Invalid {
                spec: format!("{},{}", start, end),
                reason: "range start is past its end".to_string(),
            });
        }

        let range = LineRange { start, end };
        if end > line_count {
            return Err(AddressError::OutOfRange { range, line_count });
        }
        Ok(range)
    }
}

/// Validate a single 1-based line number against a file's line count.
pub fn resolve_line(line: usize, line_count: usize) -> Result<usize, AddressError> {
    let range = LineRange {
        start: line,
        end: line,
    };
    if line == 0 {
        return Err(AddressError::Invalid {
            spec: "0".to_string(),
            reason: "line numbers are 1-based; 0 is not addressable".to_string(),
        });
    }
    if line > line_count {
        return Err(AddressError::OutOfRange { range, line_count });
    }
    Ok(line)
}

fn parse_endpoint(text: &str) -> Option<Endpoint> {
    if text == "$" {
        return Some(Endpoint::Last);
    }
    text.parse::<usize>().ok().map(Endpoint::Line)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resolved(spec: &str, count: usize) -> LineRange {
        RangeSpec::parse(spec).unwrap().resolve(count).unwrap()
    }

    #[test]
    fn test_single_line() {
        assert_eq!(resolved("4", 10), LineRange { start: 4, end: 4 });
    }

    #[test]
    fn test_pair() {
        assert_eq!(resolved("2,7", 10), LineRange { start: 2, end: 7 });
    }

    #[test]
    fn test_dollar_resolves_to_last_line() {
        assert_eq!(resolved("5,$", 10), LineRange { start: 5, end: 10 });
        assert_eq!(resolved("$", 10), LineRange { start: 10, end: 10 });
    }

    #[test]
    fn test_zero_start_rejected() {
        let err = RangeSpec::parse("0,4").unwrap_err();
        assert!(matches!(err, AddressError::Invalid { .. }));
    }

    #[test]
    fn test_inverted_range_rejected_after_resolution() {
        let err = RangeSpec::parse("7,3").unwrap().resolve(10).unwrap_err();
        assert!(matches!(err, AddressError::Invalid { .. }));
    }

    #[test]
    fn test_end_past_eof_is_out_of_range() {
        let err = RangeSpec::parse("3,12").unwrap().resolve(10).unwrap_err();
        assert!(matches!(
            err,
            AddressError::OutOfRange { line_count: 10, .. }
        ));
    }

    #[test]
    fn test_start_past_eof_is_out_of_range() {
        let err = RangeSpec::parse("11").unwrap().resolve(10).unwrap_err();
        assert!(matches!(err, AddressError::OutOfRange { .. }));
    }

    #[test]
    fn test_malformed_specifier() {
        assert!(RangeSpec::parse("abc").is_err());
        assert!(RangeSpec::parse("3,x").is_err());
        assert!(RangeSpec::parse("").is_err());
    }

    #[test]
    fn test_resolve_line_bounds() {
        assert_eq!(resolve_line(1, 5).unwrap(), 1);
        assert_eq!(resolve_line(5, 5).unwrap(), 5);
        assert!(resolve_line(6, 5).is_err());
        assert!(resolve_line(0, 5).is_err());
    }
}
