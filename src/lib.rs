//! Textpatch: safe line-oriented file editing
//!
//! A request/response surface over a small set of file-editing operations:
//! pattern substitution, line-range edits, search with context, and
//! backup/restore, built so an automated client can mutate files without
//! surprises.
//!
//! # Architecture
//!
//! A structured [`Request`] names one operation; [`handle`] resolves its
//! arguments into concrete text operations by composing the line addressor,
//! pattern matcher, context window builder, mutation engine, backup manager,
//! and preview generator. Every request re-reads its target file; nothing is
//! cached between requests.
//!
//! # Safety
//!
//! - Mutations are computed fully in memory and written as one atomic
//!   replace (tempfile + fsync + rename)
//! - A backup is durably written before any destructive write begins
//! - Explicit line addresses are bounds-checked, never silently clamped
//! - Previews run against a discarded scratch copy; the real file and its
//!   backup state are untouched
//! - A bad pattern or range fails the request, never the process
//!
//! # Example
//!
//! ```no_run
//! use textpatch::{handle, Request};
//! use std::path::PathBuf;
//!
//! let request = Request::Search {
//!     file: PathBuf::from("notes.txt"),
//!     pattern: "TODO".to_string(),
//!     context: 3,
//!     case_insensitive: false,
//! };
//!
//! match handle(&request) {
//!     Ok(payload) => println!("{payload}"),
//!     Err(e) => eprintln!("request failed: {e}"),
//! }
//! ```

pub mod address;
pub mod backup;
pub mod column;
pub mod context;
pub mod engine;
pub mod ops;
pub mod pattern;
pub mod preview;

// Re-exports
pub use address::{AddressError, LineRange, RangeSpec};
pub use backup::{BackupEntry, BackupError, RestoreOutcome};
pub use context::ContextWindow;
pub use engine::{EditOutcome, EngineError, FileSnapshot, LineEditAction};
pub use ops::{handle, OpError, Request};
pub use pattern::{LineMatch, PatternError, PatternMatcher, SubstituteExpr};
