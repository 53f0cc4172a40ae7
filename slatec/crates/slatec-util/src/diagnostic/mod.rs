//! Error and warning reporting infrastructure.
//!
//! Elaboration reports through a shared [`Handler`]: recoverable problems
//! are recorded and compilation continues with poisoned values, so one
//! mistake in a source file does not hide the rest. The driver drains the
//! handler at the end of a unit, sorts by file and position, and reports
//! each diagnostic once.
//!
//! # Examples
//!
//! ```
//! use slatec_util::{Diagnostic, DiagnosticCode, Handler, Span};
//!
//! let handler = Handler::new();
//! handler.emit(
//!     Diagnostic::error("unknown name `frobnicate`", Span::DUMMY)
//!         .with_code(DiagnosticCode::UNKNOWN_NAME),
//! );
//!
//! assert!(handler.has_errors());
//! assert_eq!(handler.error_count(), 1);
//! ```

mod codes;

pub use codes::DiagnosticCode;

use crate::Span;
use std::cell::RefCell;
use std::fmt;

/// Diagnostic severity level.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Level {
    /// Prevents compilation from succeeding.
    Error,
    /// Reported but does not fail the unit.
    Warning,
    /// Additional context attached to another diagnostic.
    Note,
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Level::Error => write!(f, "error"),
            Level::Warning => write!(f, "warning"),
            Level::Note => write!(f, "note"),
        }
    }
}

/// A single diagnostic message with severity, location, and code.
#[derive(Clone, Debug, PartialEq)]
pub struct Diagnostic {
    /// Severity.
    pub level: Level,
    /// Main message.
    pub message: String,
    /// Source location.
    pub span: Span,
    /// Stable code, when the diagnostic belongs to the closed taxonomy.
    pub code: Option<DiagnosticCode>,
    /// Additional notes for context.
    pub notes: Vec<String>,
}

impl Diagnostic {
    /// Create a diagnostic with an explicit level.
    pub fn new(level: Level, message: impl Into<String>, span: Span) -> Self {
        Self {
            level,
            message: message.into(),
            span,
            code: None,
            notes: Vec::new(),
        }
    }

    /// Create an error diagnostic.
    pub fn error(message: impl Into<String>, span: Span) -> Self {
        Self::new(Level::Error, message, span)
    }

    /// Create a warning diagnostic.
    pub fn warning(message: impl Into<String>, span: Span) -> Self {
        Self::new(Level::Warning, message, span)
    }

    /// Attach a stable code.
    pub fn with_code(mut self, code: DiagnosticCode) -> Self {
        self.code = Some(code);
        self
    }

    /// Attach a contextual note.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.code {
            Some(code) => write!(f, "{}[{}]: {}", self.level, code, self.message),
            None => write!(f, "{}: {}", self.level, self.message),
        }
    }
}

/// Collector for diagnostics emitted during one compilation.
///
/// Interior mutability keeps emission available from shared contexts; the
/// whole pipeline is single-threaded, so a `RefCell` buffer suffices.
pub struct Handler {
    diagnostics: RefCell<Vec<Diagnostic>>,
}

impl Handler {
    /// Create a handler with an empty buffer.
    pub fn new() -> Self {
        Self {
            diagnostics: RefCell::new(Vec::new()),
        }
    }

    /// Record a diagnostic.
    pub fn emit(&self, diagnostic: Diagnostic) {
        self.diagnostics.borrow_mut().push(diagnostic);
    }

    /// True if any error-level diagnostic was recorded.
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .borrow()
            .iter()
            .any(|d| d.level == Level::Error)
    }

    /// Number of error-level diagnostics.
    pub fn error_count(&self) -> usize {
        self.diagnostics
            .borrow()
            .iter()
            .filter(|d| d.level == Level::Error)
            .count()
    }

    /// Snapshot of everything recorded so far.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.diagnostics.borrow().clone()
    }

    /// Drain the buffer, sorted by file then position.
    ///
    /// This is the order the driver reports in; sorting here keeps the
    /// user-visible order independent of elaboration order.
    pub fn take_sorted(&self) -> Vec<Diagnostic> {
        let mut diags = std::mem::take(&mut *self.diagnostics.borrow_mut());
        diags.sort_by_key(|d| d.span.sort_key());
        diags
    }
}

impl Default for Handler {
    fn default() -> Self {
        Self::new()
    }
}
